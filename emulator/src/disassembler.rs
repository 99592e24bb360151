//! Textual listing of program images
//!
//! The disassembler walks memory words in order, decoding each opcode and its
//! operands without executing anything. Words that are not opcodes are
//! listed as raw data, one word at a time.

use thiserror::Error;

use crate::constants::{Address, Word};
use crate::runtime::{Opcode, Operand};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("invalid operand {operand} in instruction at address {address}")]
pub struct DisassemblyError {
    pub address: Address,
    pub operand: Word,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Instruction {
        opcode: Opcode,
        operands: Vec<Operand>,
    },
    Data(Word),
}

/// One line of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub address: Address,
    pub kind: LineKind,
}

impl Line {
    /// Number of words this line covers
    #[must_use]
    pub fn width(&self) -> u16 {
        match &self.kind {
            LineKind::Instruction { opcode, .. } => opcode.width(),
            LineKind::Data(_) => 1,
        }
    }
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            LineKind::Instruction { opcode, operands } => {
                write!(f, "{}\t{}\t", self.address, opcode)?;
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{operand}")?;
                }
                Ok(())
            }
            LineKind::Data(word) => write!(f, "{}\t{}", self.address, word),
        }
    }
}

/// Iterator over the lines of a listing, see [`disassemble`]
pub struct Disassembly<'a> {
    words: &'a [Word],
    address: usize,
    failed: bool,
}

impl Disassembly<'_> {
    fn word(&self, address: usize) -> Word {
        self.words.get(address).copied().unwrap_or_default()
    }

    fn decode_line(&self, address: Address) -> Result<Line, DisassemblyError> {
        let word = self.word(usize::from(address));
        let Ok(opcode) = Opcode::try_from(word) else {
            return Ok(Line {
                address,
                kind: LineKind::Data(word),
            });
        };

        let operands = (1..=usize::from(opcode.arity()))
            .map(|offset| {
                let raw = self.word(usize::from(address) + offset);
                Operand::decode(raw).map_err(|_| DisassemblyError {
                    address,
                    operand: raw,
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Line {
            address,
            kind: LineKind::Instruction { opcode, operands },
        })
    }
}

impl Iterator for Disassembly<'_> {
    type Item = Result<Line, DisassemblyError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.address >= self.words.len() {
            return None;
        }

        let address = Address::try_from(self.address).ok()?;
        let line = self.decode_line(address);
        match &line {
            Ok(line) => self.address += usize::from(line.width()),
            Err(_) => self.failed = true,
        }
        Some(line)
    }
}

/// List the instructions in `words`, starting at `start`.
///
/// Operands past the end of `words` read as 0, like memory past the end of a
/// loaded image. The listing stops after the first invalid operand.
#[must_use]
pub fn disassemble(words: &[Word], start: Address) -> Disassembly<'_> {
    Disassembly {
        words,
        address: usize::from(start),
        failed: false,
    }
}
