use parse_display::Display;
use thiserror::Error;

use super::error::DecodeError;
use super::operand::Operand;
use crate::constants::{Word, REGISTER_BASE, REGISTER_COUNT};

/// One of the eight general purpose registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("R[{0}]")]
pub struct Reg(u8);

impl Reg {
    /// Get the register with the given index, if it exists
    #[must_use]
    pub fn new(index: usize) -> Option<Self> {
        if index < REGISTER_COUNT {
            u8::try_from(index).ok().map(Self)
        } else {
            None
        }
    }

    /// Decode a raw operand word into a register reference.
    ///
    /// Only words in `[32768, 32775]` are register references.
    #[must_use]
    pub fn from_raw(raw: Word) -> Option<Self> {
        raw.checked_sub(REGISTER_BASE)
            .and_then(|index| Self::new(usize::from(index)))
    }

    /// Index of the register in the register file
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw operand word referencing this register
    #[must_use]
    pub fn raw(self) -> Word {
        REGISTER_BASE + Word::from(self.0)
    }

    /// Iterate over every register, in index order
    pub fn all() -> impl Iterator<Item = Self> {
        (0..REGISTER_COUNT).filter_map(Self::new)
    }
}

#[derive(Error, Debug)]
#[error("could not parse register")]
pub struct RegisterParseError;

impl std::str::FromStr for Reg {
    type Err = RegisterParseError;

    /// Accepts `r3`, `%r3` and `R[3]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let index = if let Some(inner) = s.strip_prefix("r[").and_then(|r| r.strip_suffix(']')) {
            inner
        } else {
            s.strip_prefix("%r")
                .or_else(|| s.strip_prefix('r'))
                .ok_or(RegisterParseError)?
        };

        let index: usize = index.parse().map_err(|_| RegisterParseError)?;
        Self::new(index).ok_or(RegisterParseError)
    }
}

/// The register file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    cells: [Word; REGISTER_COUNT],
}

impl Registers {
    #[must_use]
    pub fn get(&self, reg: Reg) -> Word {
        self.cells[reg.index()]
    }

    pub fn set(&mut self, reg: Reg, value: Word) {
        self.cells[reg.index()] = value;
    }

    /// Get the value of a decoded operand
    #[must_use]
    pub fn value(&self, operand: Operand) -> Word {
        match operand {
            Operand::Literal(value) => value,
            Operand::Register(reg) => self.get(reg),
        }
    }

    /// Resolve a raw operand word to its value.
    ///
    /// Literals resolve to themselves, register references to the content of
    /// the register.
    ///
    /// # Errors
    ///
    /// Fails with [`DecodeError::InvalidOperand`] if the word is neither a
    /// literal nor a register reference.
    pub fn resolve(&self, raw: Word) -> Result<Word, DecodeError> {
        Operand::decode(raw).map(|operand| self.value(operand))
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (reg, value) in Reg::all().zip(self.cells) {
            if reg.index() > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{reg} = {value}")?;
        }
        Ok(())
    }
}
