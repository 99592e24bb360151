//! Classification of raw operand words

use parse_display::Display;

use super::error::DecodeError;
use super::registers::Reg;
use crate::constants::{Word, MAX_VALUE};

/// A decoded operand: either a literal value or a register reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Operand {
    #[display("{0}")]
    Literal(Word),

    #[display("{0}")]
    Register(Reg),
}

impl Operand {
    /// Classify a raw word read from memory.
    ///
    /// # Errors
    ///
    /// Words above 32775 are neither literals nor registers and fail with
    /// [`DecodeError::InvalidOperand`].
    pub fn decode(raw: Word) -> Result<Self, DecodeError> {
        if raw <= MAX_VALUE {
            Ok(Self::Literal(raw))
        } else {
            Reg::from_raw(raw)
                .map(Self::Register)
                .ok_or(DecodeError::InvalidOperand(raw))
        }
    }

    /// Decode a raw word that must name a register
    ///
    /// # Errors
    ///
    /// Fails with [`DecodeError::InvalidDestination`] for literals and
    /// out-of-range words.
    pub fn destination(raw: Word) -> Result<Reg, DecodeError> {
        Reg::from_raw(raw).ok_or(DecodeError::InvalidDestination(raw))
    }

    /// The raw word encoding this operand
    #[must_use]
    pub fn raw(self) -> Word {
        match self {
            Self::Literal(value) => value,
            Self::Register(reg) => reg.raw(),
        }
    }
}

impl From<Reg> for Operand {
    fn from(reg: Reg) -> Self {
        Self::Register(reg)
    }
}

/// The target of a conditional jump.
///
/// It stays a raw word until the jump is taken, so a branch that is never
/// taken never resolves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpTarget(Word);

impl JumpTarget {
    #[must_use]
    pub const fn new(raw: Word) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn raw(self) -> Word {
        self.0
    }

    /// Classify the target word
    ///
    /// # Errors
    ///
    /// See [`Operand::decode`].
    pub fn operand(self) -> Result<Operand, DecodeError> {
        Operand::decode(self.0)
    }
}

impl From<Operand> for JumpTarget {
    fn from(operand: Operand) -> Self {
        Self(operand.raw())
    }
}

impl std::fmt::Display for JumpTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.operand() {
            Ok(operand) => write!(f, "{operand}"),
            Err(_) => write!(f, "{}", self.0),
        }
    }
}
