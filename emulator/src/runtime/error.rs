use thiserror::Error;

use super::memory::MemoryError;
use crate::constants::{Address, Word};

/// An instruction that could not be decoded
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown opcode {0}")]
    UnknownOpcode(Word),

    #[error("invalid operand {0}")]
    InvalidOperand(Word),

    #[error("invalid destination {0}, expected a register")]
    InvalidDestination(Word),
}

/// Fatal errors aborting a run
#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("could not decode instruction at address {address}: {source}")]
    Decode {
        address: Address,
        #[source]
        source: DecodeError,
    },

    #[error("pop on an empty stack at address {address}")]
    StackUnderflow { address: Address },

    #[error("division by zero at address {address}")]
    DivisionByZero { address: Address },

    #[error("input exhausted at address {address}")]
    EndOfInput { address: Address },

    #[error("invalid memory access at address {address}: {source}")]
    Memory {
        address: Address,
        #[source]
        source: MemoryError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessorError {
    /// The decoding error behind this error, if any
    #[must_use]
    pub fn decode_error(&self) -> Option<DecodeError> {
        match self {
            Self::Decode { source, .. } => Some(*source),
            _ => None,
        }
    }
}
