use thiserror::Error;

use crate::constants::{Address, Word, MEMORY_SIZE};

/// Represents errors related to memory manipulations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The given address was out of bounds
    #[error("invalid address {0}")]
    InvalidAddress(usize),
}

/// Holds the memory cells of the computer.
///
/// It has 32768 cells, each holding a raw 16-bit word. Cells are not
/// restricted to the 15-bit value range: programs store register references
/// as operands in memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    inner: Box<[Word]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            inner: vec![0; MEMORY_SIZE].into_boxed_slice(),
        }
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.inner.iter().rposition(|&w| w != 0).map_or(0, |p| p + 1);
        write!(f, "Memory {{ used: {used}, cells: [...] }}")
    }
}

impl Memory {
    /// Build a memory whose first cells are the given words
    ///
    /// # Errors
    ///
    /// It fails if there are more words than memory cells.
    pub fn from_words(words: &[Word]) -> Result<Self, MemoryError> {
        let mut memory = Self::default();
        memory.write_slice(0, words)?;
        Ok(memory)
    }

    /// Get a cell at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get(&self, address: Address) -> Result<Word, MemoryError> {
        let addr = usize::from(address);
        self.inner
            .get(addr)
            .copied()
            .ok_or(MemoryError::InvalidAddress(addr))
    }

    /// Get a mutable reference to a cell at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get_mut(&mut self, address: Address) -> Result<&mut Word, MemoryError> {
        let addr = usize::from(address);
        self.inner
            .get_mut(addr)
            .ok_or(MemoryError::InvalidAddress(addr))
    }

    /// Get `len` consecutive cells starting at `address`
    ///
    /// # Errors
    ///
    /// It fails if any of the cells is out of bounds.
    pub fn slice(&self, address: Address, len: usize) -> Result<&[Word], MemoryError> {
        let start = usize::from(address);
        let end = start + len;
        self.inner
            .get(start..end)
            .ok_or_else(|| MemoryError::InvalidAddress(end - 1))
    }

    /// Overwrite consecutive cells starting at `address`
    ///
    /// # Errors
    ///
    /// It fails if the words do not fit before the end of memory. Nothing is
    /// written in that case.
    pub fn write_slice(&mut self, address: Address, words: &[Word]) -> Result<(), MemoryError> {
        let start = usize::from(address);
        let end = start + words.len();
        let cells = self
            .inner
            .get_mut(start..end)
            .ok_or_else(|| MemoryError::InvalidAddress(end - 1))?;
        cells.copy_from_slice(words);
        Ok(())
    }

    /// All the memory cells, in address order
    #[must_use]
    pub fn as_slice(&self) -> &[Word] {
        &self.inner
    }
}
