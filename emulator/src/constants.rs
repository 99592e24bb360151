pub type Address = u16;
pub type Word = u16;

/// Total size of the computer memory, in words
pub const MEMORY_SIZE: usize = 1 << 15;

/// Every arithmetic result is taken modulo this value
pub const MODULUS: u32 = 1 << 15;

/// Largest value a word can hold once resolved
pub const MAX_VALUE: Word = 0x7FFF;

/// Number of general purpose registers
pub const REGISTER_COUNT: usize = 8;

/// Raw operand encoding the first register
pub const REGISTER_BASE: Word = 0x8000;
