use parse_display::{Display, FromStr};
use tracing::{debug, trace};

use super::{
    console::Console,
    error::DecodeError,
    operand::{JumpTarget, Operand},
    registers::Reg,
    Computer, ProcessorError, Status,
};
use crate::constants::{Address, Word, MAX_VALUE, MODULUS};

/// Operation codes, in encoding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromStr)]
#[display(style = "lowercase")]
#[repr(u16)]
pub enum Opcode {
    Halt = 0,
    Set,
    Push,
    Pop,
    Eq,
    Gt,
    Jmp,
    Jt,
    Jf,
    Add,
    Mult,
    Mod,
    And,
    Or,
    Not,
    Rmem,
    Wmem,
    Call,
    Ret,
    Out,
    In,
    Noop,
}

impl Opcode {
    pub const ALL: [Self; 22] = [
        Self::Halt,
        Self::Set,
        Self::Push,
        Self::Pop,
        Self::Eq,
        Self::Gt,
        Self::Jmp,
        Self::Jt,
        Self::Jf,
        Self::Add,
        Self::Mult,
        Self::Mod,
        Self::And,
        Self::Or,
        Self::Not,
        Self::Rmem,
        Self::Wmem,
        Self::Call,
        Self::Ret,
        Self::Out,
        Self::In,
        Self::Noop,
    ];

    /// Number of operand words following the opcode
    #[must_use]
    pub const fn arity(self) -> u16 {
        match self {
            Self::Halt | Self::Ret | Self::Noop => 0,
            Self::Push | Self::Pop | Self::Jmp | Self::Call | Self::Out | Self::In => 1,
            Self::Set | Self::Jt | Self::Jf | Self::Not | Self::Rmem | Self::Wmem => 2,
            Self::Eq | Self::Gt | Self::Add | Self::Mult | Self::Mod | Self::And | Self::Or => 3,
        }
    }

    /// Total size of the instruction in memory, opcode included
    #[must_use]
    pub const fn width(self) -> u16 {
        self.arity() + 1
    }
}

impl TryFrom<Word> for Opcode {
    type Error = DecodeError;

    fn try_from(word: Word) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(word))
            .copied()
            .ok_or(DecodeError::UnknownOpcode(word))
    }
}

impl From<Opcode> for Word {
    fn from(opcode: Opcode) -> Self {
        opcode as Word
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Instruction {
    /// Stop the execution
    #[display("halt")]
    Halt,

    /// Load a register with a value
    #[display("set  {0}, {1}")]
    Set(Reg, Operand),

    /// Push a value onto the stack
    #[display("push {0}")]
    Push(Operand),

    /// Pop a value from the stack into a register
    #[display("pop  {0}")]
    Pop(Reg),

    /// Set a register to 1 if both values are equal, 0 otherwise
    #[display("eq   {0}, {1}, {2}")]
    Eq(Reg, Operand, Operand),

    /// Set a register to 1 if the first value is strictly greater, 0 otherwise
    #[display("gt   {0}, {1}, {2}")]
    Gt(Reg, Operand, Operand),

    /// Unconditional jump
    #[display("jmp  {0}")]
    Jmp(Operand),

    /// Jump if the value is not zero
    #[display("jt   {0}, {1}")]
    Jt(Operand, JumpTarget),

    /// Jump if the value is zero
    #[display("jf   {0}, {1}")]
    Jf(Operand, JumpTarget),

    #[display("add  {0}, {1}, {2}")]
    Add(Reg, Operand, Operand),

    #[display("mult {0}, {1}, {2}")]
    Mult(Reg, Operand, Operand),

    #[display("mod  {0}, {1}, {2}")]
    Mod(Reg, Operand, Operand),

    #[display("and  {0}, {1}, {2}")]
    And(Reg, Operand, Operand),

    #[display("or   {0}, {1}, {2}")]
    Or(Reg, Operand, Operand),

    /// 15-bit bitwise inverse
    #[display("not  {0}, {1}")]
    Not(Reg, Operand),

    /// Read a memory cell into a register
    #[display("rmem {0}, {1}")]
    Rmem(Reg, Operand),

    /// Write a value into a memory cell
    #[display("wmem {0}, {1}")]
    Wmem(Operand, Operand),

    /// Push the address of the next instruction and jump
    #[display("call {0}")]
    Call(Operand),

    /// Jump to the address popped from the stack, or halt if it is empty
    #[display("ret")]
    Ret,

    /// Write a character
    #[display("out  {0}")]
    Out(Operand),

    /// Read a character into a register
    #[display("in   {0}")]
    In(Reg),

    /// No-op
    #[display("noop")]
    Noop,
}

/// Wrap an intermediate result to the 15-bit value range
#[allow(clippy::cast_possible_truncation)]
const fn wrap(value: u32) -> Word {
    (value % MODULUS) as Word
}

impl Instruction {
    /// Decode an instruction from its opcode and its raw operand words.
    ///
    /// Missing operand words read as 0.
    ///
    /// # Errors
    ///
    /// Fails if a source operand is neither a literal nor a register, or if a
    /// destination operand is not a register. Conditional jump targets are
    /// only checked when the jump is taken.
    pub fn decode(opcode: Opcode, operands: &[Word]) -> Result<Self, DecodeError> {
        use Instruction::*;

        let word = |i: usize| operands.get(i).copied().unwrap_or_default();
        let src = |i: usize| Operand::decode(word(i));
        let dst = |i: usize| Operand::destination(word(i));
        let target = |i: usize| JumpTarget::new(word(i));

        let instruction = match opcode {
            Opcode::Halt => Halt,
            Opcode::Set => Set(dst(0)?, src(1)?),
            Opcode::Push => Push(src(0)?),
            Opcode::Pop => Pop(dst(0)?),
            Opcode::Eq => Eq(dst(0)?, src(1)?, src(2)?),
            Opcode::Gt => Gt(dst(0)?, src(1)?, src(2)?),
            Opcode::Jmp => Jmp(src(0)?),
            Opcode::Jt => Jt(src(0)?, target(1)),
            Opcode::Jf => Jf(src(0)?, target(1)),
            Opcode::Add => Add(dst(0)?, src(1)?, src(2)?),
            Opcode::Mult => Mult(dst(0)?, src(1)?, src(2)?),
            Opcode::Mod => Mod(dst(0)?, src(1)?, src(2)?),
            Opcode::And => And(dst(0)?, src(1)?, src(2)?),
            Opcode::Or => Or(dst(0)?, src(1)?, src(2)?),
            Opcode::Not => Not(dst(0)?, src(1)?),
            Opcode::Rmem => Rmem(dst(0)?, src(1)?),
            Opcode::Wmem => Wmem(src(0)?, src(1)?),
            Opcode::Call => Call(src(0)?),
            Opcode::Ret => Ret,
            Opcode::Out => Out(src(0)?),
            Opcode::In => In(dst(0)?),
            Opcode::Noop => Noop,
        };

        Ok(instruction)
    }

    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        use Instruction::*;

        match self {
            Halt => Opcode::Halt,
            Set(..) => Opcode::Set,
            Push(_) => Opcode::Push,
            Pop(_) => Opcode::Pop,
            Eq(..) => Opcode::Eq,
            Gt(..) => Opcode::Gt,
            Jmp(_) => Opcode::Jmp,
            Jt(..) => Opcode::Jt,
            Jf(..) => Opcode::Jf,
            Add(..) => Opcode::Add,
            Mult(..) => Opcode::Mult,
            Mod(..) => Opcode::Mod,
            And(..) => Opcode::And,
            Or(..) => Opcode::Or,
            Not(..) => Opcode::Not,
            Rmem(..) => Opcode::Rmem,
            Wmem(..) => Opcode::Wmem,
            Call(_) => Opcode::Call,
            Ret => Opcode::Ret,
            Out(_) => Opcode::Out,
            In(_) => Opcode::In,
            Noop => Opcode::Noop,
        }
    }

    /// Encode the instruction back to memory words
    #[must_use]
    pub fn encode(&self) -> Vec<Word> {
        use Instruction::*;

        let operands: Vec<Word> = match *self {
            Halt | Ret | Noop => vec![],
            Push(a) | Jmp(a) | Call(a) | Out(a) => vec![a.raw()],
            Pop(a) | In(a) => vec![a.raw()],
            Set(a, b) | Not(a, b) | Rmem(a, b) => vec![a.raw(), b.raw()],
            Jt(a, b) | Jf(a, b) => vec![a.raw(), b.raw()],
            Wmem(a, b) => vec![a.raw(), b.raw()],
            Eq(a, b, c) | Gt(a, b, c) | Add(a, b, c) | Mult(a, b, c) | Mod(a, b, c)
            | And(a, b, c) | Or(a, b, c) => vec![a.raw(), b.raw(), c.raw()],
        };

        std::iter::once(Word::from(self.opcode()))
            .chain(operands)
            .collect()
    }

    /// Execute the instruction.
    ///
    /// The instruction pointer must already point past the instruction, which
    /// was fetched from `address`.
    #[tracing::instrument(skip(computer, console), level = "trace")]
    pub(crate) fn execute<C: Console + ?Sized>(
        &self,
        computer: &mut Computer,
        console: &mut C,
        address: Address,
    ) -> Result<(), ProcessorError> {
        use Instruction::*;

        let value = |operand: Operand| computer.registers.value(operand);
        let target = |to: JumpTarget| {
            computer
                .registers
                .resolve(to.raw())
                .map_err(|source| ProcessorError::Decode { address, source })
        };

        match *self {
            Halt => {
                debug!(address, "Halting");
                computer.status = Status::Halted;
            }

            Set(reg, a) => {
                let a = value(a);
                computer.registers.set(reg, a);
            }

            Push(a) => {
                let a = value(a);
                trace!("push({})", a);
                computer.stack.push(a);
            }

            Pop(reg) => {
                let val = computer
                    .stack
                    .pop()
                    .ok_or(ProcessorError::StackUnderflow { address })?;
                trace!("pop => {}", val);
                computer.registers.set(reg, val);
            }

            Eq(reg, a, b) => {
                let (a, b) = (value(a), value(b));
                computer.registers.set(reg, Word::from(a == b));
            }

            Gt(reg, a, b) => {
                let (a, b) = (value(a), value(b));
                computer.registers.set(reg, Word::from(a > b));
            }

            Jmp(a) => {
                let a = value(a);
                computer.jump(a);
            }

            Jt(cond, a) => {
                if value(cond) != 0 {
                    let a = target(a)?;
                    computer.jump(a);
                }
            }

            Jf(cond, a) => {
                if value(cond) == 0 {
                    let a = target(a)?;
                    computer.jump(a);
                }
            }

            Add(reg, a, b) => {
                let (a, b) = (value(a), value(b));
                let res = wrap(u32::from(a) + u32::from(b));
                trace!("{} + {} = {}", a, b, res);
                computer.registers.set(reg, res);
            }

            Mult(reg, a, b) => {
                let (a, b) = (value(a), value(b));
                let res = wrap(u32::from(a) * u32::from(b));
                trace!("{} * {} = {}", a, b, res);
                computer.registers.set(reg, res);
            }

            Mod(reg, a, b) => {
                let (a, b) = (value(a), value(b));
                let res = a
                    .checked_rem(b)
                    .ok_or(ProcessorError::DivisionByZero { address })?;
                trace!("{} % {} = {}", a, b, res);
                computer.registers.set(reg, res);
            }

            And(reg, a, b) => {
                let (a, b) = (value(a), value(b));
                computer.registers.set(reg, a & b);
            }

            Or(reg, a, b) => {
                let (a, b) = (value(a), value(b));
                computer.registers.set(reg, a | b);
            }

            Not(reg, a) => {
                let a = value(a);
                computer.registers.set(reg, !a & MAX_VALUE);
            }

            Rmem(reg, a) => {
                let a = value(a);
                let cell = computer
                    .memory
                    .get(a)
                    .map_err(|source| ProcessorError::Memory { address, source })?;
                computer.registers.set(reg, cell);
            }

            Wmem(a, b) => {
                let (a, b) = (value(a), value(b));
                let cell = computer
                    .memory
                    .get_mut(a)
                    .map_err(|source| ProcessorError::Memory { address, source })?;
                *cell = b;
            }

            Call(a) => {
                let a = value(a);
                computer.stack.push(computer.pc);
                computer.jump(a);
            }

            Ret => {
                if let Some(ret) = computer.stack.pop() {
                    debug!("Returning to {}", ret);
                    computer.pc = ret;
                } else {
                    debug!(address, "Return on an empty stack, halting");
                    computer.status = Status::Halted;
                }
            }

            Out(a) => {
                let a = value(a);
                console.write(a)?;
            }

            In(reg) => {
                let c = console
                    .read()?
                    .ok_or(ProcessorError::EndOfInput { address })?;
                computer.registers.set(reg, c);
            }

            Noop => {}
        }

        Ok(())
    }
}
