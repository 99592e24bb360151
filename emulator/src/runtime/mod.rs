use parse_display::Display;
use tracing::{debug, info};

use crate::constants::Address;

mod console;
mod error;
mod hooks;
mod instructions;
mod memory;
mod operand;
mod registers;

pub use self::console::{Console, ScriptedInput, Terminal};
pub use self::error::{DecodeError, ProcessorError};
pub use self::hooks::Hooks;
pub use self::instructions::{Instruction, Opcode};
pub use self::memory::{Memory, MemoryError};
pub use self::operand::{JumpTarget, Operand};
pub use self::registers::{Reg, RegisterParseError, Registers};

type Result<T> = std::result::Result<T, ProcessorError>;

/// Execution status of a [`Computer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[display(style = "lowercase")]
pub enum Status {
    #[default]
    Running,
    Halted,
}

#[derive(Default, Clone)]
pub struct Computer {
    pub registers: Registers,
    pub memory: Memory,
    pub stack: Vec<crate::constants::Word>,

    /// Instruction pointer
    pub pc: Address,
    pub status: Status,

    /// Number of instructions executed so far
    pub cycles: u64,
}

impl std::fmt::Debug for Computer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Computer {{ pc: {}, status: {}, registers: {:?}, stack: {:?}, memory: [...] }}",
            self.pc, self.status, self.registers, self.stack
        )
    }
}

impl Computer {
    #[must_use]
    pub fn new(memory: Memory) -> Self {
        Self {
            memory,
            ..Self::default()
        }
    }

    fn jump(&mut self, address: Address) {
        debug!("Jumping to address {}", address);
        self.pc = address;
    }

    /// Fetch and decode the instruction at `%pc`, then move `%pc` past it
    #[tracing::instrument(skip(self), fields(pc = self.pc), err, level = "trace")]
    fn decode_instruction(&mut self) -> Result<Instruction> {
        let address = self.pc;
        let decode = |source| ProcessorError::Decode { address, source };
        let memory = |source| ProcessorError::Memory { address, source };

        let word = self.memory.get(address).map_err(memory)?;
        let opcode = Opcode::try_from(word).map_err(decode)?;
        let operands = self
            .memory
            .slice(address + 1, usize::from(opcode.arity()))
            .map_err(memory)?;
        let instruction = Instruction::decode(opcode, operands).map_err(decode)?;

        self.pc = address + opcode.width();
        Ok(instruction)
    }

    /// Run one iteration of the dispatch loop: the hook at `%pc` if any, then
    /// fetch, decode and execute. A halted computer is left untouched.
    ///
    /// # Errors
    ///
    /// Any error is fatal: the computer must not be stepped again.
    pub fn step<C: Console + ?Sized>(
        &mut self,
        console: &mut C,
        hooks: &mut Hooks<'_>,
    ) -> Result<Status> {
        if self.status == Status::Halted {
            return Ok(self.status);
        }

        // Hooks may halt the computer themselves
        if hooks.fire(self) && self.status == Status::Halted {
            return Ok(self.status);
        }

        let address = self.pc;
        let instruction = self.decode_instruction()?;
        debug!(address, "{}", instruction);
        instruction.execute(self, console, address)?;
        self.cycles += 1;

        Ok(self.status)
    }

    /// Step until the computer halts
    ///
    /// # Errors
    ///
    /// Fails on the first fatal error, leaving the computer in the state it
    /// had when the failing instruction was reached.
    #[tracing::instrument(skip_all)]
    pub fn run<C: Console + ?Sized>(
        &mut self,
        console: &mut C,
        hooks: &mut Hooks<'_>,
    ) -> Result<Status> {
        let res = loop {
            match self.step(console, hooks) {
                Ok(Status::Running) => {}
                Ok(Status::Halted) => break Ok(Status::Halted),
                Err(e) => break Err(e),
            }
        };

        // A failed flush must not mask the error that stopped the run
        let flushed = console.flush();
        let status = res?;
        flushed?;

        info!(cycles = self.cycles, "Halted");
        Ok(status)
    }
}

/// Run a program from its initial memory until it halts, and return the
/// final state of the computer.
///
/// # Errors
///
/// Fails on the first fatal error.
pub fn run<C: Console + ?Sized>(
    memory: Memory,
    console: &mut C,
    hooks: &mut Hooks<'_>,
) -> Result<Computer> {
    let mut computer = Computer::new(memory);
    computer.run(console, hooks)?;
    Ok(computer)
}

#[cfg(test)]
mod tests {
    use std::io;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::constants::Word;

    type TestTerminal<'a> = Terminal<&'a [u8], io::Empty, Vec<u8>>;

    fn terminal(input: &[u8]) -> TestTerminal<'_> {
        Terminal::new(ScriptedInput::new(input, io::empty()), Vec::new())
    }

    fn r(index: usize) -> Reg {
        Reg::new(index).unwrap()
    }

    fn load_program(program: &[Instruction]) -> Computer {
        let words: Vec<Word> = program.iter().flat_map(Instruction::encode).collect();
        Computer::new(Memory::from_words(&words).unwrap())
    }

    #[test]
    fn output_scenario_test() {
        let mut console = terminal(b"");
        let computer = run(
            Memory::from_words(&[19, 65, 0]).unwrap(),
            &mut console,
            &mut Hooks::new(),
        )
        .unwrap();

        assert_eq!(computer.status, Status::Halted);
        assert_eq!(computer.pc, 3);
        assert_eq!(computer.cycles, 2);
        assert_eq!(console.into_output(), b"A");
    }

    #[test]
    fn set_register_scenario_test() {
        let mut console = terminal(b"");
        let computer = run(
            Memory::from_words(&[1, 32768, 4, 19, 32768, 0]).unwrap(),
            &mut console,
            &mut Hooks::new(),
        )
        .unwrap();

        assert_eq!(computer.registers.get(r(0)), 4);
        assert_eq!(console.into_output(), &[4]);
    }

    #[test]
    fn step_advances_by_width_test() {
        let lit = Operand::Literal;
        let program = [
            Instruction::Noop,
            Instruction::Set(r(0), lit(1)),
            Instruction::Push(lit(2)),
            Instruction::Pop(r(1)),
            Instruction::Eq(r(2), lit(1), lit(1)),
            Instruction::Gt(r(2), lit(1), lit(1)),
            Instruction::Jt(lit(0), lit(0).into()),
            Instruction::Jf(lit(1), lit(0).into()),
            Instruction::Add(r(3), lit(1), lit(1)),
            Instruction::Mult(r(3), lit(1), lit(1)),
            Instruction::Mod(r(3), lit(1), lit(1)),
            Instruction::And(r(3), lit(1), lit(1)),
            Instruction::Or(r(3), lit(1), lit(1)),
            Instruction::Not(r(3), lit(1)),
            Instruction::Rmem(r(3), lit(0)),
            Instruction::Wmem(lit(1000), lit(1)),
            Instruction::Out(lit(10)),
            Instruction::In(r(4)),
        ];
        let mut computer = load_program(&program);
        let mut console = terminal(b"x");
        let mut hooks = Hooks::new();

        for instruction in program {
            let before = computer.pc;
            assert_eq!(computer.step(&mut console, &mut hooks).unwrap(), Status::Running);
            assert_eq!(
                computer.pc,
                before + instruction.opcode().arity() + 1,
                "after {instruction}"
            );
        }

        assert_eq!(computer.registers.get(r(1)), 2);
        assert_eq!(computer.registers.get(r(4)), Word::from(b'x'));
        assert_eq!(computer.memory.get(1000), Ok(1));
        assert_eq!(computer.cycles, 18);
    }

    #[test]
    fn jumps_test() {
        let lit = Operand::Literal;
        let mut console = terminal(b"");
        let mut hooks = Hooks::new();

        for (instruction, target) in [
            (Instruction::Jmp(lit(100)), 100),
            (Instruction::Jt(lit(7), lit(200).into()), 200),
            (Instruction::Jt(lit(0), lit(200).into()), 3),
            (Instruction::Jf(lit(0), lit(300).into()), 300),
            (Instruction::Jf(lit(1), lit(300).into()), 3),
        ] {
            let mut computer = load_program(&[instruction]);
            computer.step(&mut console, &mut hooks).unwrap();
            assert_eq!(computer.pc, target, "after {instruction}");
        }
    }

    #[test]
    fn call_ret_test() {
        let mut console = terminal(b"");
        let mut hooks = Hooks::new();

        // program:
        //  0: call 10
        //  2: halt
        // 10: ret
        let mut words = vec![0; 11];
        words[..2].copy_from_slice(&[17, 10]);
        words[10] = 18;
        let mut computer = Computer::new(Memory::from_words(&words).unwrap());

        computer.step(&mut console, &mut hooks).unwrap();
        assert_eq!(computer.pc, 10);
        assert_eq!(computer.stack, vec![2]);

        computer.step(&mut console, &mut hooks).unwrap();
        assert_eq!(computer.pc, 2);
        assert!(computer.stack.is_empty());

        assert_eq!(
            computer.step(&mut console, &mut hooks).unwrap(),
            Status::Halted
        );
    }

    #[test]
    fn ret_on_empty_stack_halts_test() {
        let mut computer = load_program(&[Instruction::Ret, Instruction::Out(Operand::Literal(65))]);
        let mut console = terminal(b"");

        let status = computer.run(&mut console, &mut Hooks::new()).unwrap();
        assert_eq!(status, Status::Halted);
        assert_eq!(computer.pc, 1);
        assert!(console.into_output().is_empty());
    }

    #[test]
    fn pop_on_empty_stack_fails_test() {
        let mut computer = load_program(&[Instruction::Noop, Instruction::Pop(r(0))]);
        let err = computer
            .run(&mut terminal(b""), &mut Hooks::new())
            .unwrap_err();
        assert!(matches!(err, ProcessorError::StackUnderflow { address: 1 }));
    }

    #[test]
    fn invalid_operand_test() {
        // out 32776
        let mut computer = Computer::new(Memory::from_words(&[21, 19, 32776]).unwrap());
        let mut console = terminal(b"");
        let err = computer.run(&mut console, &mut Hooks::new()).unwrap_err();

        assert_eq!(err.decode_error(), Some(DecodeError::InvalidOperand(32776)));
        assert!(matches!(err, ProcessorError::Decode { address: 1, .. }));
        assert!(console.into_output().is_empty());
    }

    #[test]
    fn invalid_destination_test() {
        // set 5, 1
        let mut computer = Computer::new(Memory::from_words(&[1, 5, 1]).unwrap());
        let err = computer
            .run(&mut terminal(b""), &mut Hooks::new())
            .unwrap_err();
        assert_eq!(err.decode_error(), Some(DecodeError::InvalidDestination(5)));
    }

    #[test]
    fn unknown_opcode_test() {
        let mut computer = Computer::new(Memory::from_words(&[21, 22]).unwrap());
        let err = computer
            .run(&mut terminal(b""), &mut Hooks::new())
            .unwrap_err();
        assert_eq!(err.decode_error(), Some(DecodeError::UnknownOpcode(22)));
        assert!(matches!(err, ProcessorError::Decode { address: 1, .. }));
    }

    #[test]
    fn end_of_memory_test() {
        let mut memory = Memory::default();
        // `push` as the very last cell, its operand is past the end
        *memory.get_mut(0x7FFF).unwrap() = 2;
        let mut computer = Computer::new(memory);
        computer.pc = 0x7FFF;

        let err = computer
            .run(&mut terminal(b""), &mut Hooks::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Memory {
                address: 0x7FFF,
                source: MemoryError::InvalidAddress(0x8000)
            }
        ));
    }

    #[test]
    fn echo_byte_test() {
        // in r0; out r0; halt
        let mut console = terminal(&[0xE9]);
        run(
            Memory::from_words(&[20, 32768, 19, 32768, 0]).unwrap(),
            &mut console,
            &mut Hooks::new(),
        )
        .unwrap();
        assert_eq!(console.into_output(), [0xE9]);
    }

    #[test]
    fn memory_error_reports_instruction_test() {
        // 0: rmem r0, 10; 3: wmem r0, 1; 6: halt; 10: 40000
        let mut words = vec![15, 32768, 10, 16, 32768, 1, 0];
        words.resize(10, 0);
        words.push(40000);
        let mut computer = Computer::new(Memory::from_words(&words).unwrap());

        let err = computer
            .run(&mut terminal(b""), &mut Hooks::new())
            .unwrap_err();
        assert_eq!(computer.registers.get(r(0)), 40000);
        assert!(matches!(
            err,
            ProcessorError::Memory {
                address: 3,
                source: MemoryError::InvalidAddress(40000)
            }
        ));
    }

    #[test]
    fn untaken_branch_ignores_target_test() {
        // jt 0, 40000; jf 1, 40001; out 65; halt
        let mut console = terminal(b"");
        let computer = run(
            Memory::from_words(&[7, 0, 40000, 8, 1, 40001, 19, 65, 0]).unwrap(),
            &mut console,
            &mut Hooks::new(),
        )
        .unwrap();

        assert_eq!(computer.status, Status::Halted);
        assert_eq!(console.into_output(), b"A");
    }

    #[test]
    fn taken_branch_checks_target_test() {
        // out 65; jt 1, 40000
        let mut console = terminal(b"");
        let mut computer = Computer::new(Memory::from_words(&[19, 65, 7, 1, 40000]).unwrap());
        let err = computer.run(&mut console, &mut Hooks::new()).unwrap_err();

        assert_eq!(err.decode_error(), Some(DecodeError::InvalidOperand(40000)));
        assert!(matches!(err, ProcessorError::Decode { address: 2, .. }));
        assert_eq!(console.into_output(), b"A");
    }

    /// Console whose output can never be flushed
    struct Unflushable;

    impl Console for Unflushable {
        fn write(&mut self, _value: Word) -> io::Result<()> {
            Ok(())
        }

        fn read(&mut self) -> io::Result<Option<Word>> {
            Ok(None)
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("output closed"))
        }
    }

    #[test]
    fn flush_failure_test() {
        // pop r0 on an empty stack
        let mut computer = Computer::new(Memory::from_words(&[3, 32768]).unwrap());
        let err = computer
            .run(&mut Unflushable, &mut Hooks::new())
            .unwrap_err();
        assert!(matches!(err, ProcessorError::StackUnderflow { address: 0 }));

        let mut computer = Computer::default();
        let err = computer
            .run(&mut Unflushable, &mut Hooks::new())
            .unwrap_err();
        assert!(matches!(err, ProcessorError::Io(_)));
        assert_eq!(computer.status, Status::Halted);
    }

    #[test]
    fn end_of_input_test() {
        let mut computer = load_program(&[Instruction::In(r(0)), Instruction::In(r(0))]);
        let mut console = terminal(b"a");
        let err = computer.run(&mut console, &mut Hooks::new()).unwrap_err();
        assert!(matches!(err, ProcessorError::EndOfInput { address: 2 }));
        assert_eq!(computer.registers.get(r(0)), Word::from(b'a'));
    }

    #[test]
    fn hook_splices_jump_test() {
        let mut words = vec![21; 10];
        // 10: out 'X', halt
        words.extend([19, 88, 0]);
        words.resize(20, 0);
        // 20: out 'Y', halt
        words.extend([19, 89, 0]);

        let mut hooks = Hooks::new().on(10, |computer| {
            computer.memory.write_slice(10, &[6, 20]).unwrap();
        });
        let mut console = terminal(b"");
        let computer = run(
            Memory::from_words(&words).unwrap(),
            &mut console,
            &mut hooks,
        )
        .unwrap();

        assert_eq!(console.into_output(), b"Y");
        assert_eq!(computer.pc, 23);
    }

    #[test]
    fn hook_runs_on_every_visit_test() {
        let lit = Operand::Literal;
        // 0: add R[0], R[0], 1
        // 4: jmp 0
        let mut computer = load_program(&[
            Instruction::Add(r(0), Operand::Register(r(0)), lit(1)),
            Instruction::Jmp(lit(0)),
        ]);

        let mut visits = 0;
        {
            let mut hooks = Hooks::new().on(0, |computer| {
                visits += 1;
                if computer.registers.get(r(0)) == 3 {
                    computer.status = Status::Halted;
                }
            });
            computer.run(&mut terminal(b""), &mut hooks).unwrap();
        }

        assert_eq!(visits, 4);
        assert_eq!(computer.registers.get(r(0)), 3);
        assert_eq!(computer.cycles, 6);
    }

    #[test]
    fn hook_forces_register_test() {
        // Skip a call by faking its effect
        let lit = Operand::Literal;
        let mut computer = load_program(&[
            Instruction::Call(lit(100)),
            Instruction::Out(Operand::Register(r(7))),
            Instruction::Halt,
        ]);
        let mut hooks = Hooks::new().on(0, |computer| {
            computer.registers.set(r(7), 66);
            computer.pc = 2;
        });
        let mut console = terminal(b"");
        computer.run(&mut console, &mut hooks).unwrap();

        assert!(computer.stack.is_empty());
        assert_eq!(console.into_output(), b"B");
    }

    #[test]
    fn deterministic_test() {
        let lit = Operand::Literal;
        let reg = |i| Operand::Register(r(i));
        // Echo input characters shifted by one until a newline
        let program = [
            Instruction::In(r(0)),
            Instruction::Eq(r(1), reg(0), lit(10)),
            Instruction::Jt(reg(1), lit(17).into()),
            Instruction::Add(r(0), reg(0), lit(1)),
            Instruction::Out(reg(0)),
            Instruction::Jmp(lit(0)),
            Instruction::Halt,
        ];

        let outputs: Vec<_> = (0..2)
            .map(|_| {
                let mut computer = load_program(&program);
                let mut console = terminal(b"HAL\n");
                computer.run(&mut console, &mut Hooks::new()).unwrap();
                (console.into_output(), computer.registers, computer.cycles)
            })
            .collect();

        assert_eq!(outputs[0].0, b"IBM");
        assert_eq!(outputs[0], outputs[1]);
    }

    #[test]
    fn halted_step_is_noop_test() {
        let mut computer = load_program(&[Instruction::Halt]);
        let mut console = terminal(b"");
        let mut hooks = Hooks::new();
        computer.run(&mut console, &mut hooks).unwrap();
        assert_eq!(computer.pc, 1);

        assert_eq!(
            computer.step(&mut console, &mut hooks).unwrap(),
            Status::Halted
        );
        assert_eq!(computer.pc, 1);
        assert_eq!(computer.cycles, 1);
    }
}
