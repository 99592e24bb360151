//! This module implements the TTY interactive interface.
//!
//! It is mainly based on two crates:
//!   - rustyline, to handle the line-editting logic
//!   - clap, to handle the parsing of those interactive commands
//!
//! Using Parser to do this is a bit of a hack, and requires some weird options
//! to have it working but works nonetheless.

use std::collections::HashSet;

use clap::Parser;
use rustyline::history::DefaultHistory;
use rustyline::{Behavior, CompletionType, Config, EditMode, Editor};
use synacor_vm::constants::{Address, Word};
use synacor_vm::runtime::{Computer, Console, Hooks, Reg, Status};
use tracing::{debug, info, warn};

use crate::parse::{self, Target};

mod helper;
use self::helper::RunHelper;

static HELP: &str = r#"
Run "help [command]" for command-specific help.
An empty line re-runs the last valid command."#;

#[derive(Parser, Clone, Debug)]
#[command(
    help_template = "{about}\n\nCOMMANDS:\n{subcommands}\n{after-help}",
    after_help = HELP,
    disable_version_flag = true,
    infer_subcommands = true,
    no_binary_name = true,
)]
/// Interactive mode commands
enum Command {
    /// Execute the next instructions
    #[command(alias = "s")]
    Step {
        /// Number of steps to execute
        #[arg(default_value = "1")]
        number: u64,
    },

    /// Exit the emulator
    Exit,

    /// Show the state of registers
    Registers { register: Option<Reg> },

    /// Show the content of a block in memory
    Memory {
        /// The first address to show
        #[arg(value_parser = parse::address)]
        address: Address,

        /// Number of memory cells to show
        #[arg(default_value = "1")]
        number: u16,
    },

    /// Set a register or a memory cell
    Set {
        /// The register or address to set
        target: Target,

        /// The value to set
        #[arg(value_parser = parse::value)]
        value: Word,
    },

    /// Show the content of the stack, top first
    Stack,

    /// Show the next few instructions
    List {
        /// Number of instructions to show
        #[arg(default_value = "10")]
        number: u16,
    },

    /// Set a breakpoint
    Break {
        /// The address where to set the breakpoint
        #[arg(value_parser = parse::address)]
        address: Address,
    },

    /// Remove a breakpoint
    Unbreak {
        /// The address of the breakpoint to remove
        #[arg(value_parser = parse::address)]
        address: Address,
    },

    /// Continue the program until the next breakpoint or halt
    #[command(alias = "c")]
    Continue,

    /// Show informations about the current debugging session
    Info {
        #[command(subcommand)]
        sub: Option<InfoCommand>,
    },
}

#[derive(clap::Subcommand, Clone, Debug)]
enum InfoCommand {
    /// List active breakpoints
    Breakpoints,

    /// List addresses with a hook
    Hooks,

    /// Show the number of instructions executed since the beginning of the program
    Cycles,
}

/// Holds informations about a interactive session
#[derive(Debug, Default)]
struct Session {
    /// List of active breakpoints
    breakpoints: HashSet<Address>,

    /// Current address for the `list` command
    list_address: Option<Address>,
}

impl Session {
    /// Add a breakpoint
    fn add_breakpoint(&mut self, address: Address) {
        if self.breakpoints.insert(address) {
            info!(address, "Setting a breakpoint");
        } else {
            warn!(address, "A breakpoint was already set");
        }
    }

    /// Remove a breakpoint
    fn remove_breakpoint(&mut self, address: Address) {
        if self.breakpoints.remove(&address) {
            info!(address, "Removing breakpoint");
        } else {
            warn!(address, "No breakpoint was set here");
        }
    }

    /// Checks if the given address has a breakpoint
    fn has_breakpoint(&self, address: Address) -> bool {
        self.breakpoints.contains(&address)
    }

    /// Reset the `list` command (after running an instruction)
    fn reset_list(&mut self) {
        self.list_address = None;
    }

    /// Display the list of breakpoints
    fn display_breakpoints(&self, computer: &Computer) {
        match self.breakpoints.len() {
            0 => info!("No breakpoints"),
            1 => info!("1 breakpoint:"),
            x => info!("{} breakpoints:", x),
        }

        // Sorted by address for readability
        let mut bp: Vec<_> = self.breakpoints.iter().copied().collect();
        bp.sort_unstable();
        for addr in bp {
            self.display_instruction(computer, addr);
        }
    }

    /// Display the instruction at the specified address, and return its width
    fn display_instruction(&self, computer: &Computer, address: Address) -> u16 {
        let is_current_line = computer.pc == address;
        let has_breakpoint = self.has_breakpoint(address);

        let gutter = match (has_breakpoint, is_current_line) {
            (true, true) => "B>",
            (true, false) => "B ",
            (false, true) => " >",
            (false, false) => "  ",
        };

        match synacor_vm::disassemble(computer.memory.as_slice(), address).next() {
            Some(Ok(line)) => {
                info!("{:<2} {}", gutter, line);
                line.width()
            }
            Some(Err(e)) => {
                info!("{:<2} {}\t({})", gutter, address, e);
                1
            }
            None => {
                info!("{:<2} {:>5}    –", gutter, address);
                1
            }
        }
    }

    /// Display the next `number` instructions, continuing the previous listing if any
    fn display_list(&mut self, computer: &Computer, number: u16) {
        let mut address = self.list_address.unwrap_or(computer.pc);
        for _ in 0..number {
            let width = self.display_instruction(computer, address);
            address = address.saturating_add(width);
        }
        self.list_address = Some(address);
    }
}

fn display_hooks(hooks: &Hooks<'_>) {
    match hooks.len() {
        0 => info!("No hooks"),
        1 => info!("1 hook:"),
        x => info!("{} hooks:", x),
    }

    for address in hooks.addresses() {
        info!("  {}", address);
    }
}

/// Display the number of instructions executed
fn display_cycles(computer: &Computer) {
    info!("Cycles: {}", computer.cycles);
}

#[allow(clippy::too_many_lines)]
pub(crate) fn run_interactive<C: Console + ?Sized>(
    computer: &mut Computer,
    console: &mut C,
    hooks: &mut Hooks<'_>,
) -> anyhow::Result<()> {
    info!("Running in interactive mode. Type \"help\" to list available commands.");
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .behavior(Behavior::PreferTerm)
        .auto_add_history(true)
        .build();

    let mut session = Session::default();

    let h: RunHelper<Command> = RunHelper::new();
    let mut rl: Editor<RunHelper<Command>, DefaultHistory> = Editor::with_config(config)?;
    rl.set_helper(Some(h));

    let mut last_command: Option<Command> = None;
    let mut halted = computer.status == Status::Halted;

    'read: loop {
        // A macro to unwrap an error, log it and continue the loop
        macro_rules! warn_and_continue {
            ($e:expr) => {
                match $e {
                    Ok(o) => o,
                    Err(e) => {
                        tracing::warn!(error = %e);
                        continue 'read;
                    }
                }
            };
        }

        // A macro to step the computer, stopping the current command once it halts
        macro_rules! step_or_halt {
            () => {
                match computer.step(console, hooks) {
                    Ok(Status::Running) => {}
                    Ok(Status::Halted) => {
                        info!(address = computer.pc, "Program halted");
                        halted = true;
                        continue 'read;
                    }
                    Err(e) => {
                        warn!(error = &e as &dyn std::error::Error, "Halted");
                        halted = true;
                        continue 'read;
                    }
                }
            };
        }

        console.flush()?;

        let Ok(readline) = rl.readline(">> ") else {
            info!("EOF, exitting");
            return Ok(());
        };

        let command = if readline.is_empty() {
            if let Some(command) = &last_command {
                command.clone()
            } else {
                info!("Type \"help\" to get the list of available commands");
                continue 'read;
            }
        } else {
            let Ok(words) = shell_words::split(readline.as_str()) else {
                warn!("Invalid input");
                continue 'read;
            };

            let command = match Command::try_parse_from(words) {
                Ok(command) => command,
                Err(e) => {
                    // Help and usage errors are meant to be displayed as-is
                    let _ = e.print();
                    continue 'read;
                }
            };
            last_command = Some(command.clone());
            command
        };

        debug!("Executing command: {:?}", command);

        match (command, halted) {
            (Command::Exit, _) => break,
            (Command::Step { number }, false) => {
                session.reset_list();

                for _ in 0..number {
                    step_or_halt!();
                }
            }

            (Command::Registers { register }, _) => {
                if let Some(reg) = register {
                    info!("Register {} = {}", reg, computer.registers.get(reg));
                } else {
                    info!("Registers: {}", computer.registers);
                }
                info!("Instruction pointer: {}", computer.pc);
            }

            (Command::Memory { address, number }, _) => {
                for i in 0..number {
                    let address = address.saturating_add(i);
                    let cell = warn_and_continue!(computer.memory.get(address));
                    info!(address, value = cell);
                }
            }

            (Command::Set { target, value }, false) => match target {
                Target::Memory(address) => {
                    info!("Setting memory at address {address} to {value}");
                    let cell = warn_and_continue!(computer.memory.get_mut(address));
                    *cell = value;
                }

                Target::Register(reg) => {
                    info!("Setting register {reg} to {value}");
                    computer.registers.set(reg, value);
                }
            },

            (Command::Stack, _) => {
                if computer.stack.is_empty() {
                    info!("Stack is empty");
                }
                for (depth, value) in computer.stack.iter().rev().enumerate() {
                    info!("{:>5}: {}", depth, value);
                }
            }

            (Command::List { number }, _) => {
                session.display_list(computer, number);
            }

            (Command::Break { address }, _) => {
                session.add_breakpoint(address);
            }

            (Command::Unbreak { address }, _) => {
                session.remove_breakpoint(address);
            }

            (Command::Continue, false) => {
                session.reset_list();

                loop {
                    step_or_halt!();

                    if session.has_breakpoint(computer.pc) {
                        info!(address = computer.pc, "Stopped at a breakpoint");
                        break;
                    }
                }
            }

            (Command::Info { sub }, _) => match sub {
                Some(InfoCommand::Breakpoints) => {
                    session.display_breakpoints(computer);
                }
                Some(InfoCommand::Hooks) => {
                    display_hooks(hooks);
                }
                Some(InfoCommand::Cycles) => {
                    display_cycles(computer);
                }
                None => {
                    session.display_breakpoints(computer);
                    info!("–");
                    display_hooks(hooks);
                    info!("–");
                    display_cycles(computer);
                }
            },

            (_, true) => {
                // Computer is halted but the user asked to continue, we just warn
                warn!("Computer is halted. Use \"exit\" to quit");
            }
        }
    }

    console.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(line: &str) -> Command {
        Command::try_parse_from(shell_words::split(line).unwrap()).unwrap()
    }

    #[test]
    fn parse_commands_test() {
        assert!(matches!(parse("s"), Command::Step { number: 1 }));
        assert!(matches!(parse("step 10"), Command::Step { number: 10 }));
        assert!(matches!(parse("c"), Command::Continue));
        assert!(matches!(
            parse("break 0x10"),
            Command::Break { address: 16 }
        ));
        assert!(matches!(
            parse("set r7 25734"),
            Command::Set {
                target: Target::Register(_),
                value: 25734
            }
        ));
        assert!(matches!(
            parse("info hooks"),
            Command::Info {
                sub: Some(InfoCommand::Hooks)
            }
        ));
        assert!(Command::try_parse_from(["set", "r7", "40000"]).is_err());
    }

    #[test]
    fn list_continues_test() {
        // 0: out 65, 2: noop, 3: halt
        let computer = Computer::new(
            synacor_vm::runtime::Memory::from_words(&[19, 65, 21, 0]).unwrap(),
        );
        let mut session = Session::default();

        session.display_list(&computer, 2);
        assert_eq!(session.list_address, Some(3));
        session.display_list(&computer, 1);
        assert_eq!(session.list_address, Some(4));

        session.reset_list();
        assert_eq!(session.list_address, None);
    }
}
