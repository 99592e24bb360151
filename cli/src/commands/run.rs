use std::fs::File;
use std::io::{self, BufRead, BufReader};

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueHint};
use synacor_vm::loader::load_file;
use synacor_vm::runtime::{Computer, ScriptedInput, Terminal};
use tracing::{debug, info};

use crate::hooks::{self, HookSpec};
use crate::interactive::run_interactive;

#[derive(Parser, Debug)]
pub struct RunOpt {
    /// Program image
    #[arg(value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Feed this file to the program before reading from the terminal
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    script: Option<Utf8PathBuf>,

    /// Overwrite memory when reaching an address. Can be used multiple times.
    #[arg(long = "patch", value_name = "ADDR=WORD,...", value_parser = HookSpec::parse_patch)]
    patches: Vec<HookSpec>,

    /// Set a register when reaching an address. Can be used multiple times.
    #[arg(long = "force", value_name = "ADDR:REG=VALUE", value_parser = HookSpec::parse_force)]
    forces: Vec<HookSpec>,

    /// Run the program in interactive mode
    #[arg(short, long, action = ArgAction::SetTrue)]
    interactive: bool,
}

impl RunOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        let memory = load_file(&self.input)?;
        let mut computer = Computer::new(memory);

        let mut hooks = hooks::build(self.patches.into_iter().chain(self.forces).collect());

        let script: Box<dyn BufRead> = if let Some(path) = &self.script {
            info!(%path, "Reading input script");
            Box::new(BufReader::new(File::open(path)?))
        } else {
            Box::new(io::empty())
        };
        let input = ScriptedInput::new(script, io::stdin().lock());
        let mut console = Terminal::new(input, io::stdout().lock());

        if self.interactive {
            run_interactive(&mut computer, &mut console, &mut hooks)?;
        } else {
            debug!("Running program");
            computer.run(&mut console, &mut hooks)?;
        }

        info!(registers = %computer.registers, cycles = computer.cycles, "End of program");

        Ok(())
    }
}
