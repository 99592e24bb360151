mod completion;
mod disassemble;
mod run;

#[derive(clap::Subcommand, Debug)]
pub enum Subcommand {
    /// Load and run a program image
    Run(self::run::RunOpt),

    /// Print a listing of a program image
    Disassemble(self::disassemble::DisassembleOpt),

    /// Generate shell completions
    Completion(self::completion::CompletionOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self) -> anyhow::Result<()> {
        match self {
            Self::Run(opt) => opt.exec(),
            Self::Disassemble(opt) => opt.exec(),
            Self::Completion(opt) => opt.exec(),
        }
    }
}
