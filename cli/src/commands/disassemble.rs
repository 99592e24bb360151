use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Parser, ValueHint};
use synacor_vm::constants::Address;
use synacor_vm::loader::words;
use tracing::{debug, info};

use crate::parse;

#[derive(Parser, Debug)]
pub struct DisassembleOpt {
    /// Program image
    #[arg(value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Address to start the listing at
    #[arg(short, long, default_value = "0", value_parser = parse::address)]
    start: Address,

    /// Maximum number of lines to print
    #[arg(short = 'n', long)]
    count: Option<usize>,
}

impl DisassembleOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        info!(path = %self.input, "Reading program");
        let bytes = std::fs::read(&self.input)?;
        let image = words(&bytes);
        debug!(words = image.len(), start = self.start, "Disassembling");

        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        let lines = synacor_vm::disassemble(&image, self.start)
            .take(self.count.unwrap_or(usize::MAX));
        for line in lines {
            writeln!(out, "{}", line?)?;
        }
        out.flush()?;

        Ok(())
    }
}
