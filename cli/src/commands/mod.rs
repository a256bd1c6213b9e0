use std::process::exit;

use camino::Utf8Path;
use miette::NamedSource;
use tracing::{debug, info};
use twomode_emulator::compiler::Image;
use twomode_emulator::loader::{load_str, read_program};

mod completion;
mod dump;
mod run;

#[derive(clap::Subcommand)]
pub enum Subcommand {
    /// Load and run a program
    Run(self::run::RunOpt),

    /// Show the memory image of a program
    Dump(self::dump::DumpOpt),

    /// Generate shell completions
    Completion(self::completion::CompletionOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self) -> anyhow::Result<()> {
        match self {
            Subcommand::Run(opt) => opt.exec(),
            Subcommand::Dump(opt) => opt.exec(),
            Subcommand::Completion(opt) => opt.exec(),
        }
    }
}

/// Read and lay out a program file.
///
/// Malformed programs are reported against their source, and end the process.
fn load_image(path: &Utf8Path) -> anyhow::Result<Image> {
    info!(%path, "Reading program");
    let source = read_program(path)?;

    debug!("Parsing program");
    match load_str(&source) {
        Ok(image) => Ok(image),
        Err(e) => {
            let report =
                miette::Report::new(e).with_source_code(NamedSource::new(path.as_str(), source));
            eprintln!("{report:?}");
            exit(1);
        }
    }
}
