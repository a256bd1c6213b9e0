use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueHint};
use tracing::debug;
use twomode_emulator::runtime::Memory;

use super::load_image;

#[derive(Parser, Debug)]
pub struct DumpOpt {
    /// Program image file
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Show the instruction each cell decodes to
    #[clap(short, long, action = ArgAction::SetTrue)]
    disassemble: bool,
}

impl DumpOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        let image = load_image(&self.input)?;
        let memory = Memory::from_image(&image);
        debug!(cells = image.len(), "Dumping memory");

        for (address, word) in memory.non_zero() {
            if self.disassemble {
                let instruction = memory
                    .instruction_at(address)
                    .map(|i| i.to_string())
                    .unwrap_or_default();
                println!("{address:>5}  {word:>11}  {instruction}");
            } else {
                println!("{address:>5}  {word:>11}");
            }
        }

        Ok(())
    }
}
