use std::num::NonZeroU32;

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueHint};
use tracing::{debug, info};
use twomode_emulator::runtime::{Bus, Computer, Memory, MemoryController};

use super::load_image;
use crate::interactive::run_interactive;

#[derive(Parser, Debug)]
pub struct RunOpt {
    /// Program image file
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Number of user instructions between two timer interrupts
    #[clap(value_parser)]
    interval: NonZeroU32,

    /// Run the program in interactive mode
    #[clap(short, long, action = ArgAction::SetTrue, conflicts_with = "threaded")]
    interactive: bool,

    /// Run the memory on its own thread, behind a channel
    #[clap(short, long, action = ArgAction::SetTrue)]
    threaded: bool,

    /// Seed for the random number generator
    #[clap(long, value_parser)]
    seed: Option<u64>,
}

impl RunOpt {
    fn boot<B: Bus>(&self, memory: B) -> Computer<B> {
        debug!(interval = self.interval.get(), seed = ?self.seed, "Building computer");
        let computer = Computer::new(memory, self.interval);
        match self.seed {
            Some(seed) => computer.with_seed(seed),
            None => computer,
        }
    }

    pub fn exec(self) -> anyhow::Result<()> {
        let image = load_image(&self.input)?;
        let memory = Memory::from_image(&image);

        info!("Running program");
        if self.threaded {
            let (bus, controller) = MemoryController::spawn(memory)?;
            let mut computer = self.boot(bus);
            let res = computer.run();
            // The controller stopped if the computer managed to send its halt
            // request, otherwise the bus is dropped here and it stops as well
            let registers = computer.registers.clone();
            let cycles = computer.cycles;
            drop(computer);
            controller.join()?;
            res?;
            info!(%registers, cycles, "End of program");
        } else {
            let mut computer = self.boot(memory);
            if self.interactive {
                run_interactive(&mut computer)?;
            } else {
                computer.run()?;
            }
            info!(registers = %computer.registers, cycles = computer.cycles, "End of program");
        }

        Ok(())
    }
}
