use clap::{CommandFactory, Parser};
use clap_complete::{generate, Shell};

use crate::Opt;

#[derive(Parser, Debug)]
pub struct CompletionOpt {
    /// Shell to generate completions for
    #[clap(value_enum)]
    shell: Shell,
}

impl CompletionOpt {
    pub fn exec(&self) -> anyhow::Result<()> {
        let mut command = Opt::command();
        let name = command.get_name().to_string();
        generate(self.shell, &mut command, name, &mut std::io::stdout());
        Ok(())
    }
}
