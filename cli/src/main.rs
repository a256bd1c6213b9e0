#![forbid(unsafe_code)]

use std::io::IsTerminal;
use std::process::exit;

use clap::{ArgAction, ArgGroup, Parser};
use tracing::{error, Level};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

mod commands;
mod interactive;

use crate::commands::Subcommand;

#[derive(Parser)]
#[clap(name = "twomode", version, author, about, group = ArgGroup::new("format"))]
struct Opt {
    /// Increase the level of verbosity. Can be used multiple times.
    #[clap(short, long, action = ArgAction::Count, global(true))]
    verbose: u8,

    /// Force colored output. Default is to check if the output is a tty
    #[clap(short = 'c', long, global(true), group = "format")]
    color: bool,

    /// Force non-colored output. Default is to check if the output is a tty
    #[clap(short = 'C', long, global(true), group = "format")]
    no_color: bool,

    /// Use JSON output for log messages
    #[clap(short, long, global(true), group = "format")]
    json: bool,

    #[clap(subcommand)]
    command: Subcommand,
}

impl Opt {
    const fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "twomode_emulator=info,twomode_cli=info,warn",
            2 => "twomode_emulator=debug,twomode_cli=debug,info",
            3 => "twomode_emulator=trace,twomode_cli=trace,info",
            4..=u8::MAX => "trace",
        }
    }

    fn should_use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            std::io::stderr().is_terminal()
        }
    }

    fn filter_layer(&self) -> EnvFilter {
        // Parse log level from env
        EnvFilter::try_from_default_env()
            // or infer from args
            .unwrap_or_else(|_| EnvFilter::new(self.log_filter()))
    }
}

/// The line printed on stderr when a command fails, whatever the log filter
fn fatal_diagnostic(e: &anyhow::Error) -> String {
    format!("error: {e:#}").replace('\n', " ")
}

fn main() {
    // First, parse the arguments
    let opt = Opt::parse();

    // Then, setup the tracing formatter for logging and instrumentation. Logs
    // go to stderr, stdout belongs to the simulated program.
    let registry = tracing_subscriber::Registry::default().with(opt.filter_layer());

    if opt.json {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr);
        registry.with(json_layer).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .without_time()
            .with_ansi(opt.should_use_colors())
            .with_target(false)
            .with_writer(std::io::stderr);
        registry.with(fmt_layer).init();
    }

    // And run the command
    let logs_errors = tracing::enabled!(Level::ERROR);
    let res = opt.command.exec();
    if let Err(e) = res {
        error!("{:#}", e);
        // Failures are reported even when logging is turned off
        if !logs_errors {
            eprintln!("{}", fatal_diagnostic(&e));
        }
        exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_test() {
        Opt::command().debug_assert();
    }

    #[test]
    fn fatal_diagnostic_test() {
        let e = anyhow::Error::new(std::io::Error::other("disk\nfull")).context("could not run");
        let line = fatal_diagnostic(&e);
        assert_eq!(line.lines().count(), 1);
        insta::assert_snapshot!(line, @"error: could not run: disk full");
    }

    #[test]
    fn parse_run_test() {
        let opt = Opt::try_parse_from(["twomode", "-vv", "run", "sample.txt", "30"]).unwrap();
        assert_eq!(opt.verbose, 2);
        assert!(matches!(opt.command, Subcommand::Run(_)));

        // The interval must be a positive integer
        assert!(Opt::try_parse_from(["twomode", "run", "sample.txt", "0"]).is_err());
        assert!(Opt::try_parse_from(["twomode", "run", "sample.txt", "abc"]).is_err());
        assert!(Opt::try_parse_from(["twomode", "run", "sample.txt"]).is_err());
        assert!(
            Opt::try_parse_from(["twomode", "run", "sample.txt", "5", "--interactive", "--threaded"])
                .is_err()
        );
    }
}
