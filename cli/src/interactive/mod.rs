//! This module implements the TTY interactive interface.
//!
//! It is mainly based on two crates:
//!   - rustyline, to handle the line-editting logic
//!   - clap, to handle the parsing of those interactive commands

use std::collections::BTreeSet;

use clap::Parser;
use rustyline::history::DefaultHistory;
use rustyline::{Behavior, CompletionType, Config, EditMode, Editor};
use tracing::{debug, info, warn};
use twomode_emulator::constants as C;
use twomode_emulator::runtime::{Computer, Memory, ProcessorError, Reg};

mod helper;
mod parse;
use self::helper::RunHelper;

static HELP: &str = r#"
Run "help [command]" for command-specific help.
An empty line re-runs the last valid command."#;

#[derive(Parser, Clone, Debug)]
#[clap(
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
        #[clap(value_parser, default_value = "1")]
        number: u64,
    },

    /// Exit the emulator
    Exit,

    /// Show the state of registers
    Registers {
        #[clap(value_parser)]
        register: Option<Reg>,
    },

    /// Show the content of a block in memory
    Memory {
        /// The address to show. Can be a direct address (number literal) or an
        /// indirect one (register with an optional offset).
        #[clap(value_parser)]
        address: parse::Argument,

        /// Number of memory cells to show. Negative numbers go backwards.
        #[clap(value_parser, default_value = "1", allow_negative_numbers = true)]
        number: i32,
    },

    /// Set a register or a memory cell
    Set {
        /// The address or register to set.
        #[clap(value_parser)]
        target: parse::AssignmentTarget,

        /// The value to set
        #[clap(value_parser, allow_negative_numbers = true)]
        value: parse::Argument,
    },

    /// Raise a timer interrupt now
    Interrupt,

    /// Show the next few instructions
    List {
        /// Number of instructions to show.
        #[clap(value_parser, default_value = "10")]
        number: u32,
    },

    /// Set a breakpoint
    Break {
        /// The address where to set the breakpoint
        #[clap(value_parser)]
        address: parse::Argument,
    },

    /// Remove a breakpoint
    Unbreak {
        /// The address of the breakpoint to remove
        #[clap(value_parser)]
        address: parse::Argument,
    },

    /// Continue the program until the next breakpoint or the end
    Continue,

    /// Show informations about the current debugging session
    Info {
        #[clap(subcommand)]
        sub: Option<InfoCommand>,
    },
}

#[derive(clap::Subcommand, Clone, Debug)]
enum InfoCommand {
    /// List active breakpoints
    Breakpoints,

    /// Show the number of instructions executed since the beginning of the
    /// program, and towards the next timer interrupt
    Cycles,
}

/// Holds informations about a interactive session
#[derive(Debug, Default)]
struct Session {
    /// List of active breakpoints
    breakpoints: BTreeSet<C::Address>,

    /// Next address for the `list` command
    list_address: Option<C::Address>,
}

impl Session {
    /// Add a breakpoint
    fn add_breakpoint(&mut self, address: C::Address) {
        if self.breakpoints.insert(address) {
            info!(address, "Setting a breakpoint");
        } else {
            warn!(address, "A breakpoint was already set");
        }
    }

    /// Remove a breakpoint
    fn remove_breakpoint(&mut self, address: C::Address) {
        if self.breakpoints.remove(&address) {
            info!(address, "Removing breakpoint");
        } else {
            warn!(address, "No breakpoint was set here");
        }
    }

    /// Checks if the given address has a breakpoint
    fn has_breakpoint(&self, address: C::Address) -> bool {
        self.breakpoints.contains(&address)
    }

    /// Reset the `list` command (after running an instruction)
    fn reset_list(&mut self) {
        self.list_address = None;
    }

    /// Show `count` instructions, following the previous `list` or starting at
    /// `%pc`
    fn list(&mut self, computer: &Computer, count: u32) {
        let mut address = self.list_address.unwrap_or(computer.registers.pc);
        for _ in 0..count {
            address = address.wrapping_add(self.display_instruction(computer, address));
        }
        self.list_address = Some(address);
    }

    /// Display the list of breakpoints
    fn display_breakpoints(&self, computer: &Computer) {
        match self.breakpoints.len() {
            0 => info!("No breakpoints"),
            1 => info!("1 breakpoint:"),
            x => info!("{} breakpoints:", x),
        }

        for &address in &self.breakpoints {
            self.display_instruction(computer, address);
        }
    }

    /// Display an instruction at specified address, returns its size
    fn display_instruction(&self, computer: &Computer, address: C::Address) -> C::Address {
        let is_current_line = computer.registers.pc == address;
        let has_breakpoint = self.has_breakpoint(address);

        let gutter = match (has_breakpoint, is_current_line) {
            (true, true) => "B>",
            (true, false) => "B ",
            (false, true) => " >",
            (false, false) => "  ",
        };

        // Data and instructions share the memory, anything which does not
        // decode is shown as a raw word
        if let Some(instruction) = computer.memory.instruction_at(address) {
            info!("{:<2} {:>5}    {}", gutter, address, instruction);
            instruction.size()
        } else if let Ok(word) = computer.memory.get(address) {
            info!("{:<2} {:>5}    ({})", gutter, address, word);
            1
        } else {
            info!("{:<2} {:>5}    -", gutter, address);
            1
        }
    }

    /// Display the instruction counters
    fn display_cycles(computer: &Computer) {
        info!("Cycles: {}", computer.cycles);
        info!(
            "Timer: {}/{}",
            computer.interrupt_counter, computer.timer_interval
        );
    }
}

/// Text for the `registers` command
fn describe_registers(computer: &Computer, register: Option<Reg>) -> String {
    match register {
        Some(reg) => format!("Register {} = {}", reg, computer.registers.get(reg)),
        None => format!("Registers: {}", computer.registers),
    }
}

/// Log why the computer stopped. Returns `true` if it can go on.
fn check_step(result: Result<(), ProcessorError>) -> bool {
    match result {
        Ok(()) => true,
        Err(ProcessorError::Halt) => {
            info!("Program halted");
            false
        }
        Err(e) => {
            warn!(error = &e as &dyn std::error::Error, "Halted");
            false
        }
    }
}

#[allow(clippy::too_many_lines)]
pub(crate) fn run_interactive(computer: &mut Computer<Memory>) -> anyhow::Result<()> {
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
    let mut halted = false;

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

        // Show what the program printed so far before the prompt
        warn_and_continue!(computer.flush_output());

        let Ok(readline) = rl.readline(">> ") else {
            info!("EOF, exitting");
            break;
        };

        let command = if readline.trim().is_empty() {
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

            let command = warn_and_continue!(Command::try_parse_from(words));
            last_command = Some(command.clone());
            command
        };

        debug!("Executing command: {:?}", command);

        match (command, halted) {
            (Command::Exit, _) => break,
            (Command::Step { number }, false) => {
                session.reset_list();

                for _ in 0..number {
                    if !check_step(computer.step()) {
                        halted = true;
                        continue 'read;
                    }
                }
            }

            (Command::Registers { register }, _) => {
                info!("{}", describe_registers(computer, register));
            }

            (Command::Memory { address, number }, _) => {
                let address = address.evaluate(computer);
                let direction = if number.is_negative() { -1 } else { 1 };

                for i in 0..number.unsigned_abs() {
                    let offset = i32::try_from(i).unwrap_or(i32::MAX);
                    let address = address.wrapping_add(direction * offset);
                    let value = warn_and_continue!(computer.memory.get(address));
                    info!(address, value);
                }
            }

            (Command::Set { target, value }, false) => {
                let value = value.evaluate(computer);
                match target {
                    parse::AssignmentTarget::Address(address) => {
                        let address = address.evaluate(computer);
                        info!("Setting memory at address {address} to {value}");
                        warn_and_continue!(computer.memory.set(address, value));
                    }

                    parse::AssignmentTarget::Register(reg) => {
                        info!("Setting register {reg} to {value}");
                        computer.registers.set(reg, value);
                    }
                }
            }

            (Command::Interrupt, false) => {
                session.reset_list();
                match computer.raise_timer_interrupt() {
                    Ok(true) => info!(pc = computer.registers.pc, "Entered the timer handler"),
                    Ok(false) => warn!("Already servicing an interrupt, timer event dropped"),
                    Err(e) => {
                        warn!(error = &e as &dyn std::error::Error, "Halted");
                        halted = true;
                    }
                }
            }

            (Command::List { number }, _) => {
                session.list(computer, number);
            }

            (Command::Break { address }, _) => {
                session.add_breakpoint(address.evaluate(computer));
            }

            (Command::Unbreak { address }, _) => {
                session.remove_breakpoint(address.evaluate(computer));
            }

            (Command::Continue, false) => {
                session.reset_list();
                loop {
                    if !check_step(computer.step()) {
                        halted = true;
                        continue 'read;
                    }

                    if session.has_breakpoint(computer.registers.pc) {
                        info!(address = computer.registers.pc, "Stopped at a breakpoint");
                        break;
                    }
                }
            }

            (Command::Info { sub }, _) => match sub {
                Some(InfoCommand::Breakpoints) => {
                    session.display_breakpoints(computer);
                }
                Some(InfoCommand::Cycles) => {
                    Session::display_cycles(computer);
                }
                None => {
                    session.display_breakpoints(computer);
                    info!("-");
                    Session::display_cycles(computer);
                }
            },

            (_, true) => {
                // Computer is halted but the user asked to continue, we just warn
                warn!("Computer is halted. Use \"exit\" to quit");
            }
        }
    }

    computer.shutdown()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(line: &str) -> Command {
        Command::try_parse_from(shell_words::split(line).unwrap()).unwrap()
    }

    #[test]
    fn command_definition_test() {
        Command::command().debug_assert();
    }

    #[test]
    fn parse_command_test() {
        assert!(matches!(parse("s"), Command::Step { number: 1 }));
        assert!(matches!(parse("step 5"), Command::Step { number: 5 }));
        assert!(matches!(
            parse("registers %ac"),
            Command::Registers {
                register: Some(Reg::AC)
            }
        ));
        assert!(matches!(
            parse("memory %sp -3"),
            Command::Memory {
                address: parse::Argument::Register(Reg::SP),
                number: -3
            }
        ));
        assert!(matches!(
            parse("set %x -1"),
            Command::Set {
                target: parse::AssignmentTarget::Register(Reg::X),
                value: parse::Argument::Literal(-1)
            }
        ));
        assert!(matches!(
            parse("info cycles"),
            Command::Info {
                sub: Some(InfoCommand::Cycles)
            }
        ));
        assert!(Command::try_parse_from(["registers", "%zz"]).is_err());
    }

    #[test]
    fn describe_registers_test() {
        let mut memory = Memory::default();
        memory.set(0, 29).unwrap();
        let mut computer = Computer::new(memory, NonZeroU32::MIN);
        computer.registers.set(Reg::AC, 42);

        insta::assert_snapshot!(
            describe_registers(&computer, None),
            @"Registers: %pc = 0 | %sp = 999 | %ac = 42 | %x = 0 | %y = 0 | mode = user"
        );
        insta::assert_snapshot!(describe_registers(&computer, Some(Reg::AC)), @"Register %ac = 42");

        // int
        computer.step().unwrap();
        insta::assert_snapshot!(
            describe_registers(&computer, None),
            @"Registers: %pc = 1500 | %sp = 1997 | %ac = 42 | %x = 0 | %y = 0 | mode = kernel (in interrupt)"
        );
    }

    #[test]
    fn list_test() {
        let mut memory = Memory::default();
        for (address, word) in (0..).zip([1, 5, 25, 42, 50]) {
            memory.set(address, word).unwrap();
        }
        let computer = Computer::new(memory, NonZeroU32::MIN);

        let mut session = Session::default();
        session.add_breakpoint(3);
        assert!(session.has_breakpoint(3));

        session.list(&computer, 2);
        assert_eq!(session.list_address, Some(3));
        session.list(&computer, 2);
        assert_eq!(session.list_address, Some(5));

        session.reset_list();
        session.remove_breakpoint(3);
        assert!(!session.has_breakpoint(3));
        assert_eq!(session.list_address, None);
    }
}
