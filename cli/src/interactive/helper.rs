use std::borrow::Cow;
use std::collections::BTreeSet;
use std::marker::PhantomData;

use anstyle::Style;
use clap::{Command, CommandFactory};
use rustyline::{
    completion::Completer,
    highlight::Highlighter,
    hint::Hinter,
    validate::{ValidationContext, ValidationResult, Validator},
    Context,
};
use rustyline_derive::Helper;

/// Register names offered for arguments which accept them
const REGISTERS: [&str; 5] = ["%pc", "%sp", "%ac", "%x", "%y"];

/// Rustyline helper, that handles interactive completion, highlighting and hinting.
#[derive(Helper, Debug)]
pub(crate) struct RunHelper<T: CommandFactory> {
    app: PhantomData<T>,
}

impl<T: CommandFactory> RunHelper<T> {
    pub fn new() -> Self {
        RunHelper { app: PhantomData }
    }
}

fn paint(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

/// Split the line into words, with an empty last word if the cursor is
/// right after a blank
fn words_before_cursor(line: &str, pos: usize) -> Option<Vec<String>> {
    let line = line.get(..pos)?;
    let mut words = shell_words::split(line).ok()?;
    if line.ends_with([' ', '\t']) {
        words.push(String::new());
    }
    Some(words)
}

fn suggest(command: &Command, input: &[String]) -> (usize, BTreeSet<String>) {
    let mut suggestions: BTreeSet<_> = command
        .get_subcommands()
        .flat_map(|cmd| {
            std::iter::once(cmd.get_name().to_string())
                .chain(cmd.get_visible_aliases().map(ToString::to_string))
        })
        .collect();

    // If the app has subcommands, it has a `help` command
    if command.has_subcommands() {
        suggestions.insert("help".to_string());
    }

    let index = input.len().saturating_sub(1);
    if let Some(arg) = command.get_positionals().nth(index) {
        if matches!(
            arg.get_id().as_str(),
            "register" | "address" | "target" | "value"
        ) {
            suggestions.extend(REGISTERS.iter().map(ToString::to_string));
        }
    }

    match input {
        [last] => (
            last.len(),
            suggestions
                .into_iter()
                .filter(|candidate| candidate.starts_with(last.as_str()))
                .collect(),
        ),

        [head, tail @ ..] => command
            .find_subcommand(head)
            .map(|sub: &Command| suggest(sub, tail))
            .unwrap_or_default(),

        [] => (0, suggestions),
    }
}

impl<T: CommandFactory> Completer for RunHelper<T> {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let Some(words) = words_before_cursor(line, pos) else {
            return Ok((0, Vec::new()));
        };

        let (offset, candidates) = suggest(&T::command(), &words);
        Ok((pos - offset, candidates.into_iter().collect()))
    }
}

impl<T: CommandFactory> Highlighter for RunHelper<T> {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(paint(Style::new().dimmed(), hint))
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        _default: bool,
    ) -> Cow<'b, str> {
        Cow::Owned(paint(Style::new().bold(), prompt))
    }
}

impl<T: CommandFactory> Hinter for RunHelper<T> {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let words = words_before_cursor(line, pos)?;
        let (offset, candidates) = suggest(&T::command(), &words);

        // Only hint when there is no ambiguity
        if candidates.len() == 1 {
            candidates
                .into_iter()
                .next()
                .and_then(|candidate| candidate.get(offset..).map(ToString::to_string))
        } else {
            None
        }
    }
}

impl<T: CommandFactory> Validator for RunHelper<T> {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        // Unbalanced quotes continue on the next line
        if shell_words::split(ctx.input()).is_err() {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::interactive::Command as DebuggerCommand;

    fn candidates(line: &str) -> (usize, Vec<String>) {
        let words = words_before_cursor(line, line.len()).unwrap();
        let (offset, candidates) = suggest(&DebuggerCommand::command(), &words);
        (offset, candidates.into_iter().collect())
    }

    #[test]
    fn suggest_commands_test() {
        assert_eq!(
            candidates("un"),
            (2, vec!["unbreak".to_string()])
        );
        assert_eq!(
            candidates("re"),
            (2, vec!["registers".to_string()])
        );
    }

    #[test]
    fn suggest_registers_test() {
        let (offset, found) = candidates("registers %s");
        assert_eq!(offset, 2);
        assert_eq!(found, vec!["%sp".to_string()]);

        let (offset, found) = candidates("memory ");
        assert_eq!(offset, 0);
        assert!(found.contains(&"%pc".to_string()));
    }
}
