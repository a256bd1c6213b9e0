//! Program image parsing logic
//!
//! The image is a plain text file, one value per line. The line grammar lives
//! in [`line`] and is handled by the `nom` library; this module turns the
//! tokens into numbers and keeps track of where each line came from.

use miette::{Diagnostic, SourceSpan};
use nom::{Finish, Offset};
use thiserror::Error;

use crate::constants::{Address, Word};

use self::line::RawLine;
use self::location::{Locatable, Located};

mod line;
pub mod location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    /// Place the next value at this address
    Relocate(Address),

    /// A memory word
    Value(Word),

    /// Blank lines and comments
    Comment,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Program {
    pub lines: Vec<Located<Line>>,
}

impl Program {
    /// Iterate over the lines which have an effect on memory
    pub fn items(&self) -> impl Iterator<Item = &Located<Line>> {
        self.lines
            .iter()
            .filter(|line| !matches!(line.inner, Line::Comment))
    }
}

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid relocation, expected an address after '.'")]
    #[diagnostic(code(twomode::parse::relocation))]
    InvalidRelocation {
        #[label("here")]
        span: SourceSpan,
    },

    #[error("value does not fit in a memory word")]
    #[diagnostic(code(twomode::parse::value))]
    ValueOutOfRange {
        #[label("here")]
        span: SourceSpan,
    },

    #[error("could not parse line")]
    #[diagnostic(code(twomode::parse::syntax))]
    Syntax {
        #[label("here")]
        span: SourceSpan,
    },
}

impl ParseError {
    #[must_use]
    pub fn span(&self) -> SourceSpan {
        match self {
            ParseError::InvalidRelocation { span }
            | ParseError::ValueOutOfRange { span }
            | ParseError::Syntax { span } => *span,
        }
    }
}

fn parse_program_line(input: &str, line: &str) -> Result<Located<Line>, ParseError> {
    let offset = input.offset(line);
    let span_of = |token: &str| {
        let start = offset + line.offset(token);
        SourceSpan::from(start..start + token.len())
    };

    let (_, raw) = line::parse_line(line).finish().map_err(|_| ParseError::Syntax {
        span: span_of(line),
    })?;

    let parsed = match raw {
        RawLine::Relocate(token) => token[1..]
            .parse()
            .map(Line::Relocate)
            .map_err(|_| ParseError::InvalidRelocation {
                span: span_of(token),
            })?,

        RawLine::Value(token) => {
            token
                .parse()
                .map(Line::Value)
                .map_err(|_| ParseError::ValueOutOfRange {
                    span: span_of(token),
                })?
        }

        RawLine::Comment => Line::Comment,
    };

    Ok(parsed.with_location(offset..offset + line.len()))
}

/// Parse a program image
///
/// # Errors
///
/// This function will return an error on the first malformed relocation or
/// value.
#[tracing::instrument(skip(input), fields(length = input.len()))]
pub fn parse(input: &str) -> Result<Program, ParseError> {
    let lines = input
        .lines()
        .map(|line| parse_program_line(input, line))
        .collect::<Result<_, _>>()?;

    Ok(Program { lines })
}
