//! Parse a single line of a program image.
//!
//! A line is either:
//!   - a relocation, `.` followed by the address of the next value
//!   - a value, a decimal integer with an optional sign
//!   - anything else, which is ignored
//!
//! Leading blanks are skipped, and anything after a relocation or a value is a
//! comment.

use nom::branch::alt;
use nom::character::complete::{char, digit0, digit1, one_of, space0};
use nom::combinator::{map, opt, recognize, rest, value};
use nom::sequence::{pair, preceded};
use nom::IResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RawLine<'a> {
    /// The relocation token, including the leading dot
    Relocate(&'a str),

    /// The value token, including its sign
    Value(&'a str),

    Comment,
}

fn parse_relocation(input: &str) -> IResult<&str, &str> {
    recognize(preceded(char('.'), digit0))(input)
}

fn parse_value(input: &str) -> IResult<&str, &str> {
    recognize(pair(opt(one_of("+-")), digit1))(input)
}

pub(crate) fn parse_line(input: &str) -> IResult<&str, RawLine<'_>> {
    preceded(
        space0,
        alt((
            map(parse_relocation, RawLine::Relocate),
            map(parse_value, RawLine::Value),
            value(RawLine::Comment, rest),
        )),
    )(input)
}
