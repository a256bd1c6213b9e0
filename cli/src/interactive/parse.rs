use std::str::FromStr;

use nom::branch::alt;
use nom::character::complete::{alpha1, char, digit1, one_of, space0};
use nom::combinator::{all_consuming, map, map_res, opt, recognize};
use nom::error::{convert_error, VerboseError};
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::{Finish, IResult};
use thiserror::Error;
use twomode_emulator::constants as C;
use twomode_emulator::runtime::{Computer, Reg};

/// A value given to an interactive command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argument {
    /// A number literal
    Literal(C::Word),

    /// The value of a register
    Register(Reg),

    /// The value of a register, plus an offset
    Offset(Reg, C::Word),
}

impl Argument {
    pub fn evaluate<B>(self, computer: &Computer<B>) -> C::Word {
        match self {
            Argument::Literal(value) => value,
            Argument::Register(reg) => computer.registers.get(reg),
            Argument::Offset(reg, offset) => computer.registers.get(reg).wrapping_add(offset),
        }
    }
}

/// Where the `set` command writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentTarget {
    Register(Reg),
    Address(Argument),
}

#[derive(Debug, Error)]
#[error("could not parse argument: {0}")]
pub struct ParseArgumentError(String);

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

fn parse_register(input: &str) -> Res<'_, Reg> {
    map_res(recognize(preceded(opt(char('%')), alpha1)), Reg::from_str)(input)
}

fn parse_literal(input: &str) -> Res<'_, C::Word> {
    map_res(recognize(pair(opt(one_of("+-")), digit1)), C::Word::from_str)(input)
}

fn parse_offset(input: &str) -> Res<'_, Argument> {
    let (rest, (reg, sign, offset)) = tuple((
        parse_register,
        delimited(space0, one_of("+-"), space0),
        parse_literal,
    ))(input)?;

    let offset = if sign == '-' {
        offset.wrapping_neg()
    } else {
        offset
    };
    Ok((rest, Argument::Offset(reg, offset)))
}

fn parse_argument_inner(input: &str) -> Res<'_, Argument> {
    alt((
        map(parse_literal, Argument::Literal),
        parse_offset,
        map(parse_register, Argument::Register),
    ))(input)
}

fn parse_full<'a, T>(
    parser: impl FnMut(&'a str) -> Res<'a, T>,
    input: &'a str,
) -> Result<T, ParseArgumentError> {
    all_consuming(delimited(space0, parser, space0))(input)
        .finish()
        .map(|(_, value)| value)
        .map_err(|e| ParseArgumentError(convert_error(input, e)))
}

impl FromStr for Argument {
    type Err = ParseArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_full(parse_argument_inner, s)
    }
}

impl FromStr for AssignmentTarget {
    type Err = ParseArgumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse()? {
            Argument::Register(reg) => Ok(AssignmentTarget::Register(reg)),
            address => Ok(AssignmentTarget::Address(address)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use pretty_assertions::assert_eq;
    use twomode_emulator::runtime::Memory;

    use super::*;

    #[test]
    fn parse_argument_test() {
        assert_eq!("42".parse::<Argument>().unwrap(), Argument::Literal(42));
        assert_eq!("-7".parse::<Argument>().unwrap(), Argument::Literal(-7));
        assert_eq!(
            "%sp".parse::<Argument>().unwrap(),
            Argument::Register(Reg::SP)
        );
        assert_eq!("ac".parse::<Argument>().unwrap(), Argument::Register(Reg::AC));
        assert_eq!(
            "%sp+2".parse::<Argument>().unwrap(),
            Argument::Offset(Reg::SP, 2)
        );
        assert_eq!(
            "%x - 3".parse::<Argument>().unwrap(),
            Argument::Offset(Reg::X, -3)
        );
        assert!("%zz".parse::<Argument>().is_err());
        assert!("12abc".parse::<Argument>().is_err());
        assert!("".parse::<Argument>().is_err());
    }

    #[test]
    fn parse_target_test() {
        assert_eq!(
            "%pc".parse::<AssignmentTarget>().unwrap(),
            AssignmentTarget::Register(Reg::PC)
        );
        assert_eq!(
            "100".parse::<AssignmentTarget>().unwrap(),
            AssignmentTarget::Address(Argument::Literal(100))
        );
        assert_eq!(
            "%sp+1".parse::<AssignmentTarget>().unwrap(),
            AssignmentTarget::Address(Argument::Offset(Reg::SP, 1))
        );
    }

    #[test]
    fn evaluate_test() {
        let mut computer = Computer::new(Memory::default(), NonZeroU32::MIN);
        computer.registers.x = 10;

        assert_eq!(Argument::Literal(5).evaluate(&computer), 5);
        assert_eq!(Argument::Register(Reg::SP).evaluate(&computer), 999);
        assert_eq!(Argument::Offset(Reg::X, -4).evaluate(&computer), 6);
    }
}
