//! Parsers for command-line and interactive arguments

use std::str::FromStr;

use nom::branch::alt;
use nom::bytes::complete::tag_no_case;
use nom::character::complete::{char, digit1, hex_digit1, space0};
use nom::combinator::{all_consuming, map, map_opt, map_res, verify};
use nom::error::{convert_error, VerboseError};
use nom::multi::separated_list1;
use nom::sequence::{delimited, preceded, separated_pair};
use nom::{Finish, IResult};
use synacor_vm::constants::{Address, Word, MAX_VALUE};
use synacor_vm::runtime::Reg;
use thiserror::Error;

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

#[derive(Debug, Error)]
#[error("could not parse {what}: {message}")]
pub struct ParseError {
    what: &'static str,
    message: String,
}

fn finish<'a, T>(
    what: &'static str,
    input: &'a str,
    parser: impl FnMut(&'a str) -> Res<'a, T>,
) -> Result<T, ParseError> {
    all_consuming(parser)(input)
        .finish()
        .map(|(_, value)| value)
        .map_err(|e| ParseError {
            what,
            message: convert_error(input, e),
        })
}

/// A decimal or `0x`-prefixed hexadecimal word
pub(crate) fn parse_word(input: &str) -> Res<'_, Word> {
    alt((
        map_res(preceded(tag_no_case("0x"), hex_digit1), |digits| {
            Word::from_str_radix(digits, 16)
        }),
        map_res(digit1, |digits: &str| digits.parse::<Word>()),
    ))(input)
}

/// A word in the 15-bit value range
pub(crate) fn parse_value(input: &str) -> Res<'_, Word> {
    verify(parse_word, |value| *value <= MAX_VALUE)(input)
}

fn register_index(input: &str) -> Res<'_, Reg> {
    map_opt(digit1, |digits: &str| digits.parse().ok().and_then(Reg::new))(input)
}

/// A register: `r3`, `%r3` or `R[3]`
pub(crate) fn parse_register(input: &str) -> Res<'_, Reg> {
    alt((
        delimited(tag_no_case("r["), register_index, char(']')),
        preceded(alt((tag_no_case("%r"), tag_no_case("r"))), register_index),
    ))(input)
}

fn ws<'a, T>(parser: impl FnMut(&'a str) -> Res<'a, T>) -> impl FnMut(&'a str) -> Res<'a, T> {
    delimited(space0, parser, space0)
}

/// Parse a memory address, for use as a clap value parser
pub fn address(input: &str) -> Result<Address, ParseError> {
    finish("address", input, ws(parse_value))
}

/// Parse a value, for use as a clap value parser
pub fn value(input: &str) -> Result<Word, ParseError> {
    finish("value", input, ws(parse_value))
}

/// Something that can be assigned in the debugger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Register(Reg),
    Memory(Address),
}

impl FromStr for Target {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        finish(
            "target",
            s,
            ws(alt((
                map(parse_register, Target::Register),
                map(parse_value, Target::Memory),
            ))),
        )
    }
}

/// `ADDR=WORD,WORD,...`
pub(crate) fn parse_patch(input: &str) -> Res<'_, (Address, Vec<Word>)> {
    separated_pair(
        ws(parse_value),
        char('='),
        separated_list1(char(','), ws(parse_word)),
    )(input)
}

/// `ADDR:REG=VALUE`
pub(crate) fn parse_force(input: &str) -> Res<'_, (Address, (Reg, Word))> {
    separated_pair(
        ws(parse_value),
        char(':'),
        separated_pair(ws(parse_register), char('='), ws(parse_value)),
    )(input)
}

pub(crate) fn finish_patch(input: &str) -> Result<(Address, Vec<Word>), ParseError> {
    finish("patch", input, parse_patch)
}

pub(crate) fn finish_force(input: &str) -> Result<(Address, (Reg, Word)), ParseError> {
    finish("forced register", input, parse_force)
}
