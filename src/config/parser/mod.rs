use nom::{
    branch::*, bytes::complete::*, character::complete::*, combinator::*, multi::*, sequence::*,
    IResult,
};

mod bool;
mod log_level;
mod named_options;
mod options;

use super::*;
use crate::log::Level;

pub trait NomParser: Sized {
    fn parse(input: &str) -> IResult<&str, Self>;
}

impl NomParser for u64 {
    #[inline]
    fn parse(input: &str) -> IResult<&str, Self> {
        u64(input)
    }
}

impl NomParser for u16 {
    #[inline]
    fn parse(input: &str) -> IResult<&str, Self> {
        u16(input)
    }
}

impl NomParser for String {
    fn parse(input: &str) -> IResult<&str, Self> {
        map(is_not(" \t\r\n"), ToString::to_string)(input)
    }
}

/// one line config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OneConfig {
    LogFilter(String),
    LogLevel(Level),
    Resolver(NamedOptions),
    ZoneProvider(NamedOptions),
}

pub fn parse_config(input: &str) -> IResult<&str, OneConfig> {
    let comment = opt(preceded(space0, preceded(char('#'), not_line_ending)));

    fn parse_item<'a, T: NomParser>(
        keyword: &'static str,
    ) -> impl FnMut(&'a str) -> IResult<&str, T> {
        preceded(tuple((space0, tag_no_case(keyword), space1)), T::parse)
    }

    terminated(
        alt((
            map(parse_item("log-filter"), OneConfig::LogFilter),
            map(parse_item("log-level"), OneConfig::LogLevel),
            map(parse_item("resolver"), OneConfig::Resolver),
            map(parse_item("zone-provider"), OneConfig::ZoneProvider),
        )),
        comment,
    )(input)
}
