use super::*;

fn any_name(input: &str) -> IResult<&str, &str> {
    preceded(
        take_while_m_n(1, 2, |c| c == '-'),
        recognize(pair(
            alpha1,
            take_while(|c: char| c == '-' || c == '_' || c.is_alphanumeric()),
        )),
    )(input)
}

pub fn option_value(input: &str) -> IResult<&str, &str> {
    preceded(
        alt((tag("="), recognize(pair(opt(char(':')), space1)))),
        recognize(pair(
            is_not("- \t#"),
            take_till(|c: char| c.is_whitespace()),
        )),
    )(input)
}

pub fn option(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    pair(any_name, opt(option_value))(input)
}

pub fn parse(input: &str) -> IResult<&str, Vec<(&str, Option<&str>)>> {
    separated_list0(space1, option)(input)
}
