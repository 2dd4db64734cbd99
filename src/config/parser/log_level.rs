use super::*;

impl NomParser for Level {
    fn parse(input: &str) -> IResult<&str, Self> {
        alt((
            value(Level::TRACE, tag_no_case("trace")),
            value(Level::DEBUG, tag_no_case("debug")),
            value(Level::INFO, alt((tag_no_case("info"), tag_no_case("notice")))),
            value(Level::WARN, alt((tag_no_case("warning"), tag_no_case("warn")))),
            value(Level::ERROR, alt((tag_no_case("error"), tag_no_case("fatal")))),
        ))(input)
    }
}
