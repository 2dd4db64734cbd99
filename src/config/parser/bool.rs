use super::*;

impl NomParser for bool {
    fn parse(input: &str) -> IResult<&str, Self> {
        let yes = alt((
            tag_no_case("true"),
            tag_no_case("yes"),
            tag_no_case("on"),
            tag_no_case("y"),
            tag("1"),
        ));
        let no = alt((
            tag_no_case("false"),
            tag_no_case("off"),
            tag_no_case("no"),
            tag_no_case("n"),
            tag("0"),
        ));
        alt((value(true, yes), value(false, no)))(input)
    }
}
