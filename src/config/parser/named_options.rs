use super::*;

impl NomParser for NamedOptions {
    fn parse(input: &str) -> IResult<&str, Self> {
        let name = recognize(pair(
            alphanumeric1,
            take_while(|c: char| c == '-' || c == '_' || c == '.' || c.is_alphanumeric()),
        ));

        let (rest, (name, options)) =
            pair(name, opt(preceded(space1, options::parse)))(input)?;

        Ok((
            rest,
            NamedOptions {
                name: name.to_string(),
                options: options
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v.map(ToString::to_string)))
                    .collect(),
            },
        ))
    }
}
