mod parser;

pub use parser::{parse_config, NomParser, OneConfig};

use nom::combinator::all_consuming;

/// `-key value` pairs in the order they were written.
pub type Options = Vec<(String, Option<String>)>;

/// A named config item followed by its options, e.g.
/// `resolver upstream -server 8.8.8.8 -port 53`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamedOptions {
    pub name: String,
    pub options: Options,
}

impl NamedOptions {
    /// The last value given for `key`, compared case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .and_then(|(_, v)| v.as_deref())
    }
}

/// Parses a whole option value, rejecting trailing garbage.
pub fn parse_value<T: NomParser>(input: &str) -> Option<T> {
    all_consuming(T::parse)(input).ok().map(|(_, v)| v)
}
