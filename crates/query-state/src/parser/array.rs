//! Lists of items joined by a separator in one query parameter.

use super::{Codec, Parser};

const DEFAULT_SEPARATOR: &str = ",";

/// Unreserved characters besides alphanumerics.
const UNRESERVED_MARKS: &str = "-_.~";

#[derive(Debug, Clone)]
pub struct ArrayCodec<C> {
    item: C,
    separator: String,
}

impl<C: Codec> ArrayCodec<C> {
    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// URI-encode an item. Encoding leaves `-_.~` alone, so the ones the
    /// separator uses are escaped as well.
    fn escape_item(&self, item: &str) -> String {
        let mut encoded = urlencoding::encode(item).into_owned();
        for byte in self
            .separator
            .bytes()
            .filter(|b| UNRESERVED_MARKS.as_bytes().contains(b))
        {
            encoded = encoded.replace(char::from(byte), percent_encoding::percent_encode_byte(byte));
        }
        encoded
    }
}

/// Whether no URI-encoded item can contain `separator`: it needs one
/// character other than ASCII alphanumerics and `%`.
fn is_valid_separator(separator: &str) -> bool {
    separator
        .chars()
        .any(|c| !c.is_ascii_alphanumeric() && c != '%')
}

impl<C: Codec> Codec for ArrayCodec<C> {
    type Value = Vec<C::Value>;

    fn parse(&self, raw: &str) -> Option<Vec<C::Value>> {
        if raw.is_empty() {
            return Some(Vec::new());
        }
        let items = raw
            .split(self.separator.as_str())
            .filter_map(|item| {
                let decoded = urlencoding::decode(item).ok()?;
                let parsed = self.item.parse(&decoded);
                if parsed.is_none() {
                    tracing::trace!(item, "dropping undecodable array item");
                }
                parsed
            })
            .collect();
        Some(items)
    }

    fn serialize(&self, value: &Vec<C::Value>) -> String {
        value
            .iter()
            .map(|item| self.escape_item(&self.item.serialize(item)))
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    fn eq(&self, a: &Vec<C::Value>, b: &Vec<C::Value>) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.item.eq(x, y))
    }
}

/// Comma-separated list of values decoded by `item`.
///
/// Items that fail to decode are dropped, an empty query value is an empty
/// list.
///
/// # Example
///
/// ```rust
/// use query_state::parser::{parse_as_array_of, parse_as_integer, parse_as_string};
///
/// let ids = parse_as_array_of(parse_as_integer());
/// assert_eq!(ids.parse("1,2,x,3"), Some(vec![1, 2, 3]));
/// assert_eq!(ids.parse(""), Some(vec![]));
///
/// let tags = parse_as_array_of(parse_as_string()).with_separator("|");
/// let raw = tags.serialize(&vec!["a|b".to_string(), "c".to_string()]);
/// assert_eq!(raw, "a%7Cb|c");
/// assert_eq!(tags.parse(&raw), Some(vec!["a|b".to_string(), "c".to_string()]));
/// ```
#[must_use]
pub fn parse_as_array_of<C: Codec>(item: Parser<C>) -> Parser<ArrayCodec<C>> {
    Parser::new(ArrayCodec {
        item: item.codec,
        separator: DEFAULT_SEPARATOR.to_owned(),
    })
}

impl<C: Codec> Parser<ArrayCodec<C>> {
    /// New parser splitting on `separator`.
    ///
    /// A separator made only of ASCII alphanumerics and `%` could occur
    /// inside encoded items; it is rejected with a warning and `,` is kept.
    #[must_use]
    pub fn with_separator(&self, separator: impl Into<String>) -> Self {
        let mut separator = separator.into();
        if !is_valid_separator(&separator) {
            tracing::warn!(%separator, "unusable array separator, keeping \"{DEFAULT_SEPARATOR}\"");
            separator = DEFAULT_SEPARATOR.to_owned();
        }
        Self {
            codec: ArrayCodec {
                item: self.codec.item.clone(),
                separator,
            },
            options: self.options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_as_float, parse_as_integer, parse_as_string, QueryParser};
    use proptest::prelude::*;

    #[test]
    fn empty_string_is_empty_list() {
        let p = parse_as_array_of(parse_as_integer());
        assert_eq!(p.parse(""), Some(vec![]));
        assert_eq!(p.serialize(&vec![]), "");
    }

    #[test]
    fn drops_invalid_items() {
        let p = parse_as_array_of(parse_as_integer());
        assert_eq!(p.parse("1,,two,3"), Some(vec![1, 3]));
        assert_eq!(p.parse("a,b"), Some(vec![]));
    }

    #[test]
    fn escapes_separator_and_percent() {
        let p = parse_as_array_of(parse_as_string());
        let items = vec!["a,b".to_string(), "50%".to_string(), "c d".to_string()];
        let raw = p.serialize(&items);
        assert_eq!(raw, "a%2Cb,50%25,c%20d");
        assert_eq!(p.parse(&raw), Some(items));
    }

    #[test]
    fn custom_separator() {
        let p = parse_as_array_of(parse_as_float()).with_separator(";");
        assert_eq!(p.serialize(&vec![1.5, 2.0]), "1.5;2");
        assert_eq!(p.parse("1.5;2"), Some(vec![1.5, 2.0]));
        assert_eq!(p.codec().separator(), ";");

        let fallback = p.with_separator("");
        assert_eq!(fallback.codec().separator(), ",");
    }

    #[test]
    fn separators_that_clash_with_encoding_fall_back() {
        let p = parse_as_array_of(parse_as_string());
        assert_eq!(p.with_separator("and").codec().separator(), ",");
        assert_eq!(p.with_separator("%2").codec().separator(), ",");
        assert_eq!(p.with_separator("-or-").codec().separator(), "-or-");
    }

    #[test]
    fn unreserved_separator_is_escaped_in_items() {
        let p = parse_as_array_of(parse_as_string()).with_separator("~");
        let items = vec!["a~b".to_string(), "c.d".to_string()];
        let raw = p.serialize(&items);
        assert_eq!(raw, "a%7Eb~c.d");
        assert_eq!(p.parse(&raw), Some(items));
    }

    #[test]
    fn element_wise_default_detection() {
        let p = parse_as_array_of(parse_as_integer()).with_default(vec![1, 2]);
        assert!(p.is_default(&vec![1, 2]));
        assert!(!p.is_default(&vec![2, 1]));
        assert!(!p.is_default(&vec![1]));
    }

    proptest! {
        #[test]
        fn integer_lists_round_trip(items in proptest::collection::vec(any::<i64>(), 0..8)) {
            let p = parse_as_array_of(parse_as_integer());
            prop_assert_eq!(p.parse(&p.serialize(&items)), Some(items));
        }

        #[test]
        fn string_lists_round_trip(
            items in proptest::collection::vec(".*", 0..6)
                .prop_filter("a lone empty item reads as an empty list", |v| {
                    v.len() != 1 || !v[0].is_empty()
                }),
            sep in prop_oneof![Just(","), Just("|"), Just("~"), Just("--")],
        ) {
            let p = parse_as_array_of(parse_as_string()).with_separator(sep);
            prop_assert_eq!(p.parse(&p.serialize(&items)), Some(items));
        }
    }
}
