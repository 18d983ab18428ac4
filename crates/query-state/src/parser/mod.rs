//! Typed codecs between query-string values and application values.
//!
//! A [`Codec`] is the bare parse/serialize pair for one value kind. It is
//! wrapped in a [`Parser`], which adds declared [`Options`] and the
//! server-side entry point, and optionally in a [`ParserWithDefault`], which
//! never resolves to "absent". Every transformation returns a new value; a
//! parser is never mutated in place.
//!
//! # Example
//!
//! ```rust
//! use query_state::parser::{parse_as_integer, QueryParser};
//! use query_state_core::Options;
//!
//! let page = parse_as_integer()
//!     .with_options(Options::push())
//!     .with_default(1);
//!
//! assert_eq!(page.parse("3"), Some(3));
//! assert_eq!(page.parse("three"), None);
//! assert_eq!(page.parse_server_side(Some("three")), 1);
//! assert_eq!(page.parse_server_side(&["7".to_string(), "8".to_string()][..]), 7);
//! ```
//!
//! Decoding never fails loudly: malformed input is `None`, and callers fall
//! back to a default or to an absent state.

mod array;
mod dates;
mod json;
mod primitives;

pub use array::{parse_as_array_of, ArrayCodec};
pub use dates::{
    parse_as_iso_date, parse_as_iso_date_time, parse_as_timestamp, IsoDateCodec,
    IsoDateTimeCodec, TimestampCodec,
};
pub use json::{parse_as_json, parse_as_json_with, JsonCodec};
pub use primitives::{
    parse_as_boolean, parse_as_float, parse_as_hex, parse_as_integer, parse_as_string,
    parse_as_string_enum, BooleanCodec, FloatCodec, HexCodec, IntegerCodec, StringCodec,
    StringEnumCodec,
};

use query_state_core::{Options, QueryValue};
use std::fmt;
use std::sync::Arc;

/// Bidirectional conversion for one value kind.
///
/// `parse` must be total: out-of-domain input is `None`, never a panic.
/// `serialize` must produce a string `parse` accepts, so that
/// `parse(serialize(v)) == Some(v)` on the codec's valid domain.
pub trait Codec: Clone + Send + Sync + 'static {
    type Value: QueryValue;

    fn parse(&self, raw: &str) -> Option<Self::Value>;

    fn serialize(&self, value: &Self::Value) -> String;

    /// Equality used to detect default values.
    fn eq(&self, a: &Self::Value, b: &Self::Value) -> bool {
        a == b
    }
}

/// A raw value as handed over by a server framework: absent, one string, or
/// every occurrence of a repeated key.
///
/// Only the first occurrence is kept, like `URLSearchParams::get`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerValue<'a>(Option<&'a str>);

impl<'a> ServerValue<'a> {
    /// The string to decode: the first occurrence, or `""` when absent.
    #[must_use]
    pub fn first(&self) -> &'a str {
        self.0.unwrap_or("")
    }
}

impl<'a> From<&'a str> for ServerValue<'a> {
    fn from(value: &'a str) -> Self {
        Self(Some(value))
    }
}

impl<'a> From<&'a String> for ServerValue<'a> {
    fn from(value: &'a String) -> Self {
        Self(Some(value.as_str()))
    }
}

impl<'a> From<Option<&'a str>> for ServerValue<'a> {
    fn from(value: Option<&'a str>) -> Self {
        Self(value)
    }
}

impl<'a, S: AsRef<str>> From<&'a [S]> for ServerValue<'a> {
    fn from(values: &'a [S]) -> Self {
        Self(values.first().map(AsRef::as_ref))
    }
}

impl<'a, S: AsRef<str>> From<&'a Vec<S>> for ServerValue<'a> {
    fn from(values: &'a Vec<S>) -> Self {
        Self::from(values.as_slice())
    }
}

/// Read side shared by [`Parser`] and [`ParserWithDefault`].
///
/// `Output` is what a read resolves to: `Option<Value>` without a default,
/// `Value` with one.
pub trait QueryParser: Clone + Send + Sync + 'static {
    type Value: QueryValue;
    type Output: QueryValue;

    fn parse(&self, raw: &str) -> Option<Self::Value>;

    fn serialize(&self, value: &Self::Value) -> String;

    fn eq(&self, a: &Self::Value, b: &Self::Value) -> bool;

    /// Options declared on the parser.
    fn options(&self) -> &Options;

    fn default_value(&self) -> Option<&Self::Value>;

    /// Turn a parse result into the read result, applying the default.
    fn resolve(&self, parsed: Option<Self::Value>) -> Self::Output;

    fn is_default(&self, value: &Self::Value) -> bool {
        self.default_value()
            .is_some_and(|default| self.eq(default, value))
    }

    /// Decode a value received outside the interactive path.
    ///
    /// Repeated keys use their first occurrence, an absent key decodes `""`.
    fn parse_server_side<'a>(&self, raw: impl Into<ServerValue<'a>>) -> Self::Output {
        self.resolve(self.parse(raw.into().first()))
    }

    /// Query value to write for `value`, `None` meaning "remove the key".
    ///
    /// `options` are the effective options of the write; a value equal to the
    /// default is removed unless `clear_on_default` is turned off.
    fn serialize_for_url(&self, value: Option<&Self::Value>, options: &Options) -> Option<String> {
        let value = value?;
        if options.clears_on_default() && self.is_default(value) {
            return None;
        }
        Some(self.serialize(value))
    }
}

/// A codec with declared options.
#[derive(Debug, Clone)]
pub struct Parser<C> {
    codec: C,
    options: Options,
}

impl<C: Codec> Parser<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            options: Options::new(),
        }
    }

    pub fn parse(&self, raw: &str) -> Option<C::Value> {
        self.codec.parse(raw)
    }

    pub fn serialize(&self, value: &C::Value) -> String {
        self.codec.serialize(value)
    }

    pub fn parse_server_side<'a>(&self, raw: impl Into<ServerValue<'a>>) -> Option<C::Value> {
        QueryParser::parse_server_side(self, raw)
    }

    /// New parser with `options` shallow-merged over the current ones.
    #[must_use]
    pub fn with_options(&self, options: Options) -> Self {
        Self {
            codec: self.codec.clone(),
            options: self.options.merge(&options),
        }
    }

    /// New parser that resolves to `default` instead of `None`.
    #[must_use]
    pub fn with_default(&self, default: C::Value) -> ParserWithDefault<C> {
        ParserWithDefault {
            parser: self.clone(),
            default,
        }
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    #[must_use]
    pub fn codec(&self) -> &C {
        &self.codec
    }
}

impl<C: Codec> QueryParser for Parser<C> {
    type Value = C::Value;
    type Output = Option<C::Value>;

    fn parse(&self, raw: &str) -> Option<C::Value> {
        self.codec.parse(raw)
    }

    fn serialize(&self, value: &C::Value) -> String {
        self.codec.serialize(value)
    }

    fn eq(&self, a: &C::Value, b: &C::Value) -> bool {
        self.codec.eq(a, b)
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn default_value(&self) -> Option<&C::Value> {
        None
    }

    fn resolve(&self, parsed: Option<C::Value>) -> Option<C::Value> {
        parsed
    }
}

/// A parser that falls back to a default value.
///
/// The default is also what the URL omits: writing a value equal to it
/// removes the key (see [`Options::clear_on_default`]).
#[derive(Debug, Clone)]
pub struct ParserWithDefault<C: Codec> {
    parser: Parser<C>,
    default: C::Value,
}

impl<C: Codec> ParserWithDefault<C> {
    pub fn parse(&self, raw: &str) -> Option<C::Value> {
        self.parser.parse(raw)
    }

    pub fn serialize(&self, value: &C::Value) -> String {
        self.parser.serialize(value)
    }

    /// Never `None`: undecodable or absent input yields the default.
    pub fn parse_server_side<'a>(&self, raw: impl Into<ServerValue<'a>>) -> C::Value {
        QueryParser::parse_server_side(self, raw)
    }

    #[must_use]
    pub fn with_options(&self, options: Options) -> Self {
        Self {
            parser: self.parser.with_options(options),
            default: self.default.clone(),
        }
    }

    /// Replace the default, keeping codec and options.
    #[must_use]
    pub fn with_default(&self, default: C::Value) -> Self {
        Self {
            parser: self.parser.clone(),
            default,
        }
    }

    #[must_use]
    pub fn default_value(&self) -> &C::Value {
        &self.default
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        self.parser.options()
    }

    /// Drop the default, going back to a nullable parser.
    #[must_use]
    pub fn without_default(&self) -> Parser<C> {
        self.parser.clone()
    }
}

impl<C: Codec> QueryParser for ParserWithDefault<C> {
    type Value = C::Value;
    type Output = C::Value;

    fn parse(&self, raw: &str) -> Option<C::Value> {
        self.parser.parse(raw)
    }

    fn serialize(&self, value: &C::Value) -> String {
        self.parser.serialize(value)
    }

    fn eq(&self, a: &C::Value, b: &C::Value) -> bool {
        self.parser.codec.eq(a, b)
    }

    fn options(&self) -> &Options {
        self.parser.options()
    }

    fn default_value(&self) -> Option<&C::Value> {
        Some(&self.default)
    }

    fn resolve(&self, parsed: Option<C::Value>) -> C::Value {
        parsed.unwrap_or_else(|| self.default.clone())
    }
}

type ParseFn<T> = Arc<dyn Fn(&str) -> Option<T> + Send + Sync>;
type SerializeFn<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;
type EqFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// Codec assembled from closures, see [`create_parser`].
pub struct FnCodec<T> {
    parse: ParseFn<T>,
    serialize: SerializeFn<T>,
    eq: Option<EqFn<T>>,
}

impl<T> Clone for FnCodec<T> {
    fn clone(&self) -> Self {
        Self {
            parse: Arc::clone(&self.parse),
            serialize: Arc::clone(&self.serialize),
            eq: self.eq.clone(),
        }
    }
}

impl<T> fmt::Debug for FnCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCodec")
            .field("custom_eq", &self.eq.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: QueryValue> Codec for FnCodec<T> {
    type Value = T;

    fn parse(&self, raw: &str) -> Option<T> {
        (self.parse)(raw)
    }

    fn serialize(&self, value: &T) -> String {
        (self.serialize)(value)
    }

    fn eq(&self, a: &T, b: &T) -> bool {
        match &self.eq {
            Some(eq) => eq(a, b),
            None => a == b,
        }
    }
}

/// Build a parser for a custom value type from a parse/serialize pair.
///
/// # Example
///
/// ```rust
/// use query_state::parser::create_parser;
///
/// // "x,y" coordinates
/// let point = create_parser(
///     |raw| {
///         let (x, y) = raw.split_once(',')?;
///         Some((x.parse::<i32>().ok()?, y.parse::<i32>().ok()?))
///     },
///     |(x, y): &(i32, i32)| format!("{x},{y}"),
/// );
///
/// assert_eq!(point.parse("3,-4"), Some((3, -4)));
/// assert_eq!(point.serialize(&(1, 2)), "1,2");
/// assert_eq!(point.parse("3"), None);
/// ```
pub fn create_parser<T, P, S>(parse: P, serialize: S) -> Parser<FnCodec<T>>
where
    T: QueryValue,
    P: Fn(&str) -> Option<T> + Send + Sync + 'static,
    S: Fn(&T) -> String + Send + Sync + 'static,
{
    Parser::new(FnCodec {
        parse: Arc::new(parse),
        serialize: Arc::new(serialize),
        eq: None,
    })
}

impl<T: QueryValue> Parser<FnCodec<T>> {
    /// Replace the equality used to detect default values.
    #[must_use]
    pub fn with_eq<F>(&self, eq: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let mut codec = self.codec.clone();
        codec.eq = Some(Arc::new(eq));
        Self {
            codec,
            options: self.options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_state_core::HistoryMode;

    #[test]
    fn with_options_is_immutable() {
        let base = parse_as_integer();
        let pushed = base.with_options(Options::push().with_scroll(true));

        assert_eq!(base.options().history, None);
        assert_eq!(pushed.options().history, Some(HistoryMode::Push));
        assert_eq!(pushed.options().scroll, Some(true));

        let merged = pushed.with_options(Options::replace());
        assert_eq!(merged.options().history, Some(HistoryMode::Replace));
        assert_eq!(merged.options().scroll, Some(true));
    }

    #[test]
    fn with_options_keeps_codec_behavior() {
        let parser = parse_as_integer().with_options(Options::push());
        assert_eq!(parser.parse("42"), Some(42));
        assert_eq!(parser.serialize(&42), "42");
    }

    #[test]
    fn parse_server_side_first_wins() {
        let parser = parse_as_integer();
        let values = vec!["1".to_string(), "2".to_string()];
        assert_eq!(parser.parse_server_side(&values), Some(1));
        assert_eq!(parser.parse_server_side(&["5", "6"][..]), Some(5));
    }

    #[test]
    fn parse_server_side_absent_reads_empty_string() {
        assert_eq!(parse_as_integer().parse_server_side(None::<&str>), None);
        assert_eq!(
            parse_as_string().parse_server_side(None::<&str>),
            Some(String::new())
        );
        let empty: Vec<String> = Vec::new();
        assert_eq!(parse_as_integer().parse_server_side(&empty), None);
    }

    #[test]
    fn with_default_never_resolves_to_none() {
        let parser = parse_as_integer().with_default(10);
        assert_eq!(parser.parse_server_side(None::<&str>), 10);
        assert_eq!(parser.parse_server_side("abc"), 10);
        assert_eq!(parser.parse_server_side("7"), 7);
        assert_eq!(*parser.default_value(), 10);
        // Plain parse still reports the decode failure.
        assert_eq!(parser.parse("abc"), None);
    }

    #[test]
    fn with_default_then_options_keeps_default() {
        let parser = parse_as_integer()
            .with_default(1)
            .with_options(Options::push());
        assert_eq!(*parser.default_value(), 1);
        assert_eq!(parser.options().history, Some(HistoryMode::Push));
        assert_eq!(parser.without_default().parse_server_side("x"), None);
    }

    #[test]
    fn serialize_for_url_clears_defaults() {
        let parser = parse_as_integer().with_default(1);
        let opts = Options::new();

        assert_eq!(parser.serialize_for_url(Some(&1), &opts), None);
        assert_eq!(parser.serialize_for_url(Some(&2), &opts), Some("2".into()));
        assert_eq!(parser.serialize_for_url(None, &opts), None);

        let keep = Options::new().with_clear_on_default(false);
        assert_eq!(parser.serialize_for_url(Some(&1), &keep), Some("1".into()));

        // Without a default nothing is cleared.
        let nullable = parse_as_integer();
        assert_eq!(nullable.serialize_for_url(Some(&1), &opts), Some("1".into()));
    }

    #[test]
    fn create_parser_with_custom_eq() {
        let ci = create_parser(|raw| Some(raw.to_string()), |v: &String| v.clone())
            .with_eq(|a, b| a.eq_ignore_ascii_case(b))
            .with_default("home".to_string());

        assert!(ci.is_default(&"HOME".to_string()));
        assert_eq!(ci.serialize_for_url(Some(&"Home".into()), &Options::new()), None);
    }
}
