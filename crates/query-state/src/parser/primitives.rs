//! Codecs for scalar values.

use super::{Codec, Parser};
use query_state_core::QueryValue;
use std::sync::Arc;

/// Identity codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Codec for StringCodec {
    type Value = String;

    fn parse(&self, raw: &str) -> Option<String> {
        Some(raw.to_owned())
    }

    fn serialize(&self, value: &String) -> String {
        value.clone()
    }
}

#[must_use]
pub fn parse_as_string() -> Parser<StringCodec> {
    Parser::new(StringCodec)
}

/// Base-10 integers, read leniently from the leading digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerCodec;

impl Codec for IntegerCodec {
    type Value = i64;

    fn parse(&self, raw: &str) -> Option<i64> {
        parse_int_prefix(raw, 10)
    }

    fn serialize(&self, value: &i64) -> String {
        value.to_string()
    }
}

/// `"42"`, `" 42"` and `"42px"` all read as `42`; `"px42"` is `None`.
#[must_use]
pub fn parse_as_integer() -> Parser<IntegerCodec> {
    Parser::new(IntegerCodec)
}

/// Base-16 integers, serialized lowercase and padded to an even digit count.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexCodec;

impl Codec for HexCodec {
    type Value = i64;

    fn parse(&self, raw: &str) -> Option<i64> {
        parse_int_prefix(raw, 16)
    }

    fn serialize(&self, value: &i64) -> String {
        let digits = format!("{:x}", value.unsigned_abs());
        let padded = if digits.len() % 2 == 1 {
            format!("0{digits}")
        } else {
            digits
        };
        if *value < 0 {
            format!("-{padded}")
        } else {
            padded
        }
    }
}

#[must_use]
pub fn parse_as_hex() -> Parser<HexCodec> {
    Parser::new(HexCodec)
}

/// Leading optional sign then the longest run of digits in `radix`.
pub(super) fn parse_int_prefix(raw: &str, radix: u32) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = rest
        .char_indices()
        .find(|(_, c)| !c.is_digit(radix))
        .map_or(rest.len(), |(i, _)| i);
    if end == 0 {
        return None;
    }
    let magnitude = i128::from_str_radix(&rest[..end], radix).ok()?;
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).ok()
}

/// Decimal floating point numbers. `NaN` never decodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatCodec;

impl Codec for FloatCodec {
    type Value = f64;

    fn parse(&self, raw: &str) -> Option<f64> {
        parse_float_prefix(raw).filter(|v| !v.is_nan())
    }

    fn serialize(&self, value: &f64) -> String {
        if value.is_infinite() {
            if value.is_sign_negative() {
                "-Infinity".to_owned()
            } else {
                "Infinity".to_owned()
            }
        } else {
            value.to_string()
        }
    }
}

#[must_use]
pub fn parse_as_float() -> Parser<FloatCodec> {
    Parser::new(FloatCodec)
}

/// Longest prefix of `raw` that reads as a decimal number.
fn parse_float_prefix(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut pos = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        pos += 1;
    }
    if s[pos..].starts_with("Infinity") {
        let inf = f64::INFINITY;
        return Some(if bytes[0] == b'-' { -inf } else { inf });
    }

    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let int_end = digits_from(pos);
    let mut end = int_end;
    let mut has_digits = int_end > pos;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_end = digits_from(end + 1);
        if frac_end > end + 1 || has_digits {
            has_digits |= frac_end > end + 1;
            end = frac_end;
        }
    }
    if !has_digits {
        return None;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && matches!(bytes[exp], b'+' | b'-') {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }
    s[..end].parse().ok()
}

/// `"true"` is `true`, anything else is `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanCodec;

impl Codec for BooleanCodec {
    type Value = bool;

    fn parse(&self, raw: &str) -> Option<bool> {
        Some(raw == "true")
    }

    fn serialize(&self, value: &bool) -> String {
        value.to_string()
    }
}

#[must_use]
pub fn parse_as_boolean() -> Parser<BooleanCodec> {
    Parser::new(BooleanCodec)
}

/// Accepts one of a fixed set of string-like values.
#[derive(Debug)]
pub struct StringEnumCodec<E> {
    valid: Arc<[E]>,
}

impl<E> Clone for StringEnumCodec<E> {
    fn clone(&self) -> Self {
        Self {
            valid: Arc::clone(&self.valid),
        }
    }
}

impl<E> Codec for StringEnumCodec<E>
where
    E: AsRef<str> + QueryValue,
{
    type Value = E;

    fn parse(&self, raw: &str) -> Option<E> {
        self.valid.iter().find(|v| v.as_ref() == raw).cloned()
    }

    fn serialize(&self, value: &E) -> String {
        value.as_ref().to_owned()
    }
}

/// Restrict values to `valid`, compared by their string form.
///
/// # Example
///
/// ```rust
/// use query_state::parser::parse_as_string_enum;
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Sort { Asc, Desc }
///
/// impl AsRef<str> for Sort {
///     fn as_ref(&self) -> &str {
///         match self {
///             Sort::Asc => "asc",
///             Sort::Desc => "desc",
///         }
///     }
/// }
///
/// let sort = parse_as_string_enum([Sort::Asc, Sort::Desc]);
/// assert_eq!(sort.parse("desc"), Some(Sort::Desc));
/// assert_eq!(sort.parse("DESC"), None);
/// ```
pub fn parse_as_string_enum<E>(valid: impl IntoIterator<Item = E>) -> Parser<StringEnumCodec<E>>
where
    E: AsRef<str> + QueryValue,
{
    Parser::new(StringEnumCodec {
        valid: valid.into_iter().collect(),
    })
}
