//! Date and time codecs, all in UTC.
//!
//! Malformed or out-of-range input decodes to `None` like any other codec.

use super::primitives::parse_int_prefix;
use super::{Codec, Parser};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Milliseconds since the Unix epoch, as a decimal integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampCodec;

/// Largest distance from the epoch a timestamp may have, in milliseconds.
const MAX_EPOCH_MS: i64 = 8_640_000_000_000_000;

impl Codec for TimestampCodec {
    type Value = DateTime<Utc>;

    fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        let ms = parse_int_prefix(raw, 10)?;
        if ms.unsigned_abs() > MAX_EPOCH_MS.unsigned_abs() {
            return None;
        }
        DateTime::from_timestamp_millis(ms)
    }

    fn serialize(&self, value: &DateTime<Utc>) -> String {
        value.timestamp_millis().to_string()
    }

    fn eq(&self, a: &DateTime<Utc>, b: &DateTime<Utc>) -> bool {
        a.timestamp_millis() == b.timestamp_millis()
    }
}

#[must_use]
pub fn parse_as_timestamp() -> Parser<TimestampCodec> {
    Parser::new(TimestampCodec)
}

/// ISO 8601 date-time, serialized as `2024-01-31T12:00:00.000Z`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoDateTimeCodec;

impl Codec for IsoDateTimeCodec {
    type Value = DateTime<Utc>;

    fn parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        // Signed years outside 0000-9999 fail RFC 3339 and are read here.
        // Without an offset the value is read as UTC.
        let raw = raw.strip_suffix('Z').unwrap_or(raw);
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(naive.and_utc());
            }
        }
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
        Some(date.and_hms_opt(0, 0, 0)?.and_utc())
    }

    fn serialize(&self, value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn eq(&self, a: &DateTime<Utc>, b: &DateTime<Utc>) -> bool {
        a.timestamp_millis() == b.timestamp_millis()
    }
}

#[must_use]
pub fn parse_as_iso_date_time() -> Parser<IsoDateTimeCodec> {
    Parser::new(IsoDateTimeCodec)
}

/// Calendar date, serialized as `YYYY-MM-DD`.
///
/// Anything after the date is ignored, so a full date-time decodes to its
/// date part.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsoDateCodec;

impl Codec for IsoDateCodec {
    type Value = NaiveDate;

    fn parse(&self, raw: &str) -> Option<NaiveDate> {
        NaiveDate::parse_and_remainder(raw, "%Y-%m-%d")
            .ok()
            .map(|(date, _)| date)
    }

    fn serialize(&self, value: &NaiveDate) -> String {
        value.format("%Y-%m-%d").to_string()
    }
}

#[must_use]
pub fn parse_as_iso_date() -> Parser<IsoDateCodec> {
    Parser::new(IsoDateCodec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::QueryParser;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("valid date")
    }

    #[test]
    fn timestamp_round_trip() {
        let p = parse_as_timestamp();
        let dt = utc(2024, 1, 31, 12, 0, 0);
        let s = p.serialize(&dt);
        assert_eq!(s, "1706702400000");
        assert_eq!(p.parse(&s), Some(dt));
        assert_eq!(p.parse("0"), Some(utc(1970, 1, 1, 0, 0, 0)));
        assert_eq!(p.parse("-1000"), Some(utc(1969, 12, 31, 23, 59, 59)));
    }

    #[test]
    fn timestamp_rejects_garbage_and_out_of_range() {
        let p = parse_as_timestamp();
        assert_eq!(p.parse("yesterday"), None);
        assert_eq!(p.parse(""), None);
        assert_eq!(p.parse("8640000000000001"), None);
        assert_eq!(p.parse("-9000000000000000"), None);
    }

    #[test]
    fn iso_date_time_accepts_common_forms() {
        let p = parse_as_iso_date_time();
        let noon = utc(2024, 1, 31, 12, 0, 0);
        assert_eq!(p.parse("2024-01-31T12:00:00.000Z"), Some(noon));
        assert_eq!(p.parse("2024-01-31T13:00:00+01:00"), Some(noon));
        assert_eq!(p.parse("2024-01-31T12:00:00"), Some(noon));
        assert_eq!(p.parse("2024-01-31T12:00"), Some(noon));
        assert_eq!(p.parse("2024-01-31"), Some(utc(2024, 1, 31, 0, 0, 0)));
    }

    #[test]
    fn iso_date_time_malformed_is_none() {
        let p = parse_as_iso_date_time();
        assert_eq!(p.parse("not a date"), None);
        assert_eq!(p.parse("2024-13-45"), None);
        assert_eq!(p.parse(""), None);
    }

    #[test]
    fn iso_date_time_serializes_millis_utc() {
        let p = parse_as_iso_date_time();
        let dt = utc(2024, 1, 31, 12, 0, 0);
        assert_eq!(p.serialize(&dt), "2024-01-31T12:00:00.000Z");
    }

    #[test]
    fn iso_date_time_default_compares_millis() {
        let dt = utc(2024, 1, 31, 12, 0, 0);
        let p = parse_as_iso_date_time().with_default(dt);
        let same_ms = dt + chrono::Duration::microseconds(300);
        assert!(p.is_default(&same_ms));
        assert!(!p.is_default(&(dt + chrono::Duration::milliseconds(1))));
    }

    #[test]
    fn iso_date_ignores_time_part() {
        let p = parse_as_iso_date();
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).expect("leap day");
        assert_eq!(p.parse("2024-02-29"), Some(date));
        assert_eq!(p.parse("2024-02-29T23:59:59Z"), Some(date));
        assert_eq!(p.serialize(&date), "2024-02-29");
        assert_eq!(p.parse("2023-02-29"), None);
        assert_eq!(p.parse("2024-02"), None);
    }

    #[test]
    fn extended_years_round_trip() {
        let p = parse_as_iso_date_time();
        for dt in [utc(10_000, 3, 1, 8, 30, 0), utc(-1, 12, 31, 23, 59, 59)] {
            let s = p.serialize(&dt);
            assert!(s.starts_with('+') || s.starts_with('-'), "{s}");
            assert_eq!(p.parse(&s), Some(dt));
        }

        let d = parse_as_iso_date();
        let far = NaiveDate::from_ymd_opt(12_345, 6, 7).expect("valid date");
        assert_eq!(d.parse(&d.serialize(&far)), Some(far));
    }
}
