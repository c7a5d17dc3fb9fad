//! Value normalization between the legacy export and the destination schema
//!
//! Every table load goes through the functions in this module; no loader
//! carries its own copy of the date logic. The legacy system used a
//! year-zero placeholder date as an implicit "no value" marker, and that
//! placeholder shows up in several textual renderings depending on which
//! export produced the row. All of them must become an explicit NULL.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Any timestamp before this year is treated as invalid and nulled.
/// The legacy sentinel is year zero, but malformed exports have produced
/// other pre-epoch garbage, so the backstop is a plain year check.
pub const MIN_VALID_YEAR: i32 = 1900;

/// First instant of the first valid year, for SQL-side sweeps
pub const MIN_VALID_DATE: &str = "1900-01-01";

/// Textual renderings of the year-zero sentinel seen in real exports.
/// The last one is how a dynamic-language date library prints a date that
/// was constructed from an all-zero calendar value.
const SENTINEL_RENDERINGS: &[&str] = &[
    "0000-00-00",
    "0000-00-00 00:00:00",
    "0000-01-01",
    "0000-01-01T00:00:00.000Z",
    "-000001-11-30T00:00:00.000Z",
];

/// Normalize a legacy timestamp value.
///
/// Returns `None` for JSON null, empty strings, any sentinel rendering, and
/// any date earlier than [`MIN_VALID_YEAR`]. A string that parses to a
/// valid post-1900 date is returned exactly as parsed (round-trip safe).
/// A string that does not parse at all is also `None`; the legacy export
/// contains such values only in nullable columns, and required-column
/// absence is caught later by record validation.
pub fn normalize_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = match value {
        Value::Null => return None,
        Value::String(s) => s.trim(),
        // Some exports emit epoch milliseconds for date-times
        Value::Number(n) => {
            let millis = n.as_i64()?;
            let parsed = Utc.timestamp_millis_opt(millis).single()?;
            return check_year(parsed);
        }
        _ => return None,
    };

    if raw.is_empty() || SENTINEL_RENDERINGS.contains(&raw) {
        return None;
    }

    parse_timestamp(raw).and_then(check_year)
}

/// Parse the date formats the legacy export actually contains
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }

    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
    }

    None
}

fn check_year(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    use chrono::Datelike;
    if dt.year() < MIN_VALID_YEAR {
        None
    } else {
        Some(dt)
    }
}

/// Normalize a legacy boolean: native bool, 0/1 numbers, or their string
/// renderings. Anything else is `None`.
pub fn normalize_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "0" | "false" | "FALSE" => Some(false),
            "1" | "true" | "TRUE" => Some(true),
            _ => None,
        },
        _ => None,
    }
}

/// Normalize an external-system identifier.
///
/// The legacy export renders these as strings because they can exceed the
/// range of the export tool's native number type. The destination column is
/// a 64-bit integer; anything that does not fit (or does not parse)
/// degrades to `None` rather than failing the record.
pub fn normalize_big_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use serde_json::json;

    #[test]
    fn test_sentinel_renderings_become_null() {
        for raw in [
            "0000-00-00",
            "0000-00-00 00:00:00",
            "0000-01-01",
            "0000-01-01T00:00:00.000Z",
            "-000001-11-30T00:00:00.000Z",
        ] {
            assert_eq!(normalize_timestamp(&json!(raw)), None, "raw={raw}");
        }
    }

    #[test]
    fn test_null_and_empty_become_null() {
        assert_eq!(normalize_timestamp(&Value::Null), None);
        assert_eq!(normalize_timestamp(&json!("")), None);
        assert_eq!(normalize_timestamp(&json!("   ")), None);
    }

    #[test]
    fn test_pre_1900_backstop() {
        assert_eq!(normalize_timestamp(&json!("1899-12-31")), None);
        assert_eq!(normalize_timestamp(&json!("1899-12-31 23:59:59")), None);
        assert_eq!(normalize_timestamp(&json!("0001-01-01T00:00:00Z")), None);

        // Boundary: 1900 itself is valid
        let dt = normalize_timestamp(&json!("1900-01-01")).unwrap();
        assert_eq!(dt.year(), 1900);
    }

    #[test]
    fn test_valid_dates_round_trip() {
        let dt = normalize_timestamp(&json!("2023-06-15T14:30:00Z")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2023-06-15T14:30:00+00:00");

        let dt = normalize_timestamp(&json!("2023-06-15 14:30:00")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2023-06-15T14:30:00+00:00");

        let dt = normalize_timestamp(&json!("2023-06-15")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2023-06-15T00:00:00+00:00");
    }

    #[test]
    fn test_epoch_millis() {
        // 2021-01-01T00:00:00Z
        let dt = normalize_timestamp(&json!(1609459200000i64)).unwrap();
        assert_eq!(dt.year(), 2021);

        // Epoch-milli zero is 1970, which is valid
        assert!(normalize_timestamp(&json!(0)).is_some());
    }

    #[test]
    fn test_garbage_dates_become_null() {
        assert_eq!(normalize_timestamp(&json!("not a date")), None);
        assert_eq!(normalize_timestamp(&json!("2023-13-45")), None);
    }

    #[test]
    fn test_normalize_bool() {
        assert_eq!(normalize_bool(&json!(true)), Some(true));
        assert_eq!(normalize_bool(&json!(false)), Some(false));
        assert_eq!(normalize_bool(&json!(1)), Some(true));
        assert_eq!(normalize_bool(&json!(0)), Some(false));
        assert_eq!(normalize_bool(&json!("1")), Some(true));
        assert_eq!(normalize_bool(&json!("0")), Some(false));
        assert_eq!(normalize_bool(&json!("true")), Some(true));
        assert_eq!(normalize_bool(&json!("false")), Some(false));
        assert_eq!(normalize_bool(&json!(2)), None);
        assert_eq!(normalize_bool(&json!("yes")), None);
        assert_eq!(normalize_bool(&Value::Null), None);
    }

    #[test]
    fn test_normalize_big_id() {
        assert_eq!(normalize_big_id(&json!(42)), Some(42));
        assert_eq!(normalize_big_id(&json!("9007199254740993")), Some(9007199254740993));
        assert_eq!(normalize_big_id(&json!("  123 ")), Some(123));

        // Degrades to absence, never an error
        assert_eq!(normalize_big_id(&json!("not-a-number")), None);
        assert_eq!(normalize_big_id(&json!("99999999999999999999999")), None);
        assert_eq!(normalize_big_id(&Value::Null), None);
        assert_eq!(normalize_big_id(&json!(1.5)), None);
    }
}
