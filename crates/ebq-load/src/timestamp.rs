//! Timestamp coercion for `load` rows.
//!
//! Timestamp cells arrive as either an epoch number (seconds, as an int or
//! float) or an ISO-8601-ish string; an empty string or JSON null means
//! "no value". The wire representation is always epoch milliseconds.

use chrono::DateTime;
use ebq_schema::EbqError;
use serde_json::Value;

pub fn parse_timestamp(value: &Value) -> Result<Option<i64>, EbqError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Some(i * 1000))
            } else if let Some(f) = n.as_f64() {
                Ok(Some((f * 1000.0).round() as i64))
            } else {
                Err(EbqError::Format(format!("timestamp number out of range: {n}")))
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
                return Ok(Some(dt.timestamp_millis()));
            }
            if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f %z") {
                return Ok(Some(dt.timestamp_millis()));
            }
            Err(EbqError::Format(format!("unrecognized timestamp format: {trimmed:?}")))
        }
        other => Err(EbqError::Format(format!("timestamp cell must be a number, string, or null, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_empty_string_are_absent() {
        assert_eq!(parse_timestamp(&Value::Null).unwrap(), None);
        assert_eq!(parse_timestamp(&Value::String(String::new())).unwrap(), None);
    }

    #[test]
    fn epoch_seconds_int_becomes_millis() {
        assert_eq!(parse_timestamp(&Value::from(1_700_000_000i64)).unwrap(), Some(1_700_000_000_000));
    }

    #[test]
    fn epoch_seconds_float_rounds() {
        assert_eq!(parse_timestamp(&Value::from(1_700_000_000.5)).unwrap(), Some(1_700_000_000_500));
    }

    #[test]
    fn rfc3339_string_parses() {
        let parsed = parse_timestamp(&Value::from("2023-11-14T22:13:20Z")).unwrap();
        assert_eq!(parsed, Some(1_700_000_000_000));
    }

    #[test]
    fn garbage_string_errors() {
        assert!(parse_timestamp(&Value::from("not a date")).is_err());
    }
}
