//! Field extraction utilities for parsing remote records
//!
//! Records arrive as loosely-typed JSON objects. These helpers reduce the
//! boilerplate of pulling typed fields out of them.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Extract a string field. Returns `None` for missing or non-string values.
pub fn str_field<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

/// Extract an identifier that may be stored either as a string or a number.
pub fn id_field(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn bool_field(record: &Value, field: &str) -> Option<bool> {
    record.get(field).and_then(Value::as_bool)
}

/// Extract a timestamp stored as an RFC 3339 string or as unix seconds.
pub fn timestamp_field(record: &Value, field: &str) -> Option<DateTime<Utc>> {
    match record.get(field)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

/// Extract a string field from an embedded object, e.g. `author.username`.
pub fn nested_str<'a>(record: &'a Value, object: &str, field: &str) -> Option<&'a str> {
    record.get(object).and_then(|o| str_field(o, field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_field_accepts_strings_and_numbers() {
        let record = json!({"a": "abc", "b": 42, "c": "", "d": null});
        assert_eq!(id_field(&record, "a"), Some("abc".to_string()));
        assert_eq!(id_field(&record, "b"), Some("42".to_string()));
        assert_eq!(id_field(&record, "c"), None);
        assert_eq!(id_field(&record, "d"), None);
        assert_eq!(id_field(&record, "missing"), None);
    }

    #[test]
    fn test_timestamp_field_formats() {
        let record = json!({
            "iso": "2024-03-01T12:00:00Z",
            "offset": "2024-03-01T14:00:00+02:00",
            "secs": 1709294400,
            "bad": "yesterday"
        });
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(timestamp_field(&record, "iso"), Some(expected));
        assert_eq!(timestamp_field(&record, "offset"), Some(expected));
        assert_eq!(timestamp_field(&record, "secs"), Some(expected));
        assert_eq!(timestamp_field(&record, "bad"), None);
    }

    #[test]
    fn test_nested_str() {
        let record = json!({"author": {"username": "ada"}});
        assert_eq!(nested_str(&record, "author", "username"), Some("ada"));
        assert_eq!(nested_str(&record, "author", "full_name"), None);
        assert_eq!(nested_str(&record, "user", "username"), None);
    }
}
