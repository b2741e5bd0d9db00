// models/src/timestamp.rs
//! Lenient parsing of the date strings browsers send from `date` and
//! `datetime-local` inputs, plus serde adapters for request bodies.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::errors::{ValidationError, ValidationResult};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Accepts RFC 3339, naive date-times (taken as UTC) and bare `YYYY-MM-DD`.
pub fn parse_datetime(raw: &str) -> ValidationResult<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::InvalidDateFormat(raw.to_string()));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(ValidationError::InvalidDateFormat(raw.to_string()))
}

/// `Option<String>` body field that must hold a date when present.
pub fn parse_optional_datetime(raw: Option<&str>) -> ValidationResult<Option<DateTime<Utc>>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => parse_datetime(value).map(Some),
        None => Ok(None),
    }
}

/// Deserializes a string or a JSON number into `Option<String>`.
/// Prediction probabilities arrive either way depending on the classifier.
pub mod string_or_number {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(serde::de::Error::custom(format!(
                "expected a string or number, found {}",
                other
            ))),
        }
    }
}
