//! Extract module: normalizes decoded cell values into comparable forms.
//!
//! Every function here is total. Inputs that do not fit the requested form
//! come back as an empty string or `None`, never as an error.

use crate::types::{FieldType, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Timelike, Utc};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// The string form of a value used by text operators, search and sorting.
pub fn extract_comparable_value(raw: &Value, field_type: Option<FieldType>) -> String {
    match raw {
        Value::Null => String::new(),
        Value::Text(s) => s.clone(),
        Value::Number(n) => format_number(*n),
        Value::Bool(b) => b.to_string(),
        Value::DateTime(dt) => match field_type {
            Some(FieldType::Date) => dt.format("%Y-%m-%d").to_string(),
            Some(FieldType::Time) => dt.format("%H:%M").to_string(),
            _ => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        },
        Value::Money { amount, .. } => format_number(*amount),
        Value::Phone { code, number } => format!("{} {}", code, number).trim().to_string(),
        Value::List(items) => items
            .iter()
            .map(|item| extract_comparable_value(item, field_type))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// The numeric form of a value, if it has one.
pub fn extract_numeric_value(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => Some(*n).filter(|n| n.is_finite()),
        Value::Money { amount, .. } => Some(*amount).filter(|n| n.is_finite()),
        Value::Text(s) => parse_number(s),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::DateTime(_) | Value::Phone { .. } | Value::List(_) => None,
    }
}

pub fn extract_date_value(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::DateTime(dt) => Some(*dt),
        Value::Text(s) => parse_instant(s),
        _ => None,
    }
}

pub fn extract_time_value(raw: &Value) -> Option<NaiveTime> {
    match raw {
        Value::DateTime(dt) => Some(dt.time()),
        Value::Text(s) => parse_time(s),
        _ => None,
    }
}

/// Parses a finite float, ignoring surrounding whitespace.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parses RFC 3339, ISO local date-times (taken as UTC) and plain ISO dates.
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parses a time of day; full instants contribute their time component.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    for fmt in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(s, fmt) {
            return Some(time.with_nanosecond(0).unwrap_or(time));
        }
    }
    parse_instant(s).map(|dt| dt.time())
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() {
        n.to_string()
    } else {
        String::new()
    }
}
