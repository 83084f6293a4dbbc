//! Types module: field types and the tagged value union stored in submissions.
//!
//! Stored submission cells arrive as loosely shaped JSON. They are decoded once,
//! at the store boundary, into [`Value`] so the filter and sort pipeline never
//! handles untyped data.

use crate::extract::{parse_instant, parse_number};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::trace;

/// A flattened table row: column name to value, in display order.
pub type Row = IndexMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[non_exhaustive]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Email,
    Url,
    Number,
    Currency,
    Rating,
    Slider,
    Date,
    DateTime,
    Time,
    Select,
    Radio,
    Checkbox,
    MultiSelect,
    Phone,
    Country,
    Toggle,
    User,
    Other,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Email => "email",
            FieldType::Url => "url",
            FieldType::Number => "number",
            FieldType::Currency => "currency",
            FieldType::Rating => "rating",
            FieldType::Slider => "slider",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Time => "time",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::MultiSelect => "multiselect",
            FieldType::Phone => "phone",
            FieldType::Country => "country",
            FieldType::Toggle => "toggle",
            FieldType::User => "user",
            FieldType::Other => "other",
        }
    }

    /// Fields whose values are compared as quantities.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number | FieldType::Currency | FieldType::Rating | FieldType::Slider)
    }

    /// Fields whose values are calendar dates or instants.
    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::DateTime)
    }

    pub fn is_time(&self) -> bool {
        matches!(self, FieldType::Time)
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "text" | "string" => FieldType::Text,
            "textarea" | "long_text" => FieldType::Textarea,
            "email" => FieldType::Email,
            "url" => FieldType::Url,
            "number" | "integer" | "decimal" => FieldType::Number,
            "currency" => FieldType::Currency,
            "rating" => FieldType::Rating,
            "slider" => FieldType::Slider,
            "date" => FieldType::Date,
            "datetime" | "date_time" | "datetime-local" | "timestamp" => FieldType::DateTime,
            "time" => FieldType::Time,
            "select" | "dropdown" => FieldType::Select,
            "radio" => FieldType::Radio,
            "checkbox" => FieldType::Checkbox,
            "multiselect" | "multi_select" => FieldType::MultiSelect,
            "phone" => FieldType::Phone,
            "country" => FieldType::Country,
            "toggle" | "boolean" => FieldType::Toggle,
            "user" | "user_picker" => FieldType::User,
            _ => FieldType::Other,
        }
    }
}

impl From<FieldType> for String {
    fn from(ty: FieldType) -> Self {
        ty.as_str().to_string()
    }
}

/// A decoded submission cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
    Money { currency: String, amount: f64 },
    Phone { code: String, number: String },
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Decodes one stored cell. Never fails: shapes that match no known
    /// wrapper degrade to `Null`.
    pub fn from_json(raw: &Json, field_type: FieldType) -> Value {
        match raw {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            Json::String(s) => decode_text(s, field_type),
            Json::Array(items) => Value::List(items.iter().map(|item| Value::from_json(item, field_type)).collect()),
            Json::Object(map) => decode_object(map, field_type),
        }
    }
}

fn decode_text(s: &str, field_type: FieldType) -> Value {
    if field_type.is_temporal() {
        if let Some(instant) = parse_instant(s) {
            return Value::DateTime(instant);
        }
    }
    Value::Text(s.to_string())
}

fn decode_object(map: &Map<String, Json>, field_type: FieldType) -> Value {
    if let Some(inner) = map.get("value") {
        // Older editors persisted unset wrapped fields as the string "undefined".
        if inner.as_str() == Some("undefined") {
            return Value::Null;
        }
        return Value::from_json(inner, field_type);
    }
    if let Some(amount) = map.get("amount") {
        let amount = match amount {
            Json::Number(n) => n.as_f64(),
            Json::String(s) => parse_number(s),
            _ => None,
        };
        return match amount {
            Some(amount) => Value::Money {
                currency: map.get("currency").and_then(Json::as_str).unwrap_or_default().to_string(),
                amount,
            },
            None => {
                trace!("currency wrapper without a numeric amount");
                Value::Null
            }
        };
    }
    if let (Some(code), Some(number)) = (map.get("code"), map.get("number")) {
        return Value::Phone {
            code: json_scalar_text(code),
            number: json_scalar_text(number),
        };
    }
    if let Some(rating) = map.get("rating") {
        return Value::from_json(rating, field_type);
    }
    trace!(keys = ?map.keys().collect::<Vec<_>>(), "unrecognised value wrapper");
    Value::Null
}

fn json_scalar_text(raw: &Json) -> String {
    match raw {
        Json::String(s) => s.clone(),
        Json::Number(n) => n.to_string(),
        Json::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}
