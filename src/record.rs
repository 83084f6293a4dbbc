//! Record module: submissions as the engine sees them.
//!
//! This module provides SubmissionRecord and its decode step from the store's JSON shape.

use crate::extract::parse_instant;
use crate::schema::FormSchema;
use crate::types::{FieldType, Row, Value};
use crate::{FormtableError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::borrow::Cow;
use std::collections::HashMap;
use tracing::trace;

/// Submission metadata columns, addressable like form fields.
pub const METADATA_FIELDS: [&str; 5] = ["id", "submission_ref_id", "form_id", "submitted_at", "submitted_by"];

pub fn is_metadata_field(field: &str) -> bool {
    METADATA_FIELDS.contains(&field)
}

pub(crate) fn metadata_field_type(field: &str) -> Option<FieldType> {
    match field {
        "submitted_at" => Some(FieldType::DateTime),
        "submitted_by" => Some(FieldType::User),
        "id" | "submission_ref_id" | "form_id" => Some(FieldType::Text),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: String,
    #[serde(default)]
    pub submission_ref_id: Option<String>,
    #[serde(default)]
    pub form_id: String,
    #[serde(default)]
    pub submission_data: HashMap<String, Value>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submitted_by: Option<String>,
}

#[derive(Deserialize)]
struct StoredSubmission {
    id: Json,
    #[serde(default)]
    submission_ref_id: Option<String>,
    #[serde(default)]
    form_id: Option<String>,
    #[serde(default)]
    submission_data: Json,
    #[serde(default)]
    submitted_at: Option<String>,
    #[serde(default)]
    submitted_by: Option<String>,
}

impl SubmissionRecord {
    pub fn new(id: impl Into<String>, form_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            form_id: form_id.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.submission_data.insert(field.into(), value.into());
    }

    /// A form field value, without metadata resolution.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.submission_data.get(field)
    }

    /// Resolves a form field or a metadata column. Form fields shadow metadata.
    pub fn field_value(&self, field: &str) -> Option<Cow<'_, Value>> {
        if let Some(value) = self.submission_data.get(field) {
            return Some(Cow::Borrowed(value));
        }
        let meta = match field {
            "id" => Value::Text(self.id.clone()),
            "form_id" => Value::Text(self.form_id.clone()),
            "submission_ref_id" => self.submission_ref_id.clone().map(Value::Text)?,
            "submitted_by" => self.submitted_by.clone().map(Value::Text)?,
            "submitted_at" => self.submitted_at.map(Value::DateTime)?,
            _ => return None,
        };
        Some(Cow::Owned(meta))
    }

    /// Flattens the record into a row: metadata first, then `columns` in order.
    pub fn to_row<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> Row {
        let mut row = Row::new();
        for meta in METADATA_FIELDS {
            row.insert(meta.to_string(), self.field_value(meta).map(Cow::into_owned).unwrap_or_default());
        }
        for column in columns {
            let value = self.field_value(column).map(Cow::into_owned).unwrap_or_default();
            row.insert(column.to_string(), value);
        }
        row
    }

    /// Decodes one stored submission row. Cells are decoded with the schema's
    /// field types; cells that do not decode become `Null`.
    pub fn from_json(raw: &Json, schema: &FormSchema) -> Result<Self> {
        let stored: StoredSubmission = serde_json::from_value(raw.clone())?;
        let id = match stored.id {
            Json::String(s) => s,
            Json::Number(n) => n.to_string(),
            other => return Err(FormtableError::Decode(format!("submission id must be a string or number, got {}", other))),
        };
        let submission_data = match stored.submission_data {
            Json::Null => HashMap::new(),
            Json::Object(map) => map
                .iter()
                .map(|(field, cell)| (field.clone(), Value::from_json(cell, schema.field_type(field))))
                .collect(),
            other => {
                return Err(FormtableError::Decode(format!(
                    "submission '{}' has non-object submission_data: {}",
                    id, other
                )))
            }
        };
        let submitted_at = stored.submitted_at.as_deref().and_then(|s| {
            let parsed = parse_instant(s);
            if parsed.is_none() {
                trace!(submission = %id, raw = s, "unparseable submitted_at");
            }
            parsed
        });
        Ok(Self {
            id,
            submission_ref_id: stored.submission_ref_id,
            form_id: stored.form_id.unwrap_or_default(),
            submission_data,
            submitted_at,
            submitted_by: stored.submitted_by,
        })
    }

    /// Decodes a batch as returned by the data-fetch collaborator.
    pub fn from_json_list(raw: &Json, schema: &FormSchema) -> Result<Vec<Self>> {
        match raw {
            Json::Array(items) => items.iter().map(|item| Self::from_json(item, schema)).collect(),
            other => Err(FormtableError::Decode(format!("expected an array of submissions, got {}", other))),
        }
    }
}
