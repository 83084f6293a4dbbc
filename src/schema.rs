//! Schema module: the field descriptors of one form.
//!
//! This module provides FieldDescriptor, the FormSchema registry and its builder.

use crate::record::metadata_field_type;
use crate::types::FieldType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_config: Option<serde_json::Value>,
}

impl FieldDescriptor {
    pub fn new(id: impl Into<String>, label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            field_type,
            options: None,
            custom_config: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<FieldDescriptor>", into = "Vec<FieldDescriptor>")]
#[non_exhaustive]
pub struct FormSchema {
    fields: Vec<FieldDescriptor>,  // form order
    field_ids: HashMap<String, usize>, // id -> position
}

impl FormSchema {
    pub fn get_field(&self, id: &str) -> Option<&FieldDescriptor> {
        self.field_ids.get(id).map(|&pos| &self.fields[pos])
    }

    /// Resolves the type used to interpret a field, including submission
    /// metadata. Unknown ids are treated as text.
    pub fn field_type(&self, id: &str) -> FieldType {
        self.get_field(id)
            .map(|field| field.field_type)
            .or_else(|| metadata_field_type(id))
            .unwrap_or_default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.field_ids.contains_key(id)
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Field ids in form order.
    pub fn field_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|field| field.id.as_str())
    }

    /// The `fieldId -> type` map used to pick comparison strategies.
    pub fn type_map(&self) -> HashMap<String, FieldType> {
        self.fields.iter().map(|field| (field.id.clone(), field.field_type)).collect()
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }
}

impl From<Vec<FieldDescriptor>> for FormSchema {
    fn from(fields: Vec<FieldDescriptor>) -> Self {
        fields.into_iter().fold(FormSchemaBuilder::new(), FormSchemaBuilder::descriptor).build()
    }
}

impl From<FormSchema> for Vec<FieldDescriptor> {
    fn from(schema: FormSchema) -> Self {
        schema.fields
    }
}

#[derive(Debug, Default)]
pub struct FormSchemaBuilder {
    fields: Vec<FieldDescriptor>,
}

impl FormSchemaBuilder {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn field(self, id: impl Into<String>, label: impl Into<String>, ty: FieldType) -> Self {
        self.descriptor(FieldDescriptor::new(id, label, ty))
    }

    /// Adds a descriptor. A repeated id replaces the earlier descriptor in place.
    pub fn descriptor(mut self, descriptor: FieldDescriptor) -> Self {
        match self.fields.iter_mut().find(|field| field.id == descriptor.id) {
            Some(existing) => *existing = descriptor,
            None => self.fields.push(descriptor),
        }
        self
    }

    pub fn build(self) -> FormSchema {
        let field_ids = self
            .fields
            .iter()
            .enumerate()
            .map(|(pos, field)| (field.id.clone(), pos))
            .collect();
        FormSchema {
            fields: self.fields,
            field_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> FormSchema {
        FormSchemaBuilder::new()
            .field("name", "Name", FieldType::Text)
            .field("amount", "Amount", FieldType::Currency)
            .field("due", "Due date", FieldType::Date)
            .build()
    }

    #[test]
    fn test_field_registration_and_retrieval() {
        let schema = schema();
        assert_eq!(schema.field_type("amount"), FieldType::Currency);
        assert_eq!(schema.get_field("due").map(|f| f.label.as_str()), Some("Due date"));
        assert!(schema.get_field("missing").is_none());
        assert_eq!(schema.num_fields(), 3);
    }

    #[test]
    fn test_field_order_is_preserved() {
        let schema = schema();
        let ids: Vec<_> = schema.field_ids().collect();
        assert_eq!(ids, vec!["name", "amount", "due"]);
    }

    #[test]
    fn test_metadata_and_unknown_field_types() {
        let schema = schema();
        assert_eq!(schema.field_type("submitted_at"), FieldType::DateTime);
        assert_eq!(schema.field_type("submitted_by"), FieldType::User);
        assert_eq!(schema.field_type("nope"), FieldType::Text);
    }

    #[test]
    fn test_schema_builder_overwrite_field() {
        let schema = FormSchemaBuilder::new()
            .field("foo", "Foo", FieldType::Number)
            .field("bar", "Bar", FieldType::Text)
            .field("foo", "Foo again", FieldType::Text)
            .build();
        // Last one wins, first position kept
        assert_eq!(schema.field_type("foo"), FieldType::Text);
        assert_eq!(schema.field_ids().next(), Some("foo"));
        assert_eq!(schema.num_fields(), 2);
    }

    #[test]
    fn test_schema_deserializes_from_descriptor_list() {
        let raw = json!([
            { "id": "status", "label": "Status", "type": "select", "options": ["approved", "rejected"] },
            { "id": "score", "label": "Score", "type": "slider", "customConfig": { "max": 10 } },
        ]);
        let schema: FormSchema = serde_json::from_value(raw).unwrap();
        assert_eq!(schema.field_type("status"), FieldType::Select);
        assert_eq!(schema.field_type("score"), FieldType::Slider);
        assert_eq!(schema.type_map().len(), 2);
        let json = serde_json::to_string(&schema).unwrap();
        let back: FormSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back, schema);
    }
}
