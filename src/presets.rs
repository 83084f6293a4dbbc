//! Saved filter presets
//!
//! Named filter-group sets stored per form. Presets are pass-through: the
//! groups are stored and returned verbatim and only compiled on use.

use crate::condition::FilterGroup;
use crate::filter::CompiledFilter;
use crate::schema::FormSchema;
use crate::{FormtableError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFilter {
    pub id: Uuid,
    pub form_id: String,
    pub name: String,
    pub filter_data: Vec<FilterGroup>,
    pub created_at: DateTime<Utc>,
}

impl SavedFilter {
    pub fn new(form_id: impl Into<String>, name: impl Into<String>, filter_data: Vec<FilterGroup>) -> Self {
        Self {
            id: Uuid::new_v4(),
            form_id: form_id.into(),
            name: name.into(),
            filter_data,
            created_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Compiles the stored groups against `schema`.
    pub fn compile(&self, schema: Arc<FormSchema>) -> CompiledFilter {
        CompiledFilter::new(&self.filter_data, schema)
    }
}

/// Persistence for saved filters.
pub trait FilterStore {
    fn save_filter(&self, form_id: &str, name: &str, groups: Vec<FilterGroup>) -> Result<SavedFilter>;

    /// Presets for a form, newest first.
    fn load_filters(&self, form_id: &str) -> Result<Vec<SavedFilter>>;

    fn get_filter(&self, id: &Uuid) -> Result<SavedFilter>;

    /// Returns whether a preset was removed.
    fn delete_filter(&self, id: &Uuid) -> Result<bool>;
}

/// In-process store for tests and embedders without a backend.
#[derive(Debug, Default)]
pub struct InMemoryFilterStore {
    filters: Mutex<Vec<SavedFilter>>,
}

impl InMemoryFilterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<SavedFilter>>> {
        self.filters
            .lock()
            .map_err(|_| FormtableError::Store("filter store lock poisoned".to_string()))
    }
}

impl FilterStore for InMemoryFilterStore {
    fn save_filter(&self, form_id: &str, name: &str, groups: Vec<FilterGroup>) -> Result<SavedFilter> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FormtableError::Validation("filter name must not be empty".to_string()));
        }
        let saved = SavedFilter::new(form_id, name, groups);
        self.lock()?.push(saved.clone());
        debug!(form_id, name, id = %saved.id, "saved filter preset");
        Ok(saved)
    }

    fn load_filters(&self, form_id: &str) -> Result<Vec<SavedFilter>> {
        let mut filters: Vec<SavedFilter> = self
            .lock()?
            .iter()
            .rev()
            .filter(|f| f.form_id == form_id)
            .cloned()
            .collect();
        filters.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(filters)
    }

    fn get_filter(&self, id: &Uuid) -> Result<SavedFilter> {
        self.lock()?
            .iter()
            .find(|f| f.id == *id)
            .cloned()
            .ok_or_else(|| FormtableError::NotFound(format!("saved filter {}", id)))
    }

    fn delete_filter(&self, id: &Uuid) -> Result<bool> {
        let mut filters = self.lock()?;
        let before = filters.len();
        filters.retain(|f| f.id != *id);
        Ok(filters.len() != before)
    }
}
