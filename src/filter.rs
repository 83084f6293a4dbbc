//! Filter module: wraps compiled filter groups and provides the main execution API.
//!
//! This module provides the CompiledFilter type and one-shot helpers.

use crate::compiler::{DefaultCompiler, Predicate};
use crate::condition::{FilterCondition, FilterGroup};
use crate::record::SubmissionRecord;
use crate::schema::FormSchema;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// A set of filter groups compiled against a schema, ready for execution.
pub struct CompiledFilter {
    ir: Predicate,
    schema: Arc<FormSchema>,
    now: DateTime<Utc>,
    active: bool,
}

impl CompiledFilter {
    /// Compiles `groups` with relative-date conditions anchored at the current time.
    pub fn new(groups: &[FilterGroup], schema: Arc<FormSchema>) -> Self {
        Self::with_now(groups, schema, Utc::now())
    }

    /// Compiles `groups` with relative-date conditions anchored at `now`.
    pub fn with_now(groups: &[FilterGroup], schema: Arc<FormSchema>, now: DateTime<Utc>) -> Self {
        let ir = DefaultCompiler::compile(groups, &schema, now);
        Self {
            ir,
            schema,
            now,
            active: !groups.is_empty(),
        }
    }

    /// Execute the filter against a record.
    pub fn matches(&self, record: &SubmissionRecord) -> bool {
        (self.ir)(record)
    }

    /// Keeps the records that pass, preserving their order.
    pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a SubmissionRecord>) -> Vec<&'a SubmissionRecord> {
        records.into_iter().filter(|record| self.matches(record)).collect()
    }

    /// False when no groups were supplied and every record passes.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

impl fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFilter")
            .field("active", &self.active)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

/// Whether `record` passes `groups`. Compiles on every call; prefer
/// [`CompiledFilter`] when filtering many records.
pub fn passes_filters(record: &SubmissionRecord, groups: &[FilterGroup], schema: &FormSchema) -> bool {
    DefaultCompiler::compile(groups, schema, Utc::now())(record)
}

/// Evaluates a single condition against a record.
pub fn evaluate(record: &SubmissionRecord, condition: &FilterCondition, schema: &FormSchema) -> bool {
    DefaultCompiler::compile_condition(condition, schema, Utc::now())(record)
}
