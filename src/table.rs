//! Table module: the pipeline behind a submissions table.
//!
//! [`TableEngine::run`] applies search, per-column filters, filter groups,
//! sorting, optional aggregation and pagination, in that order, and returns
//! the visible page. Every run is a pure function of its inputs.

use crate::aggregate::{aggregate, derive_display_columns, AggregationSpec};
use crate::condition::FilterGroup;
use crate::config::EngineConfig;
use crate::extract::extract_comparable_value;
use crate::filter::CompiledFilter;
use crate::record::{is_metadata_field, SubmissionRecord};
use crate::schema::FormSchema;
use crate::sort::{sort_records, SortConfig};
use crate::types::Row;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Everything the table UI controls.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableQuery {
    pub search_term: String,
    /// Header filter inputs: field id to substring.
    pub column_filters: IndexMap<String, String>,
    pub filters: Vec<FilterGroup>,
    pub sort: Vec<SortConfig>,
    pub aggregation: Option<AggregationSpec>,
    /// Visible field ids; every schema field when absent.
    pub columns: Option<Vec<String>>,
    /// Zero-based page index.
    pub page: usize,
    pub page_size: usize,
}

impl TableQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search_term = term.into();
        self
    }

    pub fn column_filter(mut self, field: impl Into<String>, needle: impl Into<String>) -> Self {
        self.column_filters.insert(field.into(), needle.into());
        self
    }

    pub fn filter(mut self, group: FilterGroup) -> Self {
        self.filters.push(group);
        self
    }

    pub fn sort_by(mut self, config: SortConfig) -> Self {
        self.sort.push(config);
        self
    }

    pub fn aggregate(mut self, spec: AggregationSpec) -> Self {
        self.aggregation = Some(spec);
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }
}

/// One page of derived table state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    pub rows: Vec<Row>,
    /// Rows (or groups) that survived filtering, before pagination.
    pub total_count: usize,
    pub display_columns: Vec<String>,
    pub page: usize,
    pub page_size: usize,
}

impl TableView {
    pub fn page_count(&self) -> usize {
        if self.page_size == 0 {
            0
        } else {
            self.total_count.div_ceil(self.page_size)
        }
    }
}

/// Resolves user ids to display names for search.
pub trait NameLookup: Send + Sync {
    fn display_name(&self, user_id: &str) -> Option<String>;
}

impl NameLookup for HashMap<String, String> {
    fn display_name(&self, user_id: &str) -> Option<String> {
        self.get(user_id).cloned()
    }
}

pub struct TableEngine {
    schema: Arc<FormSchema>,
    config: EngineConfig,
    lookup: Option<Arc<dyn NameLookup>>,
}

impl TableEngine {
    pub fn new(schema: Arc<FormSchema>, config: EngineConfig) -> Self {
        Self { schema, config, lookup: None }
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn NameLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run(&self, records: &[SubmissionRecord], query: &TableQuery) -> TableView {
        self.run_at(records, query, Utc::now())
    }

    /// Runs the pipeline with relative-date filters anchored at `now`.
    pub fn run_at(&self, records: &[SubmissionRecord], query: &TableQuery, now: DateTime<Utc>) -> TableView {
        let columns = self.visible_columns(query);
        let term = query.search_term.trim().to_lowercase();
        let column_filters: Vec<(&str, String)> = query
            .column_filters
            .iter()
            .map(|(field, needle)| (field.as_str(), needle.trim().to_lowercase()))
            .filter(|(_, needle)| !needle.is_empty())
            .collect();

        let searched: Vec<&SubmissionRecord> = records
            .iter()
            .filter(|record| term.is_empty() || self.matches_search(record, &columns, &term))
            .collect();
        let searched_count = searched.len();

        let narrowed: Vec<&SubmissionRecord> = searched
            .into_iter()
            .filter(|record| {
                column_filters
                    .iter()
                    .all(|(field, needle)| self.rendered(record, field).to_lowercase().contains(needle.as_str()))
            })
            .collect();
        let narrowed_count = narrowed.len();

        let filter = CompiledFilter::with_now(&query.filters, Arc::clone(&self.schema), now);
        let mut kept = filter.apply(narrowed);
        sort_records(&mut kept, &query.sort, &self.schema);

        debug!(
            input = records.len(),
            searched = searched_count,
            column_filtered = narrowed_count,
            filtered = kept.len(),
            sort_keys = query.sort.len(),
            "table pipeline"
        );

        let page_size = self.config.effective_page_size(query.page_size);
        match query.aggregation.as_ref().filter(|spec| spec.is_active()) {
            Some(spec) => {
                let flattened: Vec<Row> = kept.iter().map(|record| record.to_row(self.schema.field_ids())).collect();
                let grouped = aggregate(&flattened, spec);
                let display_columns = derive_display_columns(&grouped).unwrap_or_else(|| spec.output_columns());
                let total_count = grouped.len();
                let rows = page_window(grouped, query.page, page_size);
                TableView { rows, total_count, display_columns, page: query.page, page_size }
            }
            None => {
                let total_count = kept.len();
                let rows = page_window(kept, query.page, page_size)
                    .into_iter()
                    .map(|record| record.to_row(columns.iter().map(String::as_str)))
                    .collect();
                TableView { rows, total_count, display_columns: columns, page: query.page, page_size }
            }
        }
    }

    fn visible_columns(&self, query: &TableQuery) -> Vec<String> {
        match &query.columns {
            Some(columns) => columns
                .iter()
                .filter(|c| self.schema.contains(c) || is_metadata_field(c))
                .cloned()
                .collect(),
            None => self.schema.field_ids().map(str::to_string).collect(),
        }
    }

    fn rendered(&self, record: &SubmissionRecord, field: &str) -> String {
        record
            .field_value(field)
            .map(|value| extract_comparable_value(&value, Some(self.schema.field_type(field))))
            .unwrap_or_default()
    }

    fn matches_search(&self, record: &SubmissionRecord, columns: &[String], term: &str) -> bool {
        let hit = |text: &str| text.to_lowercase().contains(term);
        if columns.iter().any(|column| hit(&self.rendered(record, column))) {
            return true;
        }
        if let Some(user) = record.submitted_by.as_deref() {
            if hit(user) {
                return true;
            }
            let name = self.lookup.as_ref().and_then(|lookup| lookup.display_name(user));
            if name.is_some_and(|name| hit(&name)) {
                return true;
            }
        }
        self.config.search_metadata && record.submission_ref_id.as_deref().is_some_and(hit)
    }
}

impl fmt::Debug for TableEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableEngine")
            .field("fields", &self.schema.num_fields())
            .field("config", &self.config)
            .field("lookup", &self.lookup.is_some())
            .finish()
    }
}

fn page_window<T>(items: Vec<T>, page: usize, page_size: usize) -> Vec<T> {
    let start = page.saturating_mul(page_size);
    items.into_iter().skip(start).take(page_size).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregationType;
    use crate::condition::{FilterCondition, FilterOperator, LogicalOp};
    use crate::schema::FormSchemaBuilder;
    use crate::types::{FieldType, Value};
    use chrono::TimeZone;

    fn schema() -> Arc<FormSchema> {
        Arc::new(
            FormSchemaBuilder::new()
                .field("name", "Name", FieldType::Text)
                .field("status", "Status", FieldType::Select)
                .field("amount", "Amount", FieldType::Currency)
                .build(),
        )
    }

    fn records() -> Vec<SubmissionRecord> {
        let mut approved = SubmissionRecord::new("1", "f")
            .with_value("name", "Alice")
            .with_value("status", "approved")
            .with_value("amount", Value::Money { currency: "USD".into(), amount: 10.0 });
        approved.submitted_by = Some("u-1".into());
        approved.submission_ref_id = Some("REF-001".into());
        let rejected = SubmissionRecord::new("2", "f")
            .with_value("name", "Bob")
            .with_value("status", "rejected")
            .with_value("amount", 20.0);
        let pending = SubmissionRecord::new("3", "f")
            .with_value("name", "Carol")
            .with_value("status", "pending")
            .with_value("amount", 5.0);
        vec![approved, rejected, pending]
    }

    fn engine() -> TableEngine {
        TableEngine::new(schema(), EngineConfig::default())
    }

    fn ids(view: &TableView) -> Vec<Value> {
        view.rows.iter().map(|row| row["id"].clone()).collect()
    }

    #[test]
    fn test_end_to_end_status_filter() {
        let group = FilterGroup::new("g", LogicalOp::And)
            .with_condition(FilterCondition::new("status", FilterOperator::Equals, "approved"));
        let view = engine().run(&records(), &TableQuery::new().filter(group));
        assert_eq!(view.total_count, 1);
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0]["status"], Value::from("approved"));
    }

    #[test]
    fn test_no_query_is_identity() {
        let view = engine().run(&records(), &TableQuery::new());
        assert_eq!(view.total_count, 3);
        assert_eq!(view.display_columns, vec!["name", "status", "amount"]);
        assert_eq!(ids(&view), vec![Value::from("1"), Value::from("2"), Value::from("3")]);
    }

    #[test]
    fn test_search_is_case_insensitive_and_unwraps_values() {
        let view = engine().run(&records(), &TableQuery::new().search("ALI"));
        assert_eq!(ids(&view), vec![Value::from("1")]);
        let view = engine().run(&records(), &TableQuery::new().search("20"));
        assert_eq!(ids(&view), vec![Value::from("2")]);
    }

    #[test]
    fn test_search_covers_submitter_and_lookup() {
        let view = engine().run(&records(), &TableQuery::new().search("u-1"));
        assert_eq!(view.total_count, 1);
        let names: HashMap<String, String> = [("u-1".to_string(), "Dana Scully".to_string())].into_iter().collect();
        let engine = engine().with_lookup(Arc::new(names));
        let view = engine.run(&records(), &TableQuery::new().search("scully"));
        assert_eq!(ids(&view), vec![Value::from("1")]);
    }

    #[test]
    fn test_search_metadata_toggle() {
        let view = engine().run(&records(), &TableQuery::new().search("ref-001"));
        assert_eq!(view.total_count, 1);
        let config = EngineConfig { search_metadata: false, ..EngineConfig::default() };
        let view = TableEngine::new(schema(), config).run(&records(), &TableQuery::new().search("ref-001"));
        assert_eq!(view.total_count, 0);
    }

    #[test]
    fn test_search_only_visible_columns() {
        let query = TableQuery::new().columns(["status"]).search("alice");
        assert_eq!(engine().run(&records(), &query).total_count, 0);
    }

    #[test]
    fn test_column_filters_and_across_columns() {
        let query = TableQuery::new().column_filter("status", "e").column_filter("name", "b");
        let view = engine().run(&records(), &query);
        assert_eq!(ids(&view), vec![Value::from("2")]);
        let query = TableQuery::new().column_filter("status", "  ");
        assert_eq!(engine().run(&records(), &query).total_count, 3);
    }

    #[test]
    fn test_sort_then_paginate() {
        let query = TableQuery::new().sort_by(SortConfig::desc("amount")).page(0, 2);
        let view = engine().run(&records(), &query);
        assert_eq!(view.total_count, 3);
        assert_eq!(ids(&view), vec![Value::from("2"), Value::from("1")]);
        assert_eq!(view.page_count(), 2);
        let view = engine().run(&records(), &query.clone().page(1, 2));
        assert_eq!(ids(&view), vec![Value::from("3")]);
    }

    #[test]
    fn test_page_past_end_is_empty() {
        let view = engine().run(&records(), &TableQuery::new().page(9, 2));
        assert!(view.rows.is_empty());
        assert_eq!(view.total_count, 3);
    }

    #[test]
    fn test_page_size_zero_uses_default_and_clamps() {
        let view = engine().run(&records(), &TableQuery::new().page(0, 0));
        assert_eq!(view.page_size, 10);
        let config = EngineConfig { default_page_size: 1, max_page_size: 2, search_metadata: true };
        let view = TableEngine::new(schema(), config).run(&records(), &TableQuery::new().page(0, 100));
        assert_eq!(view.page_size, 2);
        assert_eq!(view.rows.len(), 2);
    }

    #[test]
    fn test_explicit_columns_project_rows() {
        let query = TableQuery::new().columns(["status", "missing", "submitted_at"]);
        let view = engine().run(&records(), &query);
        assert_eq!(view.display_columns, vec!["status", "submitted_at"]);
        assert!(view.rows[0].contains_key("status"));
        assert!(!view.rows[0].contains_key("name"));
    }

    #[test]
    fn test_aggregation_rederives_display_columns() {
        let mut data = records();
        data.push(SubmissionRecord::new("4", "f").with_value("status", "approved").with_value("amount", 7.0));
        let query = TableQuery::new().aggregate(AggregationSpec::new("status", AggregationType::Sum, Some("amount")));
        let view = engine().run(&data, &query);
        assert_eq!(view.display_columns, vec!["status", "sum_amount"]);
        assert_eq!(view.total_count, 3);
        let approved = view.rows.iter().find(|r| r["status"] == Value::from("approved")).unwrap();
        assert_eq!(approved["sum_amount"], Value::Number(17.0));
    }

    #[test]
    fn test_aggregation_of_empty_result() {
        let query = TableQuery::new()
            .search("nobody")
            .aggregate(AggregationSpec::new("status", AggregationType::Count, None));
        let view = engine().run(&records(), &query);
        assert!(view.rows.is_empty());
        assert_eq!(view.display_columns, vec!["status", "count"]);
    }

    #[test]
    fn test_run_is_idempotent() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let query = TableQuery::new().search("o").sort_by(SortConfig::asc("name"));
        let first = engine().run_at(&records(), &query, now);
        let second = engine().run_at(&records(), &query, now);
        assert_eq!(first, second);
    }

    #[test]
    fn test_query_deserializes_from_ui_json() {
        let query: TableQuery = serde_json::from_value(serde_json::json!({
            "searchTerm": "bob",
            "sort": [{ "field": "amount", "direction": "desc" }],
            "page": 0,
            "pageSize": 5
        }))
        .unwrap();
        assert_eq!(query.page_size, 5);
        assert!(query.aggregation.is_none());
        assert_eq!(engine().run(&records(), &query).total_count, 1);
    }
}
