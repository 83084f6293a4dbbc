//! Aggregate module: grouping rows and folding a numeric column per group.
//!
//! This module provides the AggregateFunction trait, the built-in folds and
//! the grouping engine used when a table is switched to summary mode.

use crate::extract::{extract_comparable_value, extract_numeric_value};
use crate::types::{Row, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bucket key for rows whose group value is missing or null.
pub const NULL_BUCKET: &str = "null";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationType {
    #[default]
    None,
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationSpec {
    pub group_by_column: String,
    #[serde(default)]
    pub aggregate_column: Option<String>,
    #[serde(default)]
    pub aggregation_type: AggregationType,
}

impl AggregationSpec {
    pub fn new(group_by: impl Into<String>, aggregation_type: AggregationType, column: Option<&str>) -> Self {
        Self {
            group_by_column: group_by.into(),
            aggregate_column: column.map(str::to_string),
            aggregation_type,
        }
    }

    pub fn is_active(&self) -> bool {
        self.aggregation_type != AggregationType::None && !self.group_by_column.is_empty()
    }

    /// The fold actually applied: numeric folds without a column count instead.
    pub fn effective_type(&self) -> AggregationType {
        match (self.aggregation_type, self.aggregate_column.as_deref()) {
            (AggregationType::Sum | AggregationType::Avg | AggregationType::Min | AggregationType::Max, None | Some("")) => {
                AggregationType::Count
            }
            (ty, _) => ty,
        }
    }

    /// Name of the aggregated output column: `count`, or `{type}_{column}`.
    pub fn output_column(&self) -> String {
        match (self.effective_type(), self.aggregate_column.as_deref()) {
            (AggregationType::Count, _) | (_, None) => "count".to_string(),
            (ty, Some(column)) => format!("{}_{}", ty.as_str(), column),
        }
    }

    /// Output columns of a grouped result: the group column, then the aggregate.
    pub fn output_columns(&self) -> Vec<String> {
        vec![self.group_by_column.clone(), self.output_column()]
    }
}

pub trait AggregateFunction: Send + Sync {
    fn name(&self) -> &'static str;
    /// Folds the numeric values of one group. Empty input yields 0.
    fn fold(&self, values: &[f64]) -> f64;
}

macro_rules! aggregate_functions {
    ($( $name:ident: $func_name:expr, $values:ident => $body:block ),* $(,)?) => {
        $(
            pub struct $name;
            impl AggregateFunction for $name {
                fn name(&self) -> &'static str {
                    $func_name
                }
                fn fold(&self, $values: &[f64]) -> f64 $body
            }
        )*
        /// Looks up a built-in numeric fold by name.
        pub fn builtin_function(name: &str) -> Option<&'static dyn AggregateFunction> {
            match name {
                $($func_name => Some(&$name),)*
                _ => None,
            }
        }
    };
}

aggregate_functions! {
    SumFunction: "sum", values => {
        values.iter().sum()
    },
    AvgFunction: "avg", values => {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    },
    MinFunction: "min", values => {
        values.iter().copied().reduce(f64::min).unwrap_or(0.0)
    },
    MaxFunction: "max", values => {
        values.iter().copied().reduce(f64::max).unwrap_or(0.0)
    },
}

fn bucket_key(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NULL_BUCKET.to_string(),
        Some(value) => extract_comparable_value(value, None),
    }
}

/// Groups `rows` by `spec.group_by_column` and folds each group. Groups keep
/// the order in which their first row appears.
pub fn aggregate(rows: &[Row], spec: &AggregationSpec) -> Vec<Row> {
    if !spec.is_active() {
        return rows.to_vec();
    }
    let mut buckets: IndexMap<String, Vec<&Row>> = IndexMap::new();
    for row in rows {
        buckets.entry(bucket_key(row.get(&spec.group_by_column))).or_default().push(row);
    }
    let ty = spec.effective_type();
    let output_column = spec.output_column();
    let function = builtin_function(ty.as_str());
    debug!(
        group_by = %spec.group_by_column,
        aggregation = ty.as_str(),
        rows = rows.len(),
        groups = buckets.len(),
        "aggregating rows"
    );
    buckets
        .into_iter()
        .map(|(key, items)| {
            let group_value = if key == NULL_BUCKET {
                Value::Null
            } else {
                items
                    .first()
                    .and_then(|row| row.get(&spec.group_by_column))
                    .cloned()
                    .unwrap_or(Value::Text(key))
            };
            let aggregated = match (function, spec.aggregate_column.as_deref()) {
                (Some(function), Some(column)) => {
                    let values: Vec<f64> = items
                        .iter()
                        .filter_map(|row| row.get(column).and_then(extract_numeric_value))
                        .collect();
                    function.fold(&values)
                }
                _ => items.len() as f64,
            };
            let mut out = Row::new();
            out.insert(spec.group_by_column.clone(), group_value);
            out.insert(output_column.clone(), Value::Number(aggregated));
            out
        })
        .collect()
}

/// Display columns of a result set: the keys of its first row.
pub fn derive_display_columns(rows: &[Row]) -> Option<Vec<String>> {
    rows.first().map(|row| row.keys().cloned().collect())
}
