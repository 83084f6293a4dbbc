//! Multi-column sorting for submission tables.
//!
//! Sort keys are applied left to right and the first non-equal key decides.
//! All sorting goes through `slice::sort_by`, which is stable, so ties keep
//! their incoming order.

use crate::extract::{extract_comparable_value, extract_date_value, extract_numeric_value};
use crate::record::SubmissionRecord;
use crate::schema::FormSchema;
use crate::types::{FieldType, Row, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggle(&self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// A single sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default)]
    pub label: String,
}

impl SortConfig {
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }

    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        let field = field.into();
        Self {
            label: field.clone(),
            field,
            direction,
        }
    }
}

/// Compares two records by every sort key in order.
pub fn compare(a: &SubmissionRecord, b: &SubmissionRecord, configs: &[SortConfig], schema: &FormSchema) -> Ordering {
    for config in configs {
        let field_type = schema.field_type(&config.field);
        let lhs = a.field_value(&config.field);
        let rhs = b.field_value(&config.field);
        let ordering = compare_values(lhs.as_deref(), rhs.as_deref(), Some(field_type));
        if ordering != Ordering::Equal {
            return config.direction.apply(ordering);
        }
    }
    Ordering::Equal
}

/// Sorts records in place; a no-op when `configs` is empty.
pub fn sort_records<R>(records: &mut [R], configs: &[SortConfig], schema: &FormSchema)
where
    R: Borrow<SubmissionRecord>,
{
    if configs.is_empty() {
        return;
    }
    records.sort_by(|a, b| compare(a.borrow(), b.borrow(), configs, schema));
}

/// Sorts flattened rows, such as aggregated results, by column name.
pub fn sort_rows(rows: &mut [Row], configs: &[SortConfig]) {
    if configs.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for config in configs {
            let ordering = compare_values(a.get(&config.field), b.get(&config.field), None);
            if ordering != Ordering::Equal {
                return config.direction.apply(ordering);
            }
        }
        Ordering::Equal
    });
}

/// Type-aware value ordering. The strategy is chosen by the column's field
/// type, never by the pair being compared: numeric columns compare as
/// numbers, date columns chronologically, everything else by case-insensitive
/// natural collation. Without a field type, values are ranked by kind first.
///
/// Values that do not fit the column's strategy rank after those that do,
/// and missing or blank values rank first.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>, field_type: Option<FieldType>) -> Ordering {
    SortKey::new(a, field_type).cmp(&SortKey::new(b, field_type))
}

// Declaration order is rank order.
enum SortKey {
    Blank,
    Number(f64),
    Instant(DateTime<Utc>),
    Bool(bool),
    Text(String),
}

impl SortKey {
    fn new(value: Option<&Value>, field_type: Option<FieldType>) -> Self {
        let value = match value {
            None | Some(Value::Null) => return SortKey::Blank,
            Some(value) => value,
        };
        let keyed = match field_type {
            Some(ft) if ft.is_numeric() => extract_numeric_value(value).map(SortKey::Number),
            Some(ft) if ft.is_temporal() => extract_date_value(value).map(SortKey::Instant),
            Some(_) => None,
            None => match value {
                Value::Number(_) | Value::Money { .. } => extract_numeric_value(value).map(SortKey::Number),
                Value::DateTime(dt) => Some(SortKey::Instant(*dt)),
                Value::Bool(b) => Some(SortKey::Bool(*b)),
                _ => None,
            },
        };
        keyed.unwrap_or_else(|| {
            let text = extract_comparable_value(value, field_type);
            if text.trim().is_empty() {
                SortKey::Blank
            } else {
                SortKey::Text(text)
            }
        })
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Blank => 0,
            SortKey::Number(_) => 1,
            SortKey::Instant(_) => 2,
            SortKey::Bool(_) => 3,
            SortKey::Text(_) => 4,
        }
    }

    fn cmp(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(y),
            (SortKey::Instant(x), SortKey::Instant(y)) => x.cmp(y),
            (SortKey::Bool(x), SortKey::Bool(y)) => x.cmp(y),
            (SortKey::Text(x), SortKey::Text(y)) => natural_cmp(x, y),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Case-insensitive comparison where digit runs compare by numeric value,
/// so `"item2" < "item10"`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let mut lhs = a.chars().peekable();
    let mut rhs = b.chars().peekable();
    loop {
        match (lhs.peek().copied(), rhs.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let ordering = cmp_digit_runs(&take_digits(&mut lhs), &take_digits(&mut rhs));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                lhs.next();
                rhs.next();
                if x != y {
                    return x.cmp(&y);
                }
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(|c| c.is_ascii_digit()) {
        run.push(c);
    }
    run
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
        .then_with(|| a.len().cmp(&b.len()))
}
