//! Compiler module: turns filter conditions and groups into predicates.
//!
//! Each condition is decoded against the schema once and captured in a
//! closure, so evaluating a row never re-parses operator arguments.

use crate::condition::{Bound, FilterCondition, FilterGroup, FilterOperator, LogicalOp, Operand};
use crate::extract::{extract_comparable_value, extract_date_value, extract_numeric_value, extract_time_value};
use crate::record::SubmissionRecord;
use crate::schema::FormSchema;
use crate::types::{FieldType, Value};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::trace;

pub type Predicate = Box<dyn Fn(&SubmissionRecord) -> bool + Send + Sync + 'static>;

pub struct DefaultCompiler;

impl DefaultCompiler {
    pub fn compile_condition(condition: &FilterCondition, schema: &FormSchema, now: DateTime<Utc>) -> Predicate {
        if condition.field.is_empty() {
            // Half-configured conditions never hide rows.
            return Box::new(|_: &SubmissionRecord| true);
        }
        let field = condition.field.clone();
        let field_type = schema.field_type(&field);
        let op = condition.operator;
        let operand = Operand::decode(op, &condition.value, field_type);
        if operand.is_invalid() {
            trace!(field = %field, operator = %op, value = %condition.value, "condition argument does not decode; condition disabled");
            return Box::new(|_: &SubmissionRecord| false);
        }
        Box::new(move |record: &SubmissionRecord| {
            let value = record.field_value(&field);
            eval_condition(value.as_deref(), op, &operand, field_type, now)
        })
    }

    pub fn compile_group(group: &FilterGroup, schema: &FormSchema, now: DateTime<Utc>) -> Predicate {
        let conditions: Vec<Predicate> = group
            .conditions
            .iter()
            .map(|condition| DefaultCompiler::compile_condition(condition, schema, now))
            .collect();
        if conditions.is_empty() {
            return Box::new(|_: &SubmissionRecord| true);
        }
        match group.logic {
            LogicalOp::And => Box::new(move |record: &SubmissionRecord| conditions.iter().all(|c| c(record))),
            LogicalOp::Or => Box::new(move |record: &SubmissionRecord| conditions.iter().any(|c| c(record))),
        }
    }

    /// Groups are alternatives: a record passes when any group admits it.
    pub fn compile(groups: &[FilterGroup], schema: &FormSchema, now: DateTime<Utc>) -> Predicate {
        let groups: Vec<Predicate> = groups
            .iter()
            .map(|group| DefaultCompiler::compile_group(group, schema, now))
            .collect();
        if groups.is_empty() {
            return Box::new(|_: &SubmissionRecord| true);
        }
        Box::new(move |record: &SubmissionRecord| groups.iter().any(|g| g(record)))
    }
}

/// Evaluates one decoded condition against a cell value.
pub fn eval_condition(
    value: Option<&Value>,
    op: FilterOperator,
    operand: &Operand,
    field_type: FieldType,
    now: DateTime<Utc>,
) -> bool {
    let value = match value {
        Some(v) if !v.is_null() => v,
        _ => return op == FilterOperator::IsEmpty,
    };
    match op {
        FilterOperator::IsEmpty => is_blank(value, field_type),
        FilterOperator::IsNotEmpty => !is_blank(value, field_type),
        FilterOperator::Equals => cmp_equals(value, operand, field_type),
        FilterOperator::NotEquals => !cmp_equals(value, operand, field_type),
        FilterOperator::Contains => cmp_text(value, operand, field_type, |h, n| h.contains(n)),
        FilterOperator::NotContains => !cmp_text(value, operand, field_type, |h, n| h.contains(n)),
        FilterOperator::StartsWith => cmp_text(value, operand, field_type, |h, n| h.starts_with(n)),
        FilterOperator::EndsWith => cmp_text(value, operand, field_type, |h, n| h.ends_with(n)),
        FilterOperator::GreaterThan => cmp_ord(value, operand, |o| o == Ordering::Greater),
        FilterOperator::LessThan => cmp_ord(value, operand, |o| o == Ordering::Less),
        FilterOperator::GreaterEqual => cmp_ord(value, operand, |o| o != Ordering::Less),
        FilterOperator::LessEqual => cmp_ord(value, operand, |o| o != Ordering::Greater),
        FilterOperator::Between => cmp_between(value, operand),
        FilterOperator::In => cmp_in(value, operand, field_type),
        FilterOperator::NotIn => !cmp_in(value, operand, field_type),
        FilterOperator::LastDays => cmp_window(value, operand, field_type, now, true),
        FilterOperator::NextDays => cmp_window(value, operand, field_type, now, false),
    }
}

fn is_blank(value: &Value, field_type: FieldType) -> bool {
    extract_comparable_value(value, Some(field_type)).trim().is_empty()
}

fn folded(value: &Value, field_type: FieldType) -> String {
    extract_comparable_value(value, Some(field_type)).to_lowercase()
}

// Helper for equals / not_equals
fn cmp_equals(value: &Value, operand: &Operand, field_type: FieldType) -> bool {
    let Operand::Text { folded: needle, number } = operand else {
        return false;
    };
    if let Value::List(items) = value {
        return items.iter().any(|item| cmp_equals(item, operand, field_type))
            || folded(value, field_type) == *needle;
    }
    if field_type.is_numeric() {
        if let (Some(lhs), Some(rhs)) = (extract_numeric_value(value), number) {
            return lhs == *rhs;
        }
    }
    folded(value, field_type) == *needle
}

// Helper for substring-style text operators
fn cmp_text<F>(value: &Value, operand: &Operand, field_type: FieldType, test: F) -> bool
where
    F: Fn(&str, &str) -> bool,
{
    match operand {
        Operand::Text { folded: needle, .. } => test(&folded(value, field_type), needle),
        _ => false,
    }
}

fn order_against(value: &Value, bound: &Bound) -> Option<Ordering> {
    match bound {
        Bound::Number(b) => extract_numeric_value(value)?.partial_cmp(b),
        Bound::Date(b) => Some(extract_date_value(value)?.date_naive().cmp(b)),
        Bound::Instant(b) => Some(extract_date_value(value)?.cmp(b)),
        Bound::Time(b) => Some(extract_time_value(value)?.cmp(b)),
    }
}

// Helper for ordered comparisons; values that do not parse never match
fn cmp_ord<F>(value: &Value, operand: &Operand, accept: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    match operand {
        Operand::Compare(bound) => order_against(value, bound).map(accept).unwrap_or(false),
        _ => false,
    }
}

fn cmp_between(value: &Value, operand: &Operand) -> bool {
    let Operand::Range { min, max } = operand else {
        return false;
    };
    if min.is_none() && max.is_none() {
        // ","
        return !extract_comparable_value(value, None).trim().is_empty();
    }
    let above_min = match min {
        Some(bound) => matches!(order_against(value, bound), Some(Ordering::Greater | Ordering::Equal)),
        None => true,
    };
    let below_max = match max {
        Some(bound) => matches!(order_against(value, bound), Some(Ordering::Less | Ordering::Equal)),
        None => true,
    };
    above_min && below_max
}

// Helper for 'in' and 'not in'
fn cmp_in(value: &Value, operand: &Operand, field_type: FieldType) -> bool {
    let Operand::Set(set) = operand else {
        return false;
    };
    match value {
        Value::List(items) => items.iter().any(|item| set.contains(folded(item, field_type).trim())),
        _ => set.contains(folded(value, field_type).trim()),
    }
}

fn cmp_window(value: &Value, operand: &Operand, field_type: FieldType, now: DateTime<Utc>, past: bool) -> bool {
    let Operand::Window(span) = operand else {
        return false;
    };
    let Some(instant) = extract_date_value(value) else {
        return false;
    };
    let (start, end) = if past {
        (now.checked_sub_signed(*span), Some(now))
    } else {
        (Some(now), now.checked_add_signed(*span))
    };
    let (Some(start), Some(end)) = (start, end) else {
        return false;
    };
    if field_type == FieldType::Date {
        let day = instant.date_naive();
        return start.date_naive() <= day && day <= end.date_naive();
    }
    start <= instant && instant <= end
}
