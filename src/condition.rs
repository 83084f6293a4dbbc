//! Condition module: filter conditions, groups, and their decoded operands.
//!
//! Conditions arrive from the UI with a single string `value`. Composite
//! arguments (ranges, lists, day counts) are comma encoded there; [`Operand::decode`]
//! turns them into structured form once, when a filter is compiled.

use crate::extract::{parse_instant, parse_number, parse_time};
use crate::types::FieldType;
use crate::FormtableError;
use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    Between,
    In,
    NotIn,
    LastDays,
    NextDays,
}

const OPERATOR_NAMES: [(&str, FilterOperator); 17] = [
    ("equals", FilterOperator::Equals),
    ("not_equals", FilterOperator::NotEquals),
    ("contains", FilterOperator::Contains),
    ("not_contains", FilterOperator::NotContains),
    ("starts_with", FilterOperator::StartsWith),
    ("ends_with", FilterOperator::EndsWith),
    ("is_empty", FilterOperator::IsEmpty),
    ("is_not_empty", FilterOperator::IsNotEmpty),
    ("greater_than", FilterOperator::GreaterThan),
    ("less_than", FilterOperator::LessThan),
    ("greater_equal", FilterOperator::GreaterEqual),
    ("less_equal", FilterOperator::LessEqual),
    ("between", FilterOperator::Between),
    ("in", FilterOperator::In),
    ("not_in", FilterOperator::NotIn),
    ("last_days", FilterOperator::LastDays),
    ("next_days", FilterOperator::NextDays),
];

impl FilterOperator {
    pub fn all() -> impl Iterator<Item = FilterOperator> {
        OPERATOR_NAMES.iter().map(|(_, op)| *op)
    }

    pub fn as_str(&self) -> &'static str {
        OPERATOR_NAMES
            .iter()
            .find(|(_, op)| op == self)
            .map(|(name, _)| *name)
            .unwrap_or("equals")
    }

    /// Display label for operator pickers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "does not equal",
            Self::Contains => "contains",
            Self::NotContains => "does not contain",
            Self::StartsWith => "starts with",
            Self::EndsWith => "ends with",
            Self::IsEmpty => "is empty",
            Self::IsNotEmpty => "is not empty",
            Self::GreaterThan => "greater than",
            Self::LessThan => "less than",
            Self::GreaterEqual => "greater or equal",
            Self::LessEqual => "less or equal",
            Self::Between => "between",
            Self::In => "is any of",
            Self::NotIn => "is none of",
            Self::LastDays => "in the last N days",
            Self::NextDays => "in the next N days",
        }
    }

    pub fn requires_value(&self) -> bool {
        !matches!(self, Self::IsEmpty | Self::IsNotEmpty)
    }
}

impl FromStr for FilterOperator {
    type Err = FormtableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OPERATOR_NAMES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, op)| *op)
            .ok_or_else(|| FormtableError::Validation(format!("unknown filter operator '{}'", s)))
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOp {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: String,
    /// Kept for round-tripping; groups combine conditions with the group's logic.
    #[serde(default)]
    pub logic: LogicalOp,
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            id: format!("{}-{}", field, operator),
            field,
            operator,
            value: value.into(),
            logic: LogicalOp::And,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterGroup {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
    #[serde(default)]
    pub logic: LogicalOp,
    #[serde(default)]
    pub is_open: bool,
}

impl FilterGroup {
    pub fn new(name: impl Into<String>, logic: LogicalOp) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            conditions: Vec::new(),
            logic,
            is_open: true,
        }
    }

    pub fn with_condition(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// A typed comparison bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Number(f64),
    Date(NaiveDate),
    Instant(chrono::DateTime<chrono::Utc>),
    Time(NaiveTime),
}

impl Bound {
    /// Parses a bound in the representation the field type compares with.
    pub fn parse(raw: &str, field_type: FieldType) -> Option<Bound> {
        match field_type {
            FieldType::Time => parse_time(raw).map(Bound::Time),
            FieldType::Date => parse_instant(raw).map(|dt| Bound::Date(dt.date_naive())),
            FieldType::DateTime => parse_instant(raw).map(Bound::Instant),
            _ => parse_number(raw).map(Bound::Number),
        }
    }
}

/// The decoded argument of a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `is_empty` / `is_not_empty` take no argument.
    Unary,
    /// Case-folded text, with its numeric reading when it has one.
    Text { folded: String, number: Option<f64> },
    Compare(Bound),
    /// Inclusive range; a missing side is unbounded.
    Range { min: Option<Bound>, max: Option<Bound> },
    Set(HashSet<String>),
    Window(Duration),
    /// The argument could not be decoded; the condition never matches.
    Invalid,
}

impl Operand {
    pub fn decode(operator: FilterOperator, raw: &str, field_type: FieldType) -> Operand {
        use FilterOperator::*;
        match operator {
            IsEmpty | IsNotEmpty => Operand::Unary,
            Equals | NotEquals | Contains | NotContains | StartsWith | EndsWith => Operand::Text {
                folded: raw.to_lowercase(),
                number: parse_number(raw),
            },
            GreaterThan | LessThan | GreaterEqual | LessEqual => {
                Bound::parse(raw, field_type).map(Operand::Compare).unwrap_or(Operand::Invalid)
            }
            Between => decode_range(raw, field_type),
            In | NotIn => Operand::Set(
                raw.split(',')
                    .map(|item| item.trim().to_lowercase())
                    .filter(|item| !item.is_empty())
                    .collect(),
            ),
            LastDays | NextDays => raw
                .trim()
                .parse::<u32>()
                .ok()
                .map(|days| Operand::Window(Duration::days(i64::from(days))))
                .unwrap_or(Operand::Invalid),
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Operand::Invalid)
    }
}

fn decode_range(raw: &str, field_type: FieldType) -> Operand {
    let (lo, hi) = raw.split_once(',').unwrap_or((raw, ""));
    let side = |s: &str| -> Result<Option<Bound>, ()> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(None);
        }
        Bound::parse(s, field_type).map(Some).ok_or(())
    };
    match (side(lo), side(hi)) {
        (Ok(min), Ok(max)) => Operand::Range { min, max },
        _ => Operand::Invalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_names_round_trip() {
        for op in FilterOperator::all() {
            assert_eq!(op.as_str().parse::<FilterOperator>().unwrap(), op);
            let json = serde_json::to_value(op).unwrap();
            assert_eq!(json, json!(op.as_str()));
        }
        assert!("like".parse::<FilterOperator>().is_err());
    }

    #[test]
    fn test_requires_value() {
        assert!(!FilterOperator::IsEmpty.requires_value());
        assert!(FilterOperator::Between.requires_value());
    }

    #[test]
    fn test_group_deserializes_from_ui_json() {
        let raw = json!({
            "id": "g1",
            "name": "Approved",
            "logic": "OR",
            "isOpen": false,
            "conditions": [
                { "id": "c1", "field": "status", "operator": "equals", "value": "approved", "logic": "AND" },
                { "id": "c2", "field": "score", "operator": "greater_equal", "value": "7" }
            ]
        });
        let group: FilterGroup = serde_json::from_value(raw).unwrap();
        assert_eq!(group.logic, LogicalOp::Or);
        assert_eq!(group.conditions.len(), 2);
        assert_eq!(group.conditions[1].operator, FilterOperator::GreaterEqual);
        assert_eq!(group.conditions[1].logic, LogicalOp::And);
        assert!(!group.is_open);
    }

    #[test]
    fn test_decode_text_operand() {
        let operand = Operand::decode(FilterOperator::Contains, "ApProved", FieldType::Text);
        assert_eq!(operand, Operand::Text { folded: "approved".into(), number: None });
        let operand = Operand::decode(FilterOperator::Equals, "5", FieldType::Number);
        assert_eq!(operand, Operand::Text { folded: "5".into(), number: Some(5.0) });
    }

    #[test]
    fn test_decode_range_open_upper() {
        let operand = Operand::decode(FilterOperator::Between, "5,", FieldType::Number);
        assert_eq!(operand, Operand::Range { min: Some(Bound::Number(5.0)), max: None });
        let operand = Operand::decode(FilterOperator::Between, "5", FieldType::Number);
        assert_eq!(operand, Operand::Range { min: Some(Bound::Number(5.0)), max: None });
        let operand = Operand::decode(FilterOperator::Between, ",10", FieldType::Number);
        assert_eq!(operand, Operand::Range { min: None, max: Some(Bound::Number(10.0)) });
    }

    #[test]
    fn test_decode_range_unparseable_is_invalid() {
        assert!(Operand::decode(FilterOperator::Between, "five,10", FieldType::Number).is_invalid());
        assert!(Operand::decode(FilterOperator::Between, "2024-01-01,later", FieldType::Date).is_invalid());
    }

    #[test]
    fn test_decode_typed_bounds() {
        let operand = Operand::decode(FilterOperator::Between, "2024-01-01,2024-01-31", FieldType::Date);
        assert_eq!(
            operand,
            Operand::Range {
                min: NaiveDate::from_ymd_opt(2024, 1, 1).map(Bound::Date),
                max: NaiveDate::from_ymd_opt(2024, 1, 31).map(Bound::Date),
            }
        );
        let operand = Operand::decode(FilterOperator::GreaterThan, "09:00", FieldType::Time);
        assert_eq!(operand, Operand::Compare(Bound::Time(NaiveTime::from_hms_opt(9, 0, 0).unwrap())));
        assert!(Operand::decode(FilterOperator::LessThan, "abc", FieldType::Number).is_invalid());
    }

    #[test]
    fn test_decode_set_and_window() {
        let operand = Operand::decode(FilterOperator::In, "Approved, pending,,", FieldType::Select);
        let expected: HashSet<String> = ["approved", "pending"].iter().map(|s| s.to_string()).collect();
        assert_eq!(operand, Operand::Set(expected));
        assert_eq!(Operand::decode(FilterOperator::LastDays, " 7 ", FieldType::Date), Operand::Window(Duration::days(7)));
        assert!(Operand::decode(FilterOperator::NextDays, "seven", FieldType::Date).is_invalid());
        assert!(Operand::decode(FilterOperator::NextDays, "-3", FieldType::Date).is_invalid());
    }
}
