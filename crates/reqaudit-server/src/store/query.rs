//! Backend-neutral filters and ordering
//!
//! Field paths are dotted (`spec.username`, `metadata.deletionTimestamp`).
//! Values compare numerically when both sides are numbers, as instants when
//! both sides parse as RFC 3339 timestamps, and lexically otherwise.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use super::model::{format_timestamp, Document};

pub const DELETION_TIMESTAMP: &str = "metadata.deletionTimestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }

    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    All,
    Equal { field: String, value: JsonValue },
    In { field: String, values: Vec<JsonValue> },
    StartsWith { field: String, prefix: String },
    Compare { field: String, op: CompareOp, value: JsonValue },
    IsNull { field: String },
    And(Vec<Query>),
}

impl Query {
    pub fn equal(field: &str, value: impl Into<JsonValue>) -> Self {
        Self::Equal {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn in_set<V: Into<JsonValue>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::In {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn starts_with(field: &str, prefix: impl Into<String>) -> Self {
        Self::StartsWith {
            field: field.to_string(),
            prefix: prefix.into(),
        }
    }

    pub fn compare(field: &str, op: CompareOp, value: impl Into<JsonValue>) -> Self {
        Self::Compare {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn before(field: &str, at: &DateTime<Utc>) -> Self {
        Self::compare(field, CompareOp::Lt, format_timestamp(at))
    }

    /// Inclusive on both ends
    pub fn between(field: &str, low: impl Into<JsonValue>, high: impl Into<JsonValue>) -> Self {
        Self::And(vec![
            Self::compare(field, CompareOp::Ge, low),
            Self::compare(field, CompareOp::Le, high),
        ])
    }

    pub fn is_null(field: &str) -> Self {
        Self::IsNull {
            field: field.to_string(),
        }
    }

    pub fn not_deleted() -> Self {
        Self::is_null(DELETION_TIMESTAMP)
    }

    /// Conjunction that flattens nested `And` and drops `All`
    pub fn and(self, other: Query) -> Self {
        let mut parts = Vec::new();
        for query in [self, other] {
            match query {
                Self::All => {},
                Self::And(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Self::All,
            1 => parts.remove(0),
            _ => Self::And(parts),
        }
    }

    /// Evaluate against a document. Missing fields never satisfy a comparison.
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::All => true,
            Self::Equal { field, value } => document
                .field(field)
                .is_some_and(|actual| values_equal(&actual, value)),
            Self::In { field, values } => document
                .field(field)
                .is_some_and(|actual| values.iter().any(|v| values_equal(&actual, v))),
            Self::StartsWith { field, prefix } => document
                .field(field)
                .and_then(|actual| actual.as_str().map(|s| s.starts_with(prefix.as_str())))
                .unwrap_or(false),
            Self::Compare { field, op, value } => document
                .field(field)
                .and_then(|actual| compare_values(&actual, value))
                .is_some_and(|ordering| op.accepts(ordering)),
            Self::IsNull { field } => document.field(field).is_none(),
            Self::And(parts) => parts.iter().all(|q| q.matches(document)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub query: Option<Query>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(query: Query) -> Self {
        Self { query: Some(query) }
    }

    pub fn and_query(mut self, query: Query) -> Self {
        self.query = Some(match self.query.take() {
            Some(existing) => existing.and(query),
            None => query,
        });
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.query.as_ref().map_or(true, |q| q.matches(document))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    pub orders: Vec<Order>,
}

impl Sort {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn asc(field: &str) -> Self {
        Self::unsorted().then(field, Direction::Asc)
    }

    pub fn desc(field: &str) -> Self {
        Self::unsorted().then(field, Direction::Desc)
    }

    pub fn then(mut self, field: &str, direction: Direction) -> Self {
        self.orders.push(Order {
            field: field.to_string(),
            direction,
        });
        self
    }

    /// Missing values order before present ones
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for order in &self.orders {
            let ordering = match (a.field(&order.field), b.field(&order.field)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => compare_values(&x, &y).unwrap_or(Ordering::Equal),
            };
            let ordering = match order.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// 1-based page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub size: u64,
    pub sort: Sort,
}

impl PageRequest {
    pub fn new(page: u64, size: u64, sort: Sort) -> Self {
        Self {
            page: page.max(1),
            size: size.max(1),
            sort,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.size)
    }
}

fn values_equal(a: &JsonValue, b: &JsonValue) -> bool {
    compare_values(a, b).map_or(a == b, |ordering| ordering == Ordering::Equal)
}

pub(crate) fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

pub fn compare_values(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (JsonValue::String(x), JsonValue::String(y)) => match (parse_instant(x), parse_instant(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        (JsonValue::Bool(x), JsonValue::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
