// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Immutable query expression tree.
//!
//! Expressions describe *what* to match in backend-neutral terms; the
//! search compiler turns them into the backend's native query document.
//! Construction is by value and every combinator returns a new tree, so a
//! built expression can be compiled repeatedly and shared across requests.
//!
//! # Example
//!
//! ```
//! use search_gateway::expression::Expression;
//!
//! let expr = Expression::eq("keyword", "press")
//!     .and(Expression::gt("count", 10))
//!     .or(Expression::like("title", "archive*"));
//! let optimized = expr.optimize();
//! assert_eq!(optimized, optimized.optimize());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Comparison operator of a value leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    /// Wildcard match, `*` and `?` per backend convention.
    Like,
}

/// A typed comparison value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Date(DateTime<Utc>),
    Text(String),
}

impl FieldValue {
    /// JSON rendering used in compiled query documents. Dates serialize as
    /// RFC 3339 strings.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Integer(i) => serde_json::Value::from(*i),
            FieldValue::Float(f) => serde_json::Value::from(*f),
            FieldValue::Date(d) => serde_json::Value::String(d.to_rfc3339()),
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

/// A node in the expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    /// All children must match.
    And(Vec<Expression>),
    /// At least one child must match.
    Or(Vec<Expression>),
    /// The child must not match.
    Not(Box<Expression>),
    /// Single-field comparison.
    Value {
        field: String,
        op: ComparisonOp,
        value: FieldValue,
    },
    /// Inclusive bounded range on one field. Either bound may be open.
    Range {
        field: String,
        min: Option<FieldValue>,
        max: Option<FieldValue>,
    },
    /// Membership in a value set.
    In {
        field: String,
        values: Vec<FieldValue>,
    },
    /// Matches every document.
    MatchAll,
    /// Matches nothing.
    MatchNone,
}

impl Expression {
    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::value(field, ComparisonOp::Eq, value)
    }

    pub fn not_eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::value(field, ComparisonOp::NotEq, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::value(field, ComparisonOp::Gt, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::value(field, ComparisonOp::Ge, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::value(field, ComparisonOp::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::value(field, ComparisonOp::Le, value)
    }

    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::value(field, ComparisonOp::Like, FieldValue::Text(pattern.into()))
    }

    pub fn value(
        field: impl Into<String>,
        op: ComparisonOp,
        value: impl Into<FieldValue>,
    ) -> Self {
        Expression::Value {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn range(
        field: impl Into<String>,
        min: Option<FieldValue>,
        max: Option<FieldValue>,
    ) -> Self {
        Expression::Range {
            field: field.into(),
            min,
            max,
        }
    }

    pub fn any_of(field: impl Into<String>, values: Vec<FieldValue>) -> Self {
        Expression::In {
            field: field.into(),
            values,
        }
    }

    #[must_use]
    pub fn and(self, other: Expression) -> Self {
        match self {
            Expression::And(mut children) => {
                children.push(other);
                Expression::And(children)
            }
            first => Expression::And(vec![first, other]),
        }
    }

    #[must_use]
    pub fn or(self, other: Expression) -> Self {
        match self {
            Expression::Or(mut children) => {
                children.push(other);
                Expression::Or(children)
            }
            first => Expression::Or(vec![first, other]),
        }
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Expression::Not(Box::new(self))
    }

    /// Semantics-preserving simplification: flattens nested same-type
    /// conjunctions, removes neutral children, folds trivial trees and
    /// merges sibling equality leaves under `Or` into one set membership.
    ///
    /// The result is a fixed point: `e.optimize().optimize()` is
    /// structurally equal to `e.optimize()`.
    #[must_use]
    pub fn optimize(&self) -> Expression {
        match self {
            Expression::And(children) => optimize_and(children),
            Expression::Or(children) => optimize_or(children),
            Expression::Not(inner) => match inner.optimize() {
                Expression::MatchAll => Expression::MatchNone,
                Expression::MatchNone => Expression::MatchAll,
                Expression::Not(nested) => *nested,
                other => Expression::Not(Box::new(other)),
            },
            leaf => leaf.clone(),
        }
    }
}

fn optimize_and(children: &[Expression]) -> Expression {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        match child.optimize() {
            Expression::MatchAll => {}
            Expression::MatchNone => return Expression::MatchNone,
            Expression::And(nested) => out.extend(nested),
            other => out.push(other),
        }
    }
    match out.len() {
        0 => Expression::MatchAll,
        1 => out.swap_remove(0),
        _ => Expression::And(out),
    }
}

fn optimize_or(children: &[Expression]) -> Expression {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        match child.optimize() {
            Expression::MatchNone => {}
            Expression::MatchAll => return Expression::MatchAll,
            Expression::Or(nested) => flat.extend(nested),
            other => flat.push(other),
        }
    }

    // Merge Eq leaves (and existing In leaves) on the same field into one
    // membership test, keeping first-seen order of both fields and values.
    let mut groups: Vec<(String, Vec<FieldValue>)> = Vec::new();
    let mut out: Vec<MergeSlot> = Vec::new();
    for child in flat {
        match child {
            Expression::Value {
                field,
                op: ComparisonOp::Eq,
                value,
            } => merge_into_group(&mut groups, &mut out, field, vec![value]),
            Expression::In { field, values } => {
                merge_into_group(&mut groups, &mut out, field, values);
            }
            other => out.push(MergeSlot::Plain(other)),
        }
    }

    let mut merged = Vec::with_capacity(out.len());
    for slot in out {
        match slot {
            MergeSlot::Plain(expr) => merged.push(expr),
            MergeSlot::Group(index) => {
                let (field, values) = groups[index].clone();
                if values.len() == 1 {
                    let mut values = values;
                    merged.push(Expression::Value {
                        field,
                        op: ComparisonOp::Eq,
                        value: values.swap_remove(0),
                    });
                } else {
                    merged.push(Expression::In { field, values });
                }
            }
        }
    }

    match merged.len() {
        0 => Expression::MatchNone,
        1 => merged.swap_remove(0),
        _ => Expression::Or(merged),
    }
}

enum MergeSlot {
    Plain(Expression),
    Group(usize),
}

fn merge_into_group(
    groups: &mut Vec<(String, Vec<FieldValue>)>,
    out: &mut Vec<MergeSlot>,
    field: String,
    values: Vec<FieldValue>,
) {
    if let Some(index) = groups.iter().position(|(name, _)| *name == field) {
        for value in values {
            if !groups[index].1.contains(&value) {
                groups[index].1.push(value);
            }
        }
    } else {
        groups.push((field, values));
        out.push(MergeSlot::Group(groups.len() - 1));
    }
}
