//! Parsing and evaluation of condition keys
//!
//! Defines how a data source interprets [`Criteria`]: each key is a field name
//! with an optional operator suffix, tested against the literal value.

use crate::query::Criteria;
use crate::value::{Row, Value};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Comparison operator of a single condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=` (also implied by a missing operator)
    Eq,
    /// `!=` or `<>`
    NotEq,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Gte,
    /// `<=`
    Lte,
    /// `IN`
    In,
    /// `NOT IN`
    NotIn,
    /// `LIKE` with `%` and `_` wildcards
    Like,
    /// `NOT LIKE`
    NotLike,
}

impl Operator {
    /// Parse an operator token, case-insensitively
    pub fn parse(token: &str) -> Option<Self> {
        let normalized = token
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();

        match normalized.as_str() {
            "=" => Some(Operator::Eq),
            "!=" | "<>" => Some(Operator::NotEq),
            ">" => Some(Operator::Gt),
            "<" => Some(Operator::Lt),
            ">=" => Some(Operator::Gte),
            "<=" => Some(Operator::Lte),
            "IN" => Some(Operator::In),
            "NOT IN" => Some(Operator::NotIn),
            "LIKE" => Some(Operator::Like),
            "NOT LIKE" => Some(Operator::NotLike),
            _ => None,
        }
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A condition key that could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid condition key `{key}`")]
pub struct ConditionError {
    /// The offending key
    pub key: String,
}

/// One parsed condition: `field operator value`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Field tested
    pub field: String,
    /// Operator applied
    pub operator: Operator,
    /// Literal compared against
    pub value: Value,
}

impl Condition {
    /// Parse a condition key together with its value
    ///
    /// A list value under `=` becomes `IN`, and under `!=` becomes `NOT IN`.
    ///
    /// # Examples
    ///
    /// ```
    /// use quarry_domain::{Condition, Operator, Value};
    ///
    /// let c = Condition::parse("id !=", Value::Int(3)).unwrap();
    /// assert_eq!(c.field, "id");
    /// assert_eq!(c.operator, Operator::NotEq);
    ///
    /// let c = Condition::parse("id", Value::from(vec![1i64, 2])).unwrap();
    /// assert_eq!(c.operator, Operator::In);
    /// ```
    pub fn parse(key: &str, value: Value) -> Result<Self, ConditionError> {
        let key_trimmed = key.trim();
        let (field, operator) = match key_trimmed.split_once(char::is_whitespace) {
            Some((field, token)) => {
                let operator = Operator::parse(token).ok_or_else(|| ConditionError {
                    key: key.to_string(),
                })?;
                (field, operator)
            }
            None => (key_trimmed, Operator::Eq),
        };

        if field.is_empty() {
            return Err(ConditionError {
                key: key.to_string(),
            });
        }

        let operator = match (operator, &value) {
            (Operator::Eq, Value::List(_)) => Operator::In,
            (Operator::NotEq, Value::List(_)) => Operator::NotIn,
            (operator, _) => operator,
        };

        Ok(Self {
            field: field.to_string(),
            operator,
            value,
        })
    }

    /// Test a row against this condition
    ///
    /// A field missing from the row is treated as null.
    pub fn matches(&self, row: &Row) -> bool {
        let actual = row.get(&self.field).unwrap_or(&Value::Null);
        let expected = &self.value;

        match self.operator {
            Operator::Eq => actual.loose_eq(expected),
            Operator::NotEq => !actual.loose_eq(expected),
            Operator::Gt => actual.compare(expected) == Some(Ordering::Greater),
            Operator::Lt => actual.compare(expected) == Some(Ordering::Less),
            Operator::Gte => matches!(
                actual.compare(expected),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Lte => matches!(
                actual.compare(expected),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::In => contains(expected, actual),
            Operator::NotIn => !contains(expected, actual),
            Operator::Like => like(actual, expected),
            Operator::NotLike => !like(actual, expected),
        }
    }
}

fn contains(list: &Value, needle: &Value) -> bool {
    match list {
        Value::List(items) => items.iter().any(|item| item.loose_eq(needle)),
        single => single.loose_eq(needle),
    }
}

fn like(actual: &Value, pattern: &Value) -> bool {
    match (actual, pattern) {
        (Value::String(s), Value::String(p)) => like_match(s, p),
        _ => false,
    }
}

/// SQL `LIKE` matching: `%` is any run of characters, `_` exactly one
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // matched[j]: pattern[..j] matches the text prefix consumed so far
    let mut matched = vec![false; pattern.len() + 1];
    matched[0] = true;
    for j in 1..=pattern.len() {
        matched[j] = matched[j - 1] && pattern[j - 1] == '%';
    }

    for &c in &text {
        let mut next = vec![false; pattern.len() + 1];
        for j in 1..=pattern.len() {
            next[j] = match pattern[j - 1] {
                '%' => next[j - 1] || matched[j],
                '_' => matched[j - 1],
                p => matched[j - 1] && p.eq_ignore_ascii_case(&c),
            };
        }
        matched = next;
    }

    matched[pattern.len()]
}

/// A parsed conjunction of conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionSet {
    conditions: Vec<Condition>,
}

impl ConditionSet {
    /// Parse every key of the criteria
    pub fn parse(criteria: &Criteria) -> Result<Self, ConditionError> {
        let conditions = criteria
            .iter()
            .map(|(key, value)| Condition::parse(key, value.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { conditions })
    }

    /// True when the row satisfies every condition
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }

    /// The parsed conditions
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}
