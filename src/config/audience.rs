//! Audience targeting expressions as they appear in the datafile.
//!
//! Conditions are nested JSON arrays whose first element may name an operator:
//! `["and", {...}, ["or", {...}, {...}]]`. An array that does not start with an
//! operator is an implicit `or` over all of its elements.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ErrorCode, FlagKitError, Result};

/// Boolean tree over leaves of type `T`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression<T> {
    And(Vec<Expression<T>>),
    Or(Vec<Expression<T>>),
    Not(Box<Expression<T>>),
    Leaf(T),
}

impl<T> Expression<T> {
    /// Parses a condition tree, delegating leaves to `leaf`.
    pub fn parse<F>(value: &Value, leaf: &F) -> Result<Self>
    where
        F: Fn(&Value) -> Result<T>,
    {
        let Value::Array(items) = value else {
            return Ok(Expression::Leaf(leaf(value)?));
        };

        let (operator, operands) = match items.first().and_then(Value::as_str) {
            Some(op @ ("and" | "or" | "not")) => (op, &items[1..]),
            _ => ("or", &items[..]),
        };

        let mut children = operands
            .iter()
            .map(|item| Self::parse(item, leaf))
            .collect::<Result<Vec<_>>>()?;

        match operator {
            "and" => Ok(Expression::And(children)),
            "not" => {
                if children.is_empty() {
                    return Err(FlagKitError::config_error(
                        ErrorCode::ConfigInvalidAudience,
                        "\"not\" requires an operand",
                    ));
                }
                Ok(Expression::Not(Box::new(children.swap_remove(0))))
            }
            _ => Ok(Expression::Or(children)),
        }
    }

    /// True when the tree has no leaves at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Expression::And(children) | Expression::Or(children) => {
                children.iter().all(Expression::is_empty)
            }
            Expression::Not(child) => child.is_empty(),
            Expression::Leaf(_) => false,
        }
    }

    /// Visits every leaf in declaration order.
    pub fn for_each_leaf<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a T),
    {
        match self {
            Expression::And(children) | Expression::Or(children) => {
                for child in children {
                    child.for_each_leaf(f);
                }
            }
            Expression::Not(child) => child.for_each_leaf(f),
            Expression::Leaf(leaf) => f(leaf),
        }
    }
}

/// Match operator of a leaf condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchType {
    Exact,
    Exists,
    Substring,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    SemverEqual,
    SemverGreaterThan,
    SemverGreaterThanOrEqual,
    SemverLessThan,
    SemverLessThanOrEqual,
    Unknown(String),
}

impl MatchType {
    fn parse(value: Option<&str>) -> Self {
        match value {
            None | Some("exact") => MatchType::Exact,
            Some("exists") => MatchType::Exists,
            Some("substring") => MatchType::Substring,
            Some("gt") => MatchType::GreaterThan,
            Some("ge") => MatchType::GreaterThanOrEqual,
            Some("lt") => MatchType::LessThan,
            Some("le") => MatchType::LessThanOrEqual,
            Some("semver_eq") => MatchType::SemverEqual,
            Some("semver_gt") => MatchType::SemverGreaterThan,
            Some("semver_ge") => MatchType::SemverGreaterThanOrEqual,
            Some("semver_lt") => MatchType::SemverLessThan,
            Some("semver_le") => MatchType::SemverLessThanOrEqual,
            Some(other) => MatchType::Unknown(other.to_string()),
        }
    }
}

pub const CUSTOM_ATTRIBUTE_CONDITION: &str = "custom_attribute";

/// A leaf condition comparing one user attribute against a literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub name: String,
    pub condition_type: String,
    pub match_type: MatchType,
    pub value: Value,
}

#[derive(Deserialize)]
struct RawCondition {
    name: String,
    #[serde(rename = "type", default = "default_condition_type")]
    condition_type: String,
    #[serde(rename = "match", default)]
    match_type: Option<String>,
    #[serde(default)]
    value: Value,
}

fn default_condition_type() -> String {
    CUSTOM_ATTRIBUTE_CONDITION.to_string()
}

impl Condition {
    pub fn new(name: impl Into<String>, match_type: MatchType, value: Value) -> Self {
        Self {
            name: name.into(),
            condition_type: CUSTOM_ATTRIBUTE_CONDITION.to_string(),
            match_type,
            value,
        }
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let raw = RawCondition::deserialize(value).map_err(|e| {
            FlagKitError::with_source(
                ErrorCode::ConfigInvalidAudience,
                format!("invalid audience condition {}", value),
                e,
            )
        })?;

        let condition = Self {
            name: raw.name,
            condition_type: raw.condition_type,
            match_type: MatchType::parse(raw.match_type.as_deref()),
            value: raw.value,
        };

        // Evaluation treats these as unknown without logging.
        if condition.condition_type != CUSTOM_ATTRIBUTE_CONDITION {
            tracing::warn!(
                condition_type = %condition.condition_type,
                attribute = %condition.name,
                "Unsupported audience condition type"
            );
        } else if let MatchType::Unknown(name) = &condition.match_type {
            tracing::warn!(match_type = %name, attribute = %condition.name, "Unknown match type");
        }

        Ok(condition)
    }
}

/// A named audience with its condition tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Audience {
    pub id: String,
    pub name: String,
    pub conditions: Expression<Condition>,
}

impl Audience {
    /// Builds an audience from datafile conditions, which may be a JSON-encoded string.
    pub fn parse(id: &str, name: &str, conditions: &Value) -> Result<Self> {
        let decoded;
        let conditions = match conditions {
            Value::String(encoded) => {
                decoded = serde_json::from_str::<Value>(encoded).map_err(|e| {
                    FlagKitError::with_source(
                        ErrorCode::ConfigInvalidAudience,
                        format!("audience \"{}\" has malformed conditions", id),
                        e,
                    )
                })?;
                &decoded
            }
            other => other,
        };

        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            conditions: Expression::parse(conditions, &Condition::from_value)?,
        })
    }
}

/// Parses an experiment's audience expression whose leaves are audience ids.
pub fn parse_audience_ids(value: &Value) -> Result<Expression<String>> {
    Expression::parse(value, &|leaf: &Value| {
        leaf.as_str().map(str::to_string).ok_or_else(|| {
            FlagKitError::config_error(
                ErrorCode::ConfigInvalidAudience,
                format!("audience reference must be a string, got {}", leaf),
            )
        })
    })
}
