use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod options;

pub use options::{DecideOption, DecideOptions};

/// A typed user attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Number(f64),
    String(String),
    Null,
}

impl AttributeValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value; non-finite numbers are treated as absent.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

impl From<serde_json::Value> for AttributeValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => AttributeValue::Bool(b),
            serde_json::Value::String(s) => AttributeValue::String(s),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(AttributeValue::Number)
                .unwrap_or(AttributeValue::Null),
            _ => AttributeValue::Null,
        }
    }
}

/// User attributes by name.
pub type Attributes = HashMap<String, AttributeValue>;

/// Which stage of the evaluation produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    ForcedDecision,
    Experiment,
    Rollout,
    Default,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::ForcedDecision => "forced-decision",
            DecisionSource::Experiment => "feature-test",
            DecisionSource::Rollout => "rollout",
            DecisionSource::Default => "default",
        }
    }
}

/// The outcome of evaluating one flag for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub flag_key: String,
    pub variation_key: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub variables: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_key: Option<String>,
    pub source: DecisionSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

/// Variation key reported when nothing applies to an unknown flag.
pub const OFF_VARIATION_KEY: &str = "off";

impl Decision {
    /// Disabled decision carrying a single reason.
    pub fn off(flag_key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            flag_key: flag_key.into(),
            variation_key: OFF_VARIATION_KEY.to_string(),
            enabled: false,
            variables: HashMap::new(),
            rule_id: None,
            rule_key: None,
            source: DecisionSource::Default,
            reasons: vec![reason.into()],
        }
    }

    pub fn flag_not_found(flag_key: &str) -> Self {
        Self::off(flag_key, format!("No flag was found for key \"{}\".", flag_key))
    }

    pub fn variable(&self, key: &str) -> Option<&serde_json::Value> {
        self.variables.get(key)
    }

    pub fn bool_variable(&self, key: &str) -> Option<bool> {
        self.variable(key).and_then(|v| v.as_bool())
    }

    pub fn string_variable(&self, key: &str) -> Option<&str> {
        self.variable(key).and_then(|v| v.as_str())
    }

    pub fn number_variable(&self, key: &str) -> Option<f64> {
        self.variable(key).and_then(|v| v.as_f64())
    }

    pub fn int_variable(&self, key: &str) -> Option<i64> {
        self.variable(key).and_then(|v| v.as_i64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_value_deserialization() {
        let attrs: Attributes = serde_json::from_str(
            r#"{"plan":"premium","age":31,"beta":true,"nothing":null}"#,
        )
        .unwrap();

        assert_eq!(attrs["plan"].as_str(), Some("premium"));
        assert_eq!(attrs["age"].as_number(), Some(31.0));
        assert_eq!(attrs["beta"].as_bool(), Some(true));
        assert!(attrs["nothing"].is_null());
    }

    #[test]
    fn test_attribute_value_from() {
        assert_eq!(AttributeValue::from(7i32), AttributeValue::Number(7.0));
        assert_eq!(AttributeValue::from("x"), AttributeValue::String("x".into()));
        assert_eq!(AttributeValue::from(None::<bool>), AttributeValue::Null);
        assert_eq!(
            AttributeValue::from(serde_json::json!([1, 2])),
            AttributeValue::Null
        );
    }

    #[test]
    fn test_non_finite_number_is_not_a_number() {
        assert_eq!(AttributeValue::Number(f64::NAN).as_number(), None);
        assert_eq!(AttributeValue::Number(f64::INFINITY).as_number(), None);
    }

    #[test]
    fn test_flag_not_found_decision() {
        let decision = Decision::flag_not_found("missing");
        assert!(!decision.enabled);
        assert_eq!(decision.variation_key, "off");
        assert_eq!(decision.source, DecisionSource::Default);
        assert_eq!(decision.reasons, vec!["No flag was found for key \"missing\".".to_string()]);
    }

    #[test]
    fn test_decision_serialization_skips_empty_fields() {
        let decision = Decision::off("flag", "reason");
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["flagKey"], "flag");
        assert_eq!(json["source"], "default");
        assert!(json.get("variables").is_none());
        assert!(json.get("ruleId").is_none());
    }
}
