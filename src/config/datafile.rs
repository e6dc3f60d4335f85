//! Serde model of the JSON datafile.
//!
//! These types mirror the wire format one-to-one and carry no invariants;
//! [`ProjectConfig::load`](super::ProjectConfig::load) validates them.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use super::traffic::TrafficRange;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datafile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub revision: String,
    #[serde(default)]
    pub audiences: Vec<AudienceData>,
    #[serde(default)]
    pub typed_audiences: Vec<AudienceData>,
    #[serde(default)]
    pub experiments: Vec<ExperimentData>,
    #[serde(default)]
    pub groups: Vec<GroupData>,
    #[serde(default)]
    pub feature_flags: Vec<FlagData>,
    #[serde(default)]
    pub rollouts: Vec<RolloutData>,
    #[serde(default)]
    pub events: Vec<EventData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceData {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Either a condition array or a JSON-encoded string of one.
    pub conditions: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentData {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub layer_id: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub audience_ids: Vec<String>,
    #[serde(default)]
    pub audience_conditions: Option<serde_json::Value>,
    #[serde(default)]
    pub traffic_allocation: Vec<TrafficRange>,
    #[serde(default)]
    pub variations: Vec<VariationData>,
    /// Whitelisted user id → variation key.
    #[serde(default)]
    pub forced_variations: HashMap<String, String>,
}

fn default_status() -> String {
    "Running".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationData {
    pub id: String,
    pub key: String,
    #[serde(default = "default_true")]
    pub feature_enabled: bool,
    #[serde(default)]
    pub variables: Vec<VariableUsageData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableUsageData {
    pub id: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupData {
    pub id: String,
    #[serde(default = "default_policy")]
    pub policy: String,
    #[serde(default)]
    pub traffic_allocation: Vec<TrafficRange>,
    #[serde(default)]
    pub experiments: Vec<ExperimentData>,
}

fn default_policy() -> String {
    "random".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagData {
    #[serde(default)]
    pub id: String,
    pub key: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub rollout_id: String,
    #[serde(default)]
    pub experiment_ids: Vec<String>,
    #[serde(default)]
    pub variables: Vec<VariableDefinitionData>,
    #[serde(default)]
    pub default_variation_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDefinitionData {
    pub id: String,
    pub key: String,
    #[serde(rename = "type")]
    pub variable_type: String,
    #[serde(default)]
    pub sub_type: Option<String>,
    pub default_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutData {
    pub id: String,
    #[serde(default)]
    pub experiments: Vec<ExperimentData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub experiment_ids: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
