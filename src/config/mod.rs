//! Immutable project configuration.
//!
//! A [`ProjectConfig`] is built once from a [`Datafile`] and never mutated. Every
//! reference between flags, experiments, rollouts, groups, audiences and events is
//! checked during [`ProjectConfig::load`]; a configuration that fails any check is
//! rejected as a whole.

mod audience;
mod datafile;
mod traffic;

pub use audience::{
    parse_audience_ids, Audience, Condition, Expression, MatchType, CUSTOM_ATTRIBUTE_CONDITION,
};
pub use datafile::{
    AudienceData, Datafile, EventData, ExperimentData, FlagData, GroupData, RolloutData,
    VariableDefinitionData, VariableUsageData, VariationData,
};
pub use traffic::{TrafficAllocation, TrafficRange, MAX_TRAFFIC_VALUE};

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::error::{ErrorCode, FlagKitError, Result};
use crate::types::OFF_VARIATION_KEY;

/// Lifecycle status of an experiment; only running experiments are evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentStatus {
    Running,
    Paused,
    NotStarted,
    Archived,
    Other(String),
}

impl ExperimentStatus {
    fn parse(status: &str) -> Self {
        match status {
            "Running" => ExperimentStatus::Running,
            "Paused" => ExperimentStatus::Paused,
            "Not started" => ExperimentStatus::NotStarted,
            "Archived" => ExperimentStatus::Archived,
            other => ExperimentStatus::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variation {
    pub id: String,
    pub key: String,
    pub feature_enabled: bool,
    /// Raw override values by variable id.
    pub variables: HashMap<String, String>,
}

impl Variation {
    fn build(data: &VariationData) -> Self {
        Self {
            id: data.id.clone(),
            key: data.key.clone(),
            feature_enabled: data.feature_enabled,
            variables: data
                .variables
                .iter()
                .map(|v| (v.id.clone(), v.value.clone()))
                .collect(),
        }
    }
}

/// An A/B test or a rollout rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    pub id: String,
    pub key: String,
    pub layer_id: String,
    pub status: ExperimentStatus,
    pub audience_conditions: Expression<String>,
    pub traffic_allocation: TrafficAllocation,
    pub group_id: Option<String>,
    pub variations: Vec<Variation>,
    pub forced_variations: HashMap<String, String>,
}

impl Experiment {
    fn build(data: &ExperimentData, group_id: Option<&str>) -> Result<Self> {
        let audience_conditions = match &data.audience_conditions {
            Some(conditions) => parse_audience_ids(conditions)?,
            None => Expression::Or(
                data.audience_ids
                    .iter()
                    .map(|id| Expression::Leaf(id.clone()))
                    .collect(),
            ),
        };

        let traffic_allocation = TrafficAllocation::new(data.traffic_allocation.clone())
            .map_err(|e| {
                FlagKitError::config_error(
                    e.code,
                    format!("experiment \"{}\": {}", data.key, e.message),
                )
            })?;

        let mut variation_ids = HashSet::new();
        let variations: Vec<Variation> = data.variations.iter().map(Variation::build).collect();
        for variation in &variations {
            if !variation_ids.insert(variation.id.as_str()) {
                return Err(FlagKitError::config_error(
                    ErrorCode::ConfigDuplicateKey,
                    format!(
                        "experiment \"{}\" declares variation \"{}\" twice",
                        data.key, variation.id
                    ),
                ));
            }
        }

        let owner = format!("experiment \"{}\"", data.key);
        for entity_id in traffic_allocation.entity_ids() {
            if !variation_ids.contains(entity_id) {
                return Err(FlagKitError::missing_reference("variation", entity_id, &owner));
            }
        }
        for variation_key in data.forced_variations.values() {
            if !variations.iter().any(|v| &v.key == variation_key) {
                return Err(FlagKitError::missing_reference("variation key", variation_key, &owner));
            }
        }

        Ok(Self {
            id: data.id.clone(),
            key: data.key.clone(),
            layer_id: data.layer_id.clone(),
            status: ExperimentStatus::parse(&data.status),
            audience_conditions,
            traffic_allocation,
            group_id: group_id.map(str::to_string),
            variations,
            forced_variations: data.forced_variations.clone(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.status == ExperimentStatus::Running
    }

    pub fn variation(&self, variation_id: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| v.id == variation_id)
    }

    pub fn variation_by_key(&self, variation_key: &str) -> Option<&Variation> {
        self.variations.iter().find(|v| v.key == variation_key)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rollout {
    pub id: String,
    pub rules: Vec<Experiment>,
}

/// Mutual-exclusion group: a user enters at most one member experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: String,
    pub policy: String,
    pub traffic_allocation: TrafficAllocation,
    pub experiment_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventDefinition {
    pub id: String,
    pub key: String,
    pub experiment_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableType {
    String,
    Integer,
    Double,
    Boolean,
    Json,
}

impl VariableType {
    fn parse(variable_type: &str, sub_type: Option<&str>) -> Option<Self> {
        match (variable_type, sub_type) {
            ("string", Some("json")) | ("json", _) => Some(VariableType::Json),
            ("string", _) => Some(VariableType::String),
            ("integer", _) => Some(VariableType::Integer),
            ("double", _) => Some(VariableType::Double),
            ("boolean", _) => Some(VariableType::Boolean),
            _ => None,
        }
    }

    /// Converts a raw datafile string into a typed JSON value.
    pub fn parse_value(&self, raw: &str) -> Option<Value> {
        match self {
            VariableType::String => Some(Value::String(raw.to_string())),
            VariableType::Integer => raw.trim().parse::<i64>().ok().map(Value::from),
            VariableType::Double => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            VariableType::Boolean => match raw.trim() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            VariableType::Json => serde_json::from_str(raw).ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub id: String,
    pub key: String,
    pub variable_type: VariableType,
    pub default_value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flag {
    pub id: String,
    pub key: String,
    pub enabled: bool,
    pub experiment_ids: Vec<String>,
    pub rollout_id: Option<String>,
    pub default_variation_key: String,
    pub variables: Vec<VariableDefinition>,
}

impl Flag {
    fn build(data: &FlagData) -> Result<Self> {
        let mut keys = HashSet::new();
        let mut variables = Vec::with_capacity(data.variables.len());
        for variable in &data.variables {
            if !keys.insert(variable.key.as_str()) {
                return Err(FlagKitError::config_error(
                    ErrorCode::ConfigDuplicateKey,
                    format!("flag \"{}\" declares variable \"{}\" twice", data.key, variable.key),
                ));
            }
            let variable_type =
                VariableType::parse(&variable.variable_type, variable.sub_type.as_deref())
                    .ok_or_else(|| {
                        FlagKitError::config_error(
                            ErrorCode::ConfigInvalidVariable,
                            format!(
                                "variable \"{}\" has unsupported type \"{}\"",
                                variable.key, variable.variable_type
                            ),
                        )
                    })?;
            let default_value = variable_type
                .parse_value(&variable.default_value)
                .ok_or_else(|| {
                    FlagKitError::config_error(
                        ErrorCode::ConfigInvalidVariable,
                        format!(
                            "default value of variable \"{}\" is not a valid {:?}",
                            variable.key, variable_type
                        ),
                    )
                })?;
            variables.push(VariableDefinition {
                id: variable.id.clone(),
                key: variable.key.clone(),
                variable_type,
                default_value,
            });
        }

        Ok(Self {
            id: data.id.clone(),
            key: data.key.clone(),
            enabled: data.enabled,
            experiment_ids: data.experiment_ids.clone(),
            rollout_id: Some(data.rollout_id.clone()).filter(|id| !id.is_empty()),
            default_variation_key: data
                .default_variation_key
                .clone()
                .unwrap_or_else(|| OFF_VARIATION_KEY.to_string()),
            variables,
        })
    }

    pub fn variable_by_id(&self, variable_id: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|v| v.id == variable_id)
    }

    /// Variable values for `variation`: overrides when the feature is enabled, defaults otherwise.
    pub fn resolve_variables(&self, variation: Option<&Variation>) -> HashMap<String, Value> {
        let overrides = variation.filter(|v| v.feature_enabled).map(|v| &v.variables);

        self.variables
            .iter()
            .map(|definition| {
                let value = overrides
                    .and_then(|o| o.get(&definition.id))
                    .and_then(|raw| definition.variable_type.parse_value(raw))
                    .unwrap_or_else(|| definition.default_value.clone());
                (definition.key.clone(), value)
            })
            .collect()
    }
}

/// Immutable, validated snapshot of a project's flags and rules.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    revision: u32,
    account_id: String,
    project_id: String,
    flags: Vec<Flag>,
    flag_index: HashMap<String, usize>,
    experiments: HashMap<String, Experiment>,
    audiences: HashMap<String, Audience>,
    rollouts: HashMap<String, Rollout>,
    groups: HashMap<String, Group>,
    events: HashMap<String, EventDefinition>,
}

fn insert_unique<V>(map: &mut HashMap<String, V>, kind: &str, id: &str, value: V) -> Result<()> {
    if map.insert(id.to_string(), value).is_some() {
        return Err(FlagKitError::config_error(
            ErrorCode::ConfigDuplicateKey,
            format!("{} \"{}\" is declared twice", kind, id),
        ));
    }
    Ok(())
}

impl ProjectConfig {
    /// Parses and validates a JSON datafile.
    pub fn from_json(content: &str) -> Result<Self> {
        let datafile: Datafile = serde_json::from_str(content).map_err(|e| {
            FlagKitError::with_source(ErrorCode::ConfigInvalidJson, "datafile is not valid JSON", e)
        })?;
        Self::load(datafile)
    }

    /// Validates a parsed datafile and builds the snapshot.
    pub fn load(datafile: Datafile) -> Result<Self> {
        let revision = datafile.revision.trim().parse::<u32>().map_err(|e| {
            FlagKitError::with_source(
                ErrorCode::ConfigInvalidRevision,
                format!("revision \"{}\" is not an unsigned integer", datafile.revision),
                e,
            )
        })?;

        // Typed audiences replace legacy audiences sharing an id.
        let mut audiences = HashMap::new();
        for data in &datafile.audiences {
            audiences.insert(data.id.clone(), Audience::parse(&data.id, &data.name, &data.conditions)?);
        }
        for data in &datafile.typed_audiences {
            audiences.insert(data.id.clone(), Audience::parse(&data.id, &data.name, &data.conditions)?);
        }

        let mut experiments = HashMap::new();
        for data in &datafile.experiments {
            insert_unique(&mut experiments, "experiment", &data.id, Experiment::build(data, None)?)?;
        }

        let mut groups = HashMap::new();
        for data in &datafile.groups {
            let owner = format!("group \"{}\"", data.id);
            let traffic_allocation = TrafficAllocation::new(data.traffic_allocation.clone())?;
            let experiment_ids: Vec<String> = data.experiments.iter().map(|e| e.id.clone()).collect();
            for entity_id in traffic_allocation.entity_ids() {
                if !experiment_ids.iter().any(|id| id == entity_id) {
                    return Err(FlagKitError::missing_reference("experiment", entity_id, &owner));
                }
            }
            for experiment in &data.experiments {
                insert_unique(
                    &mut experiments,
                    "experiment",
                    &experiment.id,
                    Experiment::build(experiment, Some(&data.id))?,
                )?;
            }
            let group = Group {
                id: data.id.clone(),
                policy: data.policy.clone(),
                traffic_allocation,
                experiment_ids,
            };
            insert_unique(&mut groups, "group", &data.id, group)?;
        }

        let mut rollouts = HashMap::new();
        for data in &datafile.rollouts {
            let rules = data
                .experiments
                .iter()
                .map(|rule| Experiment::build(rule, None))
                .collect::<Result<Vec<_>>>()?;
            let rollout = Rollout {
                id: data.id.clone(),
                rules,
            };
            insert_unique(&mut rollouts, "rollout", &data.id, rollout)?;
        }

        let rules = experiments
            .values()
            .chain(rollouts.values().flat_map(|r| r.rules.iter()));
        for rule in rules {
            let mut missing = None;
            rule.audience_conditions.for_each_leaf(&mut |id: &String| {
                if missing.is_none() && !audiences.contains_key(id) {
                    missing = Some(id.clone());
                }
            });
            if let Some(id) = missing {
                return Err(FlagKitError::missing_reference(
                    "audience",
                    &id,
                    &format!("rule \"{}\"", rule.key),
                ));
            }
        }

        let mut flags = Vec::with_capacity(datafile.feature_flags.len());
        let mut flag_index = HashMap::new();
        for data in &datafile.feature_flags {
            let flag = Flag::build(data)?;
            let owner = format!("flag \"{}\"", flag.key);

            let mut rules: Vec<&Experiment> = Vec::new();
            for experiment_id in &flag.experiment_ids {
                let experiment = experiments
                    .get(experiment_id)
                    .ok_or_else(|| FlagKitError::missing_reference("experiment", experiment_id, &owner))?;
                rules.push(experiment);
            }
            if let Some(rollout_id) = &flag.rollout_id {
                let rollout = rollouts
                    .get(rollout_id)
                    .ok_or_else(|| FlagKitError::missing_reference("rollout", rollout_id, &owner))?;
                rules.extend(rollout.rules.iter());
            }

            for variation in rules.iter().flat_map(|r| r.variations.iter()) {
                for (variable_id, raw) in &variation.variables {
                    let definition = flag.variable_by_id(variable_id).ok_or_else(|| {
                        FlagKitError::missing_reference(
                            "variable",
                            variable_id,
                            &format!("variation \"{}\"", variation.key),
                        )
                    })?;
                    if definition.variable_type.parse_value(raw).is_none() {
                        return Err(FlagKitError::config_error(
                            ErrorCode::ConfigInvalidVariable,
                            format!(
                                "variation \"{}\" overrides \"{}\" with an invalid {:?}",
                                variation.key, definition.key, definition.variable_type
                            ),
                        ));
                    }
                }
            }

            if flag_index.insert(flag.key.clone(), flags.len()).is_some() {
                return Err(FlagKitError::config_error(
                    ErrorCode::ConfigDuplicateKey,
                    format!("flag \"{}\" is declared twice", flag.key),
                ));
            }
            flags.push(flag);
        }

        let mut events = HashMap::new();
        for data in &datafile.events {
            let owner = format!("event \"{}\"", data.key);
            for experiment_id in &data.experiment_ids {
                if !experiments.contains_key(experiment_id) {
                    return Err(FlagKitError::missing_reference("experiment", experiment_id, &owner));
                }
            }
            let event = EventDefinition {
                id: data.id.clone(),
                key: data.key.clone(),
                experiment_ids: data.experiment_ids.clone(),
            };
            insert_unique(&mut events, "event", &data.key, event)?;
        }

        tracing::debug!(
            revision,
            flags = flags.len(),
            experiments = experiments.len(),
            "Project configuration loaded"
        );

        Ok(Self {
            revision,
            account_id: datafile.account_id,
            project_id: datafile.project_id,
            flags,
            flag_index,
            experiments,
            audiences,
            rollouts,
            groups,
            events,
        })
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn flag(&self, flag_key: &str) -> Option<&Flag> {
        self.flag_index.get(flag_key).map(|&i| &self.flags[i])
    }

    /// Flags in declaration order.
    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }

    pub fn experiment(&self, experiment_id: &str) -> Option<&Experiment> {
        self.experiments.get(experiment_id)
    }

    pub fn audience(&self, audience_id: &str) -> Option<&Audience> {
        self.audiences.get(audience_id)
    }

    pub fn rollout(&self, rollout_id: &str) -> Option<&Rollout> {
        self.rollouts.get(rollout_id)
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.get(group_id)
    }

    pub fn event(&self, event_key: &str) -> Option<&EventDefinition> {
        self.events.get(event_key)
    }

    /// Experiments and rollout rules of `flag`, in evaluation order.
    pub fn rules_for<'a>(&'a self, flag: &'a Flag) -> impl Iterator<Item = &'a Experiment> + 'a {
        let experiments = flag
            .experiment_ids
            .iter()
            .filter_map(move |id| self.experiments.get(id));
        let rollout_rules = flag
            .rollout_id
            .as_deref()
            .and_then(move |id| self.rollouts.get(id))
            .into_iter()
            .flat_map(|r| r.rules.iter());
        experiments.chain(rollout_rules)
    }

    /// First rule of `flag` that declares `variation_key`.
    pub fn flag_variation<'a>(
        &'a self,
        flag: &'a Flag,
        variation_key: &str,
    ) -> Option<(&'a Experiment, &'a Variation)> {
        self.rules_for(flag)
            .find_map(|rule| rule.variation_by_key(variation_key).map(|v| (rule, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn datafile() -> Value {
        json!({
            "revision": "3",
            "accountId": "acc",
            "projectId": "proj",
            "typedAudiences": [
                {"id": "aud_beta", "name": "beta", "conditions": ["and", ["or", {"name": "beta", "type": "custom_attribute", "match": "exact", "value": true}]]}
            ],
            "experiments": [{
                "id": "exp_1", "key": "checkout_test", "layerId": "layer_1",
                "audienceIds": ["aud_beta"],
                "trafficAllocation": [{"entityId": "var_a", "endOfRange": 5000}, {"entityId": "var_b", "endOfRange": 10000}],
                "variations": [
                    {"id": "var_a", "key": "control", "featureEnabled": false},
                    {"id": "var_b", "key": "treatment", "variables": [{"id": "v_color", "value": "green"}]}
                ]
            }],
            "rollouts": [{
                "id": "roll_1",
                "experiments": [{
                    "id": "rule_everyone", "key": "everyone_else",
                    "trafficAllocation": [{"entityId": "var_on", "endOfRange": 10000}],
                    "variations": [{"id": "var_on", "key": "on"}]
                }]
            }],
            "featureFlags": [{
                "id": "flag_1", "key": "checkout", "rolloutId": "roll_1",
                "experimentIds": ["exp_1"],
                "variables": [{"id": "v_color", "key": "color", "type": "string", "defaultValue": "blue"}]
            }],
            "events": [{"id": "ev_1", "key": "purchase", "experimentIds": ["exp_1"]}]
        })
    }

    fn load(value: Value) -> Result<ProjectConfig> {
        ProjectConfig::load(serde_json::from_value(value).unwrap())
    }

    #[test]
    fn test_load_valid_datafile() {
        let config = load(datafile()).unwrap();

        assert_eq!(config.revision(), 3);
        assert_eq!(config.account_id(), "acc");
        let flag = config.flag("checkout").unwrap();
        assert_eq!(flag.default_variation_key, "off");
        assert_eq!(config.rules_for(flag).count(), 2);
        assert!(config.event("purchase").is_some());
        assert!(config.audience("aud_beta").is_some());
    }

    #[test]
    fn test_rejects_unknown_experiment_reference() {
        let mut value = datafile();
        value["featureFlags"][0]["experimentIds"] = json!(["exp_missing"]);
        let error = load(value).unwrap_err();
        assert_eq!(error.code, ErrorCode::ConfigMissingReference);
        assert!(error.message.contains("exp_missing"));
    }

    #[test]
    fn test_rejects_unknown_rollout_reference() {
        let mut value = datafile();
        value["featureFlags"][0]["rolloutId"] = json!("roll_missing");
        assert_eq!(load(value).unwrap_err().code, ErrorCode::ConfigMissingReference);
    }

    #[test]
    fn test_rejects_unknown_audience_reference() {
        let mut value = datafile();
        value["experiments"][0]["audienceIds"] = json!(["aud_missing"]);
        assert_eq!(load(value).unwrap_err().code, ErrorCode::ConfigMissingReference);
    }

    #[test]
    fn test_rejects_unknown_variation_in_allocation() {
        let mut value = datafile();
        value["experiments"][0]["trafficAllocation"][1]["entityId"] = json!("var_missing");
        assert_eq!(load(value).unwrap_err().code, ErrorCode::ConfigMissingReference);
    }

    #[test]
    fn test_rejects_unsorted_allocation() {
        let mut value = datafile();
        value["experiments"][0]["trafficAllocation"] = json!([
            {"entityId": "var_a", "endOfRange": 8000},
            {"entityId": "var_b", "endOfRange": 4000}
        ]);
        assert_eq!(
            load(value).unwrap_err().code,
            ErrorCode::ConfigInvalidTrafficAllocation
        );
    }

    #[test]
    fn test_rejects_invalid_revision() {
        let mut value = datafile();
        value["revision"] = json!("abc");
        assert_eq!(load(value).unwrap_err().code, ErrorCode::ConfigInvalidRevision);
    }

    #[test]
    fn test_rejects_invalid_variable_default() {
        let mut value = datafile();
        value["featureFlags"][0]["variables"] =
            json!([{"id": "v_color", "key": "color", "type": "integer", "defaultValue": "blue"}]);
        assert_eq!(load(value).unwrap_err().code, ErrorCode::ConfigInvalidVariable);
    }

    #[test]
    fn test_rejects_duplicate_flag() {
        let mut value = datafile();
        let flag = value["featureFlags"][0].clone();
        value["featureFlags"].as_array_mut().unwrap().push(flag);
        assert_eq!(load(value).unwrap_err().code, ErrorCode::ConfigDuplicateKey);
    }

    #[test]
    fn test_rejects_group_allocation_outside_members() {
        let mut value = datafile();
        value["groups"] = json!([{
            "id": "grp_1",
            "trafficAllocation": [{"entityId": "exp_1", "endOfRange": 10000}],
            "experiments": []
        }]);
        assert_eq!(load(value).unwrap_err().code, ErrorCode::ConfigMissingReference);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        let error = ProjectConfig::from_json("{ not json").unwrap_err();
        assert_eq!(error.code, ErrorCode::ConfigInvalidJson);
    }

    #[test]
    fn test_resolve_variables() {
        let config = load(datafile()).unwrap();
        let flag = config.flag("checkout").unwrap();
        let experiment = config.experiment("exp_1").unwrap();

        let treatment = experiment.variation("var_b");
        assert_eq!(flag.resolve_variables(treatment)["color"], json!("green"));

        let control = experiment.variation("var_a");
        assert_eq!(flag.resolve_variables(control)["color"], json!("blue"));

        assert_eq!(flag.resolve_variables(None)["color"], json!("blue"));
    }

    #[test]
    fn test_variable_type_parsing() {
        assert_eq!(VariableType::Integer.parse_value("42"), Some(json!(42)));
        assert_eq!(VariableType::Double.parse_value("1.5"), Some(json!(1.5)));
        assert_eq!(VariableType::Boolean.parse_value("true"), Some(json!(true)));
        assert_eq!(VariableType::Json.parse_value(r#"{"a":1}"#), Some(json!({"a": 1})));
        assert_eq!(VariableType::Boolean.parse_value("yes"), None);
        assert_eq!(VariableType::parse("string", Some("json")), Some(VariableType::Json));
    }

    #[test]
    fn test_flag_variation_lookup() {
        let config = load(datafile()).unwrap();
        let flag = config.flag("checkout").unwrap();

        let (rule, variation) = config.flag_variation(flag, "on").unwrap();
        assert_eq!(rule.id, "rule_everyone");
        assert_eq!(variation.id, "var_on");
        assert!(config.flag_variation(flag, "nope").is_none());
    }
}
