use flagkit_engine::config::{ExperimentStatus, VariableType};
use flagkit_engine::{ErrorCode, ProjectConfig};
use serde_json::{json, Value};

const PROJECT: &str = include_str!("fixtures/project.json");

fn project() -> Value {
    serde_json::from_str(PROJECT).unwrap()
}

fn load(value: &Value) -> flagkit_engine::Result<ProjectConfig> {
    ProjectConfig::from_json(&value.to_string())
}

#[test]
fn test_fixture_loads() {
    let config = load(&project()).unwrap();

    assert_eq!(config.revision(), 5);
    assert_eq!(config.account_id(), "acc_1001");
    assert_eq!(config.project_id(), "proj_2002");
    assert_eq!(config.flags().len(), 5);

    let checkout = config.flag("checkout_redesign").unwrap();
    let rules: Vec<&str> = config.rules_for(checkout).map(|r| r.key.as_str()).collect();
    assert_eq!(rules, vec!["pricing_test", "premium_users", "everyone_else"]);

    let pricing = config.experiment("exp_pricing").unwrap();
    assert_eq!(pricing.status, ExperimentStatus::Paused);
    assert!(!pricing.is_running());

    let left = config.experiment("exp_left").unwrap();
    assert_eq!(left.group_id.as_deref(), Some("grp_layout"));
    assert_eq!(config.group("grp_layout").unwrap().experiment_ids.len(), 2);

    let search = config.flag("new_search").unwrap();
    assert_eq!(search.variables[1].variable_type, VariableType::Json);
}

#[test]
fn test_legacy_audience_string_is_decoded() {
    let config = load(&project()).unwrap();
    let audience = config.audience("aud_mobile").unwrap();
    assert_eq!(audience.name, "modern mobile app");
}

#[test]
fn test_typed_audience_replaces_legacy_one() {
    let mut value = project();
    value["audiences"]
        .as_array_mut()
        .unwrap()
        .push(json!({"id": "aud_premium", "name": "legacy premium", "conditions": "[\"or\"]"}));

    let config = load(&value).unwrap();
    assert_eq!(config.audience("aud_premium").unwrap().name, "premium plan");
}

#[test]
fn test_invalid_json() {
    let error = ProjectConfig::from_json("not json").unwrap_err();
    assert_eq!(error.code, ErrorCode::ConfigInvalidJson);

    let error = ProjectConfig::from_json(r#"{"featureFlags": []}"#).unwrap_err();
    assert_eq!(error.code, ErrorCode::ConfigInvalidJson);
}

#[test]
fn test_invalid_revision() {
    for revision in [json!("abc"), json!("-3"), json!("")] {
        let mut value = project();
        value["revision"] = revision;
        assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigInvalidRevision);
    }

    let mut value = project();
    value["revision"] = json!(12);
    assert_eq!(load(&value).unwrap().revision(), 12);
}

#[test]
fn test_flag_references_unknown_experiment() {
    let mut value = project();
    value["featureFlags"][0]["experimentIds"] = json!(["exp_missing"]);

    let error = load(&value).unwrap_err();
    assert_eq!(error.code, ErrorCode::ConfigMissingReference);
    assert!(error.message.contains("exp_missing"));
    assert!(error.message.contains("buy_button"));
}

#[test]
fn test_flag_references_unknown_rollout() {
    let mut value = project();
    value["featureFlags"][0]["rolloutId"] = json!("roll_missing");
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigMissingReference);
}

#[test]
fn test_rule_references_unknown_audience() {
    let mut value = project();
    value["rollouts"][0]["experiments"][0]["audienceIds"] = json!(["aud_missing"]);
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigMissingReference);

    let mut value = project();
    value["experiments"][1]["audienceConditions"] = json!(["or", "aud_adult", ["not", "aud_gone"]]);
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigMissingReference);
}

#[test]
fn test_traffic_allocation_references_unknown_variation() {
    let mut value = project();
    value["experiments"][0]["trafficAllocation"][1]["entityId"] = json!("var_ghost");
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigMissingReference);
}

#[test]
fn test_group_allocation_references_unknown_experiment() {
    let mut value = project();
    value["groups"][0]["trafficAllocation"][0]["entityId"] = json!("exp_elsewhere");
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigMissingReference);
}

#[test]
fn test_traffic_allocation_must_ascend_within_range() {
    let mut value = project();
    value["experiments"][0]["trafficAllocation"] = json!([
        {"entityId": "var_control", "endOfRange": 6000},
        {"entityId": "var_treatment", "endOfRange": 4000}
    ]);
    assert_eq!(
        load(&value).unwrap_err().code,
        ErrorCode::ConfigInvalidTrafficAllocation
    );

    let mut value = project();
    value["experiments"][0]["trafficAllocation"][1]["endOfRange"] = json!(10001);
    assert_eq!(
        load(&value).unwrap_err().code,
        ErrorCode::ConfigInvalidTrafficAllocation
    );
}

#[test]
fn test_duplicate_keys() {
    let mut value = project();
    let duplicate = value["featureFlags"][0].clone();
    value["featureFlags"].as_array_mut().unwrap().push(duplicate);
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigDuplicateKey);

    let mut value = project();
    let duplicate = value["experiments"][0].clone();
    value["experiments"].as_array_mut().unwrap().push(duplicate);
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigDuplicateKey);
}

#[test]
fn test_invalid_variables() {
    let mut value = project();
    value["featureFlags"][3]["variables"][0]["defaultValue"] = json!("ten");
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigInvalidVariable);

    let mut value = project();
    value["featureFlags"][3]["variables"][0]["type"] = json!("matrix");
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigInvalidVariable);

    // Override value must parse as the declared type.
    let mut value = project();
    value["rollouts"][1]["experiments"][0]["variations"][0]["variables"][0]["value"] = json!("lots");
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigInvalidVariable);

    // Override must target a variable the flag declares.
    let mut value = project();
    value["rollouts"][1]["experiments"][0]["variations"][0]["variables"][0]["id"] = json!("v_unknown");
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigMissingReference);
}

#[test]
fn test_malformed_audience() {
    let mut value = project();
    value["audiences"][0]["conditions"] = json!("[\"and\", {");
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigInvalidAudience);

    let mut value = project();
    value["typedAudiences"][0]["conditions"] = json!(["not"]);
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigInvalidAudience);
}

#[test]
fn test_event_references_unknown_experiment() {
    let mut value = project();
    value["events"][0]["experimentIds"] = json!(["exp_missing"]);
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigMissingReference);
}

#[test]
fn test_forced_variation_must_exist() {
    let mut value = project();
    value["experiments"][0]["forcedVariations"] = json!({"qa_tester": "purple"});
    assert_eq!(load(&value).unwrap_err().code, ErrorCode::ConfigMissingReference);
}
