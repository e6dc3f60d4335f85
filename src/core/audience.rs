//! Three-valued evaluation of audience targeting trees.
//!
//! Every node yields `Some(true)`, `Some(false)` or `None` (unknown). Unknown arises
//! from missing attributes, type mismatches and unsupported operators; it only turns
//! into `false` at the top of a tree.

use serde_json::Value;
use std::cmp::Ordering;

use crate::config::{Condition, Expression, MatchType, ProjectConfig, CUSTOM_ATTRIBUTE_CONDITION};
use crate::types::{AttributeValue, Attributes};
use crate::utils::compare_versions;

/// Walks `expression`, resolving leaves through `leaf`.
pub fn evaluate_tree<T, F>(expression: &Expression<T>, leaf: &mut F) -> Option<bool>
where
    F: FnMut(&T) -> Option<bool>,
{
    match expression {
        Expression::And(children) => {
            let mut unknown = false;
            for child in children {
                match evaluate_tree(child, leaf) {
                    Some(false) => return Some(false),
                    None => unknown = true,
                    Some(true) => {}
                }
            }
            if unknown {
                None
            } else {
                Some(true)
            }
        }
        Expression::Or(children) => {
            let mut unknown = false;
            for child in children {
                match evaluate_tree(child, leaf) {
                    Some(true) => return Some(true),
                    None => unknown = true,
                    Some(false) => {}
                }
            }
            if unknown {
                None
            } else {
                Some(false)
            }
        }
        Expression::Not(child) => evaluate_tree(child, leaf).map(|v| !v),
        Expression::Leaf(value) => leaf(value),
    }
}

/// Evaluates a condition tree against user attributes; unknown counts as no match.
pub fn evaluate(expression: &Expression<Condition>, attributes: &Attributes) -> bool {
    evaluate_tree(expression, &mut |c: &Condition| evaluate_condition(c, attributes))
        .unwrap_or(false)
}

/// Evaluates an experiment's audience expression over audience ids.
///
/// An expression with no audiences at all targets everyone. An id that the
/// configuration does not know evaluates unknown.
pub fn audiences_match(
    config: &ProjectConfig,
    expression: &Expression<String>,
    attributes: &Attributes,
) -> bool {
    if expression.is_empty() {
        return true;
    }

    evaluate_tree(expression, &mut |audience_id: &String| {
        let audience = config.audience(audience_id)?;
        let result = evaluate_tree(&audience.conditions, &mut |c: &Condition| {
            evaluate_condition(c, attributes)
        });
        tracing::trace!(audience = %audience.name, ?result, "Audience evaluated");
        result
    })
    .unwrap_or(false)
}

/// Evaluates a single leaf condition.
pub fn evaluate_condition(condition: &Condition, attributes: &Attributes) -> Option<bool> {
    if condition.condition_type != CUSTOM_ATTRIBUTE_CONDITION {
        tracing::trace!(
            condition_type = %condition.condition_type,
            "Unsupported audience condition type"
        );
        return None;
    }

    let attribute = attributes.get(&condition.name).filter(|v| !v.is_null());

    if condition.match_type == MatchType::Exists {
        return Some(attribute.is_some());
    }

    let attribute = attribute?;

    match &condition.match_type {
        MatchType::Exact => exact_match(&condition.value, attribute),
        MatchType::Substring => {
            let target = condition.value.as_str()?;
            Some(attribute.as_str()?.contains(target))
        }
        MatchType::GreaterThan => compare_numbers(&condition.value, attribute).map(Ordering::is_gt),
        MatchType::GreaterThanOrEqual => {
            compare_numbers(&condition.value, attribute).map(Ordering::is_ge)
        }
        MatchType::LessThan => compare_numbers(&condition.value, attribute).map(Ordering::is_lt),
        MatchType::LessThanOrEqual => {
            compare_numbers(&condition.value, attribute).map(Ordering::is_le)
        }
        MatchType::SemverEqual => compare_semver(&condition.value, attribute).map(Ordering::is_eq),
        MatchType::SemverGreaterThan => {
            compare_semver(&condition.value, attribute).map(Ordering::is_gt)
        }
        MatchType::SemverGreaterThanOrEqual => {
            compare_semver(&condition.value, attribute).map(Ordering::is_ge)
        }
        MatchType::SemverLessThan => compare_semver(&condition.value, attribute).map(Ordering::is_lt),
        MatchType::SemverLessThanOrEqual => {
            compare_semver(&condition.value, attribute).map(Ordering::is_le)
        }
        MatchType::Unknown(name) => {
            tracing::trace!(match_type = %name, attribute = %condition.name, "Unknown match type");
            None
        }
        MatchType::Exists => Some(true),
    }
}

fn exact_match(target: &Value, attribute: &AttributeValue) -> Option<bool> {
    match (target, attribute) {
        (Value::String(expected), AttributeValue::String(actual)) => Some(expected == actual),
        (Value::Bool(expected), AttributeValue::Bool(actual)) => Some(expected == actual),
        (Value::Number(expected), AttributeValue::Number(_)) => {
            let expected = expected.as_f64().filter(|n| n.is_finite())?;
            Some(attribute.as_number()? == expected)
        }
        _ => None,
    }
}

/// Ordering of the attribute relative to the condition literal.
fn compare_numbers(target: &Value, attribute: &AttributeValue) -> Option<Ordering> {
    let target = target.as_f64().filter(|n| n.is_finite())?;
    attribute.as_number()?.partial_cmp(&target)
}

fn compare_semver(target: &Value, attribute: &AttributeValue) -> Option<Ordering> {
    compare_versions(attribute.as_str()?, target.as_str()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    fn attrs(pairs: &[(&str, AttributeValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn condition(name: &str, match_type: MatchType, value: Value) -> Condition {
        Condition::new(name, match_type, value)
    }

    fn leaf(value: Option<bool>) -> Expression<Option<bool>> {
        Expression::Leaf(value)
    }

    fn eval(expression: &Expression<Option<bool>>) -> Option<bool> {
        evaluate_tree(expression, &mut |v: &Option<bool>| *v)
    }

    #[test]
    fn test_and_truth_table() {
        assert_eq!(eval(&Expression::And(vec![leaf(Some(true)), leaf(Some(true))])), Some(true));
        assert_eq!(eval(&Expression::And(vec![leaf(Some(true)), leaf(None)])), None);
        assert_eq!(eval(&Expression::And(vec![leaf(None), leaf(Some(false))])), Some(false));
        assert_eq!(eval(&Expression::And(vec![])), Some(true));
    }

    #[test]
    fn test_or_truth_table() {
        assert_eq!(eval(&Expression::Or(vec![leaf(Some(false)), leaf(Some(false))])), Some(false));
        assert_eq!(eval(&Expression::Or(vec![leaf(Some(false)), leaf(None)])), None);
        assert_eq!(eval(&Expression::Or(vec![leaf(None), leaf(Some(true))])), Some(true));
        assert_eq!(eval(&Expression::Or(vec![])), Some(false));
    }

    #[test]
    fn test_not_keeps_unknown() {
        assert_eq!(eval(&Expression::Not(Box::new(leaf(Some(true))))), Some(false));
        assert_eq!(eval(&Expression::Not(Box::new(leaf(Some(false))))), Some(true));
        assert_eq!(eval(&Expression::Not(Box::new(leaf(None)))), None);
    }

    #[test]
    fn test_top_level_unknown_is_false() {
        let expression = Expression::Leaf(condition("missing", MatchType::Exact, json!("x")));
        assert!(!evaluate(&expression, &Attributes::new()));

        let negated = Expression::Not(Box::new(expression));
        assert!(!evaluate(&negated, &Attributes::new()));
    }

    #[test]
    fn test_exact_match() {
        let attributes = attrs(&[
            ("plan", "premium".into()),
            ("age", AttributeValue::Number(31.0)),
            ("beta", true.into()),
        ]);

        let check = |name: &str, value: Value| {
            evaluate_condition(&condition(name, MatchType::Exact, value), &attributes)
        };
        assert_eq!(check("plan", json!("premium")), Some(true));
        assert_eq!(check("plan", json!("basic")), Some(false));
        assert_eq!(check("age", json!(31)), Some(true));
        assert_eq!(check("age", json!(31.0)), Some(true));
        assert_eq!(check("beta", json!(false)), Some(false));
        assert_eq!(check("plan", json!(5)), None);
        assert_eq!(check("missing", json!("premium")), None);
    }

    #[test]
    fn test_null_attribute_is_missing() {
        let attributes = attrs(&[("plan", AttributeValue::Null)]);
        assert_eq!(
            evaluate_condition(&condition("plan", MatchType::Exact, json!("x")), &attributes),
            None
        );
        assert_eq!(
            evaluate_condition(&condition("plan", MatchType::Exists, Value::Null), &attributes),
            Some(false)
        );
    }

    #[test]
    fn test_exists() {
        let attributes = attrs(&[("plan", "basic".into())]);
        assert_eq!(
            evaluate_condition(&condition("plan", MatchType::Exists, Value::Null), &attributes),
            Some(true)
        );
        assert_eq!(
            evaluate_condition(&condition("other", MatchType::Exists, Value::Null), &attributes),
            Some(false)
        );
    }

    #[test]
    fn test_substring() {
        let attributes = attrs(&[("email", "jane@example.com".into()), ("age", AttributeValue::Number(4.0))]);
        assert_eq!(
            evaluate_condition(&condition("email", MatchType::Substring, json!("@example")), &attributes),
            Some(true)
        );
        assert_eq!(
            evaluate_condition(&condition("age", MatchType::Substring, json!("4")), &attributes),
            None
        );
    }

    #[test]
    fn test_numeric_comparisons() {
        let attributes = attrs(&[("age", AttributeValue::Number(30.0)), ("name", "x".into())]);
        let check = |match_type: MatchType, value: Value| {
            evaluate_condition(&condition("age", match_type, value), &attributes)
        };
        assert_eq!(check(MatchType::GreaterThan, json!(18)), Some(true));
        assert_eq!(check(MatchType::GreaterThan, json!(30)), Some(false));
        assert_eq!(check(MatchType::GreaterThanOrEqual, json!(30)), Some(true));
        assert_eq!(check(MatchType::LessThan, json!(30.5)), Some(true));
        assert_eq!(check(MatchType::LessThanOrEqual, json!(29)), Some(false));
        assert_eq!(check(MatchType::LessThan, json!("30")), None);

        assert_eq!(
            evaluate_condition(&condition("name", MatchType::GreaterThan, json!(1)), &attributes),
            None
        );
    }

    #[test]
    fn test_semver_conditions() {
        let attributes = attrs(&[("app_version", "2.1.4".into())]);
        let check = |match_type: MatchType, value: &str| {
            evaluate_condition(&condition("app_version", match_type, json!(value)), &attributes)
        };
        assert_eq!(check(MatchType::SemverEqual, "2.1"), Some(true));
        assert_eq!(check(MatchType::SemverEqual, "2.1.3"), Some(false));
        assert_eq!(check(MatchType::SemverGreaterThan, "2.0"), Some(true));
        assert_eq!(check(MatchType::SemverGreaterThanOrEqual, "2.1"), Some(true));
        assert_eq!(check(MatchType::SemverLessThan, "2.1.5"), Some(true));
        assert_eq!(check(MatchType::SemverLessThanOrEqual, "2.0.9"), Some(false));
        assert_eq!(check(MatchType::SemverEqual, "not-a-version"), None);
    }

    #[test]
    fn test_unknown_match_and_condition_type() {
        let attributes = attrs(&[("plan", "basic".into())]);
        assert_eq!(
            evaluate_condition(
                &condition("plan", MatchType::Unknown("regex".into()), json!(".*")),
                &attributes
            ),
            None
        );

        let mut foreign = condition("plan", MatchType::Exact, json!("basic"));
        foreign.condition_type = "third_party_dimension".to_string();
        assert_eq!(evaluate_condition(&foreign, &attributes), None);
    }

    /// Counts WARN events seen while installed as the thread's default subscriber.
    struct WarnCounter(Arc<AtomicUsize>);

    impl tracing::Subscriber for WarnCounter {
        fn enabled(&self, _metadata: &tracing::Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _span: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }

        fn record(&self, _span: &tracing::span::Id, _values: &tracing::span::Record<'_>) {}

        fn record_follows_from(&self, _span: &tracing::span::Id, _follows: &tracing::span::Id) {}

        fn event(&self, event: &tracing::Event<'_>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, AtomicOrdering::SeqCst);
            }
        }

        fn enter(&self, _span: &tracing::span::Id) {}

        fn exit(&self, _span: &tracing::span::Id) {}
    }

    #[test]
    fn test_unsupported_conditions_warn_at_load_only() {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = WarnCounter(Arc::clone(&warnings));

        tracing::subscriber::with_default(subscriber, || {
            let unknown_match =
                Condition::from_value(&json!({"name": "plan", "match": "regex", "value": ".*"}))
                    .unwrap();
            let foreign_type = Condition::from_value(
                &json!({"name": "segment", "type": "third_party_dimension", "value": "x"}),
            )
            .unwrap();
            assert_eq!(warnings.load(AtomicOrdering::SeqCst), 2);

            let attributes = attrs(&[("plan", "basic".into()), ("segment", "x".into())]);
            for _ in 0..100 {
                assert_eq!(evaluate_condition(&unknown_match, &attributes), None);
                assert_eq!(evaluate_condition(&foreign_type, &attributes), None);
            }
            assert_eq!(warnings.load(AtomicOrdering::SeqCst), 2);
        });
    }
}
