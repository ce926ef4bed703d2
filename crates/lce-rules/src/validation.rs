//! # Structural Rule Validation
//!
//! Checks that need nothing but the rule itself. Cross-reference checks
//! (dependencies exist, conflicting rules inactive, no cycles) need the
//! store and live in [`crate::engine::RuleEngine::validate_rule`].
//!
//! Enumerated fields (status, priority, execution mode) are typed, so their
//! membership is enforced when a record is decoded; see
//! [`crate::rule::ComplianceRule::from_json`].

use lce_core::{validate_identifier, LceError, LceResult};

use crate::rule::ComplianceRule;

/// Validate a rule version before it is written.
///
/// Collects every problem and reports them together.
pub fn validate_structure(rule: &ComplianceRule) -> LceResult<()> {
    let mut problems: Vec<String> = Vec::new();
    let mut check = |result: LceResult<()>| {
        if let Err(e) = result {
            problems.push(match e {
                LceError::Validation(msg) => msg,
                other => other.to_string(),
            });
        }
    };

    check(validate_identifier("rule_id", &rule.rule_id));
    check(validate_identifier("applies_to_domain", &rule.applies_to_domain));
    check(validate_identifier(
        "applies_to_entity_type",
        &rule.applies_to_entity_type,
    ));
    check(required("name", &rule.name));
    check(required("description", &rule.description));
    check(required("created_by", &rule.created_by));
    if rule.version == 0 {
        check(Err(LceError::validation("version must be at least 1")));
    }
    if rule.logic.is_null() {
        check(Err(LceError::validation("logic is required")));
    }

    for event in &rule.trigger_events {
        check(validate_identifier("trigger event", event));
    }
    for (label, set) in [
        ("dependency", &rule.dependencies),
        ("conflicts_with entry", &rule.conflicts_with),
        ("supersedes entry", &rule.supersedes),
    ] {
        for id in set {
            check(validate_identifier(label, id));
        }
    }

    if rule.dependencies.contains(&rule.rule_id) {
        check(Err(LceError::validation(format!(
            "rule {} depends on itself",
            rule.rule_id
        ))));
    }
    if rule.supersedes.contains(&rule.rule_id) {
        check(Err(LceError::validation(format!(
            "rule {} supersedes itself",
            rule.rule_id
        ))));
    }
    if rule.conflicts_with.contains(&rule.rule_id) {
        check(Err(LceError::validation(format!(
            "rule {} conflicts with itself",
            rule.rule_id
        ))));
    }
    for id in rule.dependencies.intersection(&rule.conflicts_with) {
        check(Err(LceError::validation(format!(
            "rule {} both depends on and conflicts with {id}",
            rule.rule_id
        ))));
    }

    if let (Some(eff), Some(exp)) = (rule.effective_date, rule.expiration_date) {
        if exp < eff {
            check(Err(LceError::validation(format!(
                "expiration_date {exp} precedes effective_date {eff}"
            ))));
        }
    }

    for (i, case) in rule.test_cases.iter().enumerate() {
        if case.name.trim().is_empty() {
            check(Err(LceError::validation(format!("test case #{i} has no name"))));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(LceError::Validation(format!(
            "rule {}: {}",
            rule.rule_id,
            problems.join("; ")
        )))
    }
}

fn required(field: &str, value: &str) -> LceResult<()> {
    if value.trim().is_empty() {
        Err(LceError::validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}
