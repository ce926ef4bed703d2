//! # Rule Packs
//!
//! Policy as data. A rule pack is a YAML document listing rule drafts; it
//! is checked offline with [`RulePack::validate`] and installed through the
//! approval workflow with [`RulePack::seed`], so seeded rules carry the same
//! history, test results and events as hand-approved ones.
//!
//! [`RulePack::standard`] ships the loan amount-threshold and customer KYC
//! rules every deployment starts with.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use lce_core::{LceError, LceResult, Outcome, TxContext};

use crate::approval::ApprovalWorkflow;
use crate::graph::DependencyGraph;
use crate::logic::RuleLogic;
use crate::rule::{ComplianceRule, RuleDraft};
use crate::validation::validate_structure;

const STANDARD_PACK: &str = include_str!("../rulepacks/standard.yaml");

/// A named set of rule drafts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePack {
    /// Pack name, recorded in submission justifications.
    #[serde(default)]
    pub name: String,
    /// Rules in the pack.
    pub rules: Vec<RuleDraft>,
}

impl RulePack {
    /// Parse a pack from YAML.
    pub fn from_yaml(text: &str) -> LceResult<Self> {
        serde_yaml::from_str(text).map_err(|e| LceError::validation(format!("invalid rule pack: {e}")))
    }

    /// The built-in standard pack.
    pub fn standard() -> LceResult<Self> {
        Self::from_yaml(STANDARD_PACK)
    }

    /// Check every draft in isolation and return the pack's installation
    /// order (dependencies first).
    ///
    /// Dependencies on rules outside the pack are left to the store-backed
    /// checks made at submission.
    pub fn validate(&self, ctx: &TxContext) -> LceResult<Vec<String>> {
        let mut seen = BTreeSet::new();
        let mut graph = DependencyGraph::new();
        for draft in &self.rules {
            if !seen.insert(draft.rule_id.clone()) {
                return Err(LceError::validation(format!(
                    "rule pack {} lists rule {} twice",
                    self.name, draft.rule_id
                )));
            }
            let rule = ComplianceRule::from_draft(draft.clone(), 1, ctx)?;
            validate_structure(&rule)?;
            RuleLogic::parse(&rule.rule_id, &rule.logic)?;
            if rule.test_cases.is_empty() {
                return Err(LceError::validation(format!(
                    "rule {} has no test case; at least one test case is required",
                    rule.rule_id
                )));
            }
            graph.insert(rule.rule_id, rule.dependencies);
        }
        graph.execution_order(&seen)
    }

    /// Install every rule: create, submit and approve, dependencies first.
    ///
    /// Each rule is committed as it is approved, so a failure part-way
    /// leaves the earlier rules installed.
    pub fn seed(
        &self,
        workflow: &ApprovalWorkflow,
        ctx: &TxContext,
    ) -> LceResult<Outcome<Vec<ComplianceRule>>> {
        let order = self.validate(ctx)?;
        let mut events = Vec::new();
        let mut installed = Vec::with_capacity(order.len());
        for rule_id in order {
            let Some(draft) = self.rules.iter().find(|d| d.rule_id == rule_id) else {
                continue;
            };
            workflow
                .create_rule(draft.clone(), ctx)?
                .drain_into(&mut events);
            let request = workflow
                .submit_for_approval(&rule_id, &format!("seeded from rule pack {}", self.name), ctx)?
                .drain_into(&mut events);
            let rule = workflow
                .approve(&request.request_id, "seeded", ctx)?
                .drain_into(&mut events);
            installed.push(rule);
        }
        tracing::info!(pack = %self.name, rules = installed.len(), "rule pack seeded");
        Ok(Outcome::new(installed, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleStatus;
    use chrono::{TimeZone, Utc};
    use lce_core::{EntityData, MemoryStateStore};

    fn ctx() -> TxContext {
        TxContext::new("tx-seed", Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(), "seeder")
    }

    #[test]
    fn standard_pack_parses_and_orders_dependencies_first() {
        let pack = RulePack::standard().unwrap();
        assert_eq!(pack.name, "standard");
        let order = pack.validate(&ctx()).unwrap();
        let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
        assert!(pos("LOAN-REQUIRED-FIELDS") < pos("LOAN-AMOUNT-THRESHOLD"));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn seeding_activates_every_rule() {
        let wf = ApprovalWorkflow::new(MemoryStateStore::shared());
        let out = RulePack::standard().unwrap().seed(&wf, &ctx()).unwrap();
        assert_eq!(out.value.len(), 3);
        assert!(out.value.iter().all(|r| r.status == RuleStatus::Active));

        let loan = EntityData::new()
            .with("entity_id", "loan-1")
            .with("customer_id", "C-1")
            .with("amount", 2_000_000.0)
            .with("term_months", 12.0)
            .with("purpose", "expansion");
        let results = wf
            .engine()
            .execute_rules_for_event("LoanSubmitted", &loan, &ctx())
            .unwrap()
            .value;
        let verdicts: Vec<_> = results.iter().map(|r| (r.rule_id.as_str(), r.passed)).collect();
        assert_eq!(
            verdicts,
            vec![("LOAN-REQUIRED-FIELDS", true), ("LOAN-AMOUNT-THRESHOLD", false)]
        );
    }

    #[test]
    fn duplicate_rule_in_pack_rejected() {
        let yaml = r#"
name: dup
rules:
  - rule_id: A
    name: a
    description: a
    logic: { type: threshold, field: x, threshold: 1 }
    applies_to_domain: D
    applies_to_entity_type: E
    test_cases: [{ name: t, input: { x: 2 }, expected_passed: true }]
  - rule_id: A
    name: a
    description: a
    logic: { type: threshold, field: x, threshold: 1 }
    applies_to_domain: D
    applies_to_entity_type: E
    test_cases: [{ name: t, input: { x: 2 }, expected_passed: true }]
"#;
        let err = RulePack::from_yaml(yaml).unwrap().validate(&ctx()).unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn cyclic_pack_rejected() {
        let yaml = r#"
rules:
  - rule_id: A
    name: a
    description: a
    logic: { type: threshold, field: x, threshold: 1 }
    applies_to_domain: D
    applies_to_entity_type: E
    dependencies: [B]
    test_cases: [{ name: t, input: { x: 2 }, expected_passed: true }]
  - rule_id: B
    name: b
    description: b
    logic: { type: threshold, field: x, threshold: 1 }
    applies_to_domain: D
    applies_to_entity_type: E
    dependencies: [A]
    test_cases: [{ name: t, input: { x: 2 }, expected_passed: true }]
"#;
        let err = RulePack::from_yaml(yaml).unwrap().validate(&ctx()).unwrap_err();
        assert!(matches!(err, LceError::CircularDependency { .. }));
    }

    #[test]
    fn malformed_yaml_is_a_validation_error() {
        assert!(matches!(
            RulePack::from_yaml("rules: [ {"),
            Err(LceError::Validation(_))
        ));
    }
}
