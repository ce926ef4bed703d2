//! # Rule Engine
//!
//! Executes one rule, or every applicable rule for an entity type or a
//! business event, in dependency order.
//!
//! ## Execution
//!
//! A rule is evaluated only if it is executable at the caller's logical
//! time and every rule it transitively depends on passes first. Within one
//! call, results are memoised: a prerequisite shared by several rules is
//! evaluated once and its result reused.
//!
//! ## Batches
//!
//! [`RuleEngine::execute_rules_for_entity`] and
//! [`RuleEngine::execute_rules_for_event`] order the executable candidates
//! with Kahn's algorithm and run them in turn. A rule that fails (missing
//! dependency, failed prerequisite, malformed logic) yields a result with
//! `success = false` and the error text; the batch continues. A dependency
//! cycle aborts the batch.
//!
//! ## Determinism
//!
//! Execution IDs and timestamps come from the [`TxContext`].
//! `execution_time_ms` is a logical cost (fields inspected, minimum 1), so
//! replaying a call reproduces identical results.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use lce_core::{
    validate_identifier, ComplianceEvent, EntityData, EventType, LceError, LceResult, Outcome,
    Severity, TxContext,
};

use crate::graph::DependencyGraph;
use crate::logic::RuleLogic;
use crate::rule::{ComplianceRule, ValidationResult};
use crate::store::RuleStore;
use crate::validation::validate_structure;

/// Entity data fields consulted, in order, for the affected entity's ID.
pub const ENTITY_ID_FIELDS: [&str; 2] = ["entity_id", "id"];

/// Outcome of one rule evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleExecutionResult {
    /// Rule evaluated.
    pub rule_id: String,
    /// Version evaluated.
    pub rule_version: u32,
    /// Unique per evaluation.
    pub execution_id: String,
    /// Whether the evaluator ran without an internal error.
    pub success: bool,
    /// Business verdict.
    pub passed: bool,
    /// Evaluator-specific score.
    pub score: Option<f64>,
    /// Evaluator-specific details.
    pub details: serde_json::Value,
    /// Error text when `success` is false.
    pub error: Option<String>,
    /// Logical execution cost, at least 1.
    pub execution_time_ms: u64,
    /// Logical time of the evaluation.
    pub executed_at: DateTime<Utc>,
}

/// Per-call state: memoised results and the events produced so far.
struct Run<'c> {
    ctx: &'c TxContext,
    entity_id: String,
    results: BTreeMap<String, RuleExecutionResult>,
    events: Vec<ComplianceEvent>,
}

impl<'c> Run<'c> {
    fn new(ctx: &'c TxContext, data: &EntityData) -> LceResult<Self> {
        Ok(Self {
            ctx,
            entity_id: affected_entity_id(data)?,
            results: BTreeMap::new(),
            events: Vec::new(),
        })
    }
}

/// Executes rules held in a [`RuleStore`].
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: RuleStore,
}

impl RuleEngine {
    /// Create an engine over a rule store.
    pub fn new(rules: RuleStore) -> Self {
        Self { rules }
    }

    /// The underlying rule store.
    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    // -- Execution -----------------------------------------------------------

    /// Execute the latest version of one rule, after its dependencies.
    pub fn execute_rule(
        &self,
        rule_id: &str,
        data: &EntityData,
        ctx: &TxContext,
    ) -> LceResult<Outcome<RuleExecutionResult>> {
        let mut run = Run::new(ctx, data)?;
        let result = self.execute_in(rule_id, data, &mut run)?;
        Ok(Outcome::new(result, run.events))
    }

    /// Execute every executable rule that applies to `entity_type`.
    pub fn execute_rules_for_entity(
        &self,
        entity_type: &str,
        data: &EntityData,
        ctx: &TxContext,
    ) -> LceResult<Outcome<Vec<RuleExecutionResult>>> {
        let candidates = self.rules.list_by_entity_type(entity_type)?;
        self.execute_batch(candidates, data, ctx)
    }

    /// Execute every executable rule triggered by `event`.
    pub fn execute_rules_for_event(
        &self,
        event: &str,
        data: &EntityData,
        ctx: &TxContext,
    ) -> LceResult<Outcome<Vec<RuleExecutionResult>>> {
        let candidates = self.rules.list_by_event(event)?;
        self.execute_batch(candidates, data, ctx)
    }

    fn execute_batch(
        &self,
        candidates: Vec<ComplianceRule>,
        data: &EntityData,
        ctx: &TxContext,
    ) -> LceResult<Outcome<Vec<RuleExecutionResult>>> {
        let mut run = Run::new(ctx, data)?;
        let now = ctx.now();
        let executable: BTreeMap<String, ComplianceRule> = candidates
            .into_iter()
            .filter(|r| r.is_executable(now))
            .map(|r| (r.rule_id.clone(), r))
            .collect();

        let mut graph = DependencyGraph::new();
        for rule in executable.values() {
            graph.insert(rule.rule_id.clone(), rule.dependencies.clone());
        }
        let ids: BTreeSet<String> = executable.keys().cloned().collect();
        let order = graph.execution_order(&ids)?;

        let mut results = Vec::with_capacity(order.len());
        for rule_id in order {
            match self.execute_in(&rule_id, data, &mut run) {
                Ok(result) => results.push(result),
                Err(e @ LceError::CircularDependency { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(rule_id = %rule_id, error = %e, "rule failed in batch");
                    let version = executable.get(&rule_id).map(|r| r.version).unwrap_or(0);
                    results.push(failed_result(&rule_id, version, &e, ctx));
                }
            }
        }
        Ok(Outcome::new(results, run.events))
    }

    fn execute_in(
        &self,
        rule_id: &str,
        data: &EntityData,
        run: &mut Run<'_>,
    ) -> LceResult<RuleExecutionResult> {
        if let Some(done) = run.results.get(rule_id) {
            return Ok(done.clone());
        }
        let now = run.ctx.now();
        let rule = self.rules.get_latest(rule_id)?;
        rule.ensure_executable(now)?;

        let order = self.resolve_dependencies(rule_id)?;
        for dep_id in order.iter().filter(|id| id.as_str() != rule_id) {
            let blocked = |reason: String| LceError::DependencyFailed {
                rule_id: rule_id.to_string(),
                dependency_id: dep_id.clone(),
                reason,
            };
            let cached = run.results.get(dep_id).cloned();
            let dep_result = match cached {
                Some(r) => r,
                None => {
                    let dep = self.rules.get_latest(dep_id)?;
                    dep.ensure_executable(now).map_err(|e| blocked(e.to_string()))?;
                    self.evaluate(&dep, data, run)
                        .map_err(|e| blocked(e.to_string()))?
                }
            };
            if !dep_result.success {
                let reason = dep_result.error.unwrap_or_else(|| "evaluation failed".to_string());
                return Err(blocked(reason));
            }
            if !dep_result.passed {
                return Err(blocked("did not pass".to_string()));
            }
        }

        self.evaluate(&rule, data, run)
    }

    fn evaluate(
        &self,
        rule: &ComplianceRule,
        data: &EntityData,
        run: &mut Run<'_>,
    ) -> LceResult<RuleExecutionResult> {
        let logic = RuleLogic::parse(&rule.rule_id, &rule.logic)?;
        let evaluation = logic.evaluate(data);
        let ctx = run.ctx;
        let result = RuleExecutionResult {
            rule_id: rule.rule_id.clone(),
            rule_version: rule.version,
            execution_id: ctx.next_id("exec"),
            success: true,
            passed: evaluation.passed,
            score: evaluation.score,
            details: evaluation.details,
            error: None,
            execution_time_ms: evaluation.fields_inspected.max(1),
            executed_at: ctx.now(),
        };
        tracing::debug!(
            rule_id = %rule.rule_id,
            version = rule.version,
            logic = logic.kind(),
            passed = result.passed,
            "rule evaluated"
        );

        let entity_id = run.entity_id.clone();
        let payload = serde_json::to_value(&result)?;
        let verdict = if result.passed { "passed" } else { "failed" };
        run.events.push(
            ComplianceEvent::new(
                ctx,
                EventType::RuleExecuted,
                entity_id.clone(),
                rule.applies_to_entity_type.clone(),
                Severity::Low,
                format!("rule {} v{} {verdict}", rule.rule_id, rule.version),
            )
            .with_rule(rule.rule_id.clone(), rule.version)
            .with_details(payload.clone()),
        );
        if !result.passed {
            run.events.push(
                ComplianceEvent::new(
                    ctx,
                    EventType::RuleViolationDetected,
                    entity_id.clone(),
                    rule.applies_to_entity_type.clone(),
                    Severity::from(rule.priority),
                    format!("{entity_id} violates rule {} ({})", rule.rule_id, rule.name),
                )
                .with_rule(rule.rule_id.clone(), rule.version)
                .with_details(payload),
            );
        }

        run.results.insert(rule.rule_id.clone(), result.clone());
        Ok(result)
    }

    // -- Dependency analysis -------------------------------------------------

    /// Transitive dependencies of a rule, dependencies first, ending with
    /// the rule itself.
    pub fn resolve_dependencies(&self, rule_id: &str) -> LceResult<Vec<String>> {
        let mut graph = DependencyGraph::new();
        self.load_closure([rule_id.to_string()], &mut graph)?;
        graph.resolve(rule_id)
    }

    /// Order a set of rules so that each follows its in-set dependencies.
    pub fn get_execution_order(&self, rule_ids: &[String]) -> LceResult<Vec<String>> {
        let mut graph = DependencyGraph::new();
        for id in rule_ids {
            let rule = self.rules.get_latest(id)?;
            graph.insert(rule.rule_id, rule.dependencies);
        }
        let ids: BTreeSet<String> = rule_ids.iter().cloned().collect();
        graph.execution_order(&ids)
    }

    /// Load latest versions reachable from `roots` into `graph`, skipping
    /// rules already present.
    fn load_closure(
        &self,
        roots: impl IntoIterator<Item = String>,
        graph: &mut DependencyGraph,
    ) -> LceResult<()> {
        let mut pending: Vec<String> = roots.into_iter().collect();
        while let Some(id) = pending.pop() {
            if graph.contains(&id) {
                continue;
            }
            let rule = self.rules.get_latest(&id)?;
            pending.extend(rule.dependencies.iter().cloned());
            graph.insert(rule.rule_id, rule.dependencies);
        }
        Ok(())
    }

    // -- Validation ----------------------------------------------------------

    /// Structural, logic and cross-reference validation of a candidate rule.
    ///
    /// Cross-references: every dependency and superseded rule exists, no
    /// rule in
    /// `conflicts_with` is active at `ctx` time, and the rule's dependencies
    /// do not lead back to it.
    pub fn validate_rule(&self, rule: &ComplianceRule, ctx: &TxContext) -> LceResult<()> {
        validate_structure(rule)?;
        RuleLogic::parse(&rule.rule_id, &rule.logic)?;

        let mut missing = Vec::new();
        for dep in &rule.dependencies {
            if !self.rules.exists(dep)? {
                missing.push(dep.as_str());
            }
        }
        if !missing.is_empty() {
            return Err(LceError::validation(format!(
                "rule {}: dependencies do not exist: {}",
                rule.rule_id,
                missing.join(", ")
            )));
        }

        let mut unknown = Vec::new();
        for old_id in &rule.supersedes {
            if !self.rules.exists(old_id)? {
                unknown.push(old_id.as_str());
            }
        }
        if !unknown.is_empty() {
            return Err(LceError::validation(format!(
                "rule {}: superseded rules do not exist: {}",
                rule.rule_id,
                unknown.join(", ")
            )));
        }

        for other in &rule.conflicts_with {
            match self.rules.get_latest(other) {
                Ok(o) if o.is_active(ctx.now()) => {
                    return Err(LceError::validation(format!(
                        "rule {} conflicts with active rule {other}",
                        rule.rule_id
                    )))
                }
                Ok(_) | Err(LceError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let mut graph = DependencyGraph::new();
        graph.insert(rule.rule_id.clone(), rule.dependencies.clone());
        self.load_closure(rule.dependencies.iter().cloned(), &mut graph)?;
        graph.resolve(&rule.rule_id)?;
        Ok(())
    }

    /// Evaluate each of the rule's test cases and record the outcome.
    pub fn run_test_cases(
        &self,
        rule: &ComplianceRule,
        ctx: &TxContext,
    ) -> LceResult<Vec<ValidationResult>> {
        let logic = RuleLogic::parse(&rule.rule_id, &rule.logic)?;
        Ok(rule
            .test_cases
            .iter()
            .map(|case| {
                let observed = logic.evaluate(&case.input).passed;
                let passed = observed == case.expected_passed;
                ValidationResult {
                    test_case: case.name.clone(),
                    passed,
                    observed_passed: observed,
                    message: if passed {
                        "verdict matched".to_string()
                    } else {
                        format!("expected passed={}, got {observed}", case.expected_passed)
                    },
                    validated_at: ctx.now(),
                }
            })
            .collect())
    }
}

/// The affected entity's ID, taken from the entity data.
///
/// Falls back to `"unknown"` when no ID field is present. A present ID must
/// be usable as a key component, since events are indexed by it.
pub fn affected_entity_id(data: &EntityData) -> LceResult<String> {
    match ENTITY_ID_FIELDS.iter().find_map(|f| data.text_opt(f)) {
        Some(id) => {
            validate_identifier("entity_id", id)?;
            Ok(id.to_string())
        }
        None => Ok("unknown".to_string()),
    }
}

fn failed_result(
    rule_id: &str,
    version: u32,
    error: &LceError,
    ctx: &TxContext,
) -> RuleExecutionResult {
    let details = match error {
        LceError::DependencyFailed { dependency_id, .. } => json!({ "blocked_by": dependency_id }),
        _ => json!({}),
    };
    RuleExecutionResult {
        rule_id: rule_id.to_string(),
        rule_version: version,
        execution_id: ctx.next_id("exec"),
        success: false,
        passed: false,
        score: None,
        details,
        error: Some(error.to_string()),
        execution_time_ms: 1,
        executed_at: ctx.now(),
    }
}
