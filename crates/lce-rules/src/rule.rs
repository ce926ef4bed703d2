//! # Compliance Rules
//!
//! A [`ComplianceRule`] is one immutable version of a policy unit. Its
//! content (everything a [`RuleDraft`] carries) never changes after the
//! version is persisted; amendments create a new version. Lifecycle
//! metadata (status, approval stamps, stored validation results) is
//! updated by the approval workflow only.
//!
//! ## Activity
//!
//! A rule is *active* at `t` iff `status == Active` and
//! `effective_date <= t < expiration_date`. It is *executable* iff it is
//! active and every stored validation result passed. Both are evaluated
//! against the caller's logical time, never a clock.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lce_core::{ContentDigest, EntityData, LceError, LceResult, Priority, TxContext};

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Lifecycle status of a rule version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleStatus {
    /// Being authored. Not executable.
    #[default]
    Draft,
    /// Submitted and waiting for a reviewer.
    PendingApproval,
    /// Approved and in force between its effective and expiration dates.
    Active,
    /// Taken out of service; may be amended and resubmitted.
    Inactive,
    /// Superseded or soft-deleted. Terminal.
    Deprecated,
}

impl RuleStatus {
    /// All statuses.
    pub const ALL: [Self; 5] = [
        Self::Draft,
        Self::PendingApproval,
        Self::Active,
        Self::Inactive,
        Self::Deprecated,
    ];

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::PendingApproval => "PendingApproval",
            Self::Active => "Active",
            Self::Inactive => "Inactive",
            Self::Deprecated => "Deprecated",
        }
    }

    /// Whether the status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deprecated)
    }
}

impl std::fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleStatus {
    type Err = LceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LceError::validation(format!("unknown rule status \"{s}\"")))
    }
}

/// When a rule is meant to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// Inline with the triggering transaction.
    #[default]
    Realtime,
    /// In periodic batch sweeps.
    Batch,
    /// On a calendar schedule.
    Scheduled,
}

impl ExecutionMode {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realtime => "Realtime",
            Self::Batch => "Batch",
            Self::Scheduled => "Scheduled",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Test cases and validation results
// ---------------------------------------------------------------------------

/// A sample input with the verdict the rule must produce for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Short label.
    pub name: String,
    /// Entity data to evaluate.
    pub input: EntityData,
    /// Expected `passed` verdict.
    pub expected_passed: bool,
}

/// The recorded outcome of running one test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Name of the test case.
    pub test_case: String,
    /// Whether the observed verdict matched the expected one.
    pub passed: bool,
    /// Verdict the logic produced.
    pub observed_passed: bool,
    /// Human-readable summary.
    pub message: String,
    /// Logical time of the run.
    pub validated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// RuleDraft
// ---------------------------------------------------------------------------

/// The authored content of a rule version.
///
/// This is what callers submit to create or amend a rule and what rule
/// packs contain. Its digest identifies the content of a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    /// Stable rule identifier.
    pub rule_id: String,
    /// Display name.
    pub name: String,
    /// What the rule checks.
    pub description: String,
    /// Why the rule exists.
    #[serde(default)]
    pub justification: String,
    /// Regulation or policy the rule implements.
    #[serde(default)]
    pub regulatory_reference: Option<String>,
    /// Evaluator payload tagged by `type`.
    pub logic: serde_json::Value,
    /// Handling urgency.
    #[serde(default)]
    pub priority: Priority,
    /// When the rule runs.
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    /// Business area (e.g. "Loan").
    pub applies_to_domain: String,
    /// Entity kind (e.g. "LoanApplication").
    pub applies_to_entity_type: String,
    /// Business events that make the rule applicable.
    #[serde(default)]
    pub trigger_events: BTreeSet<String>,
    /// Rules that must pass before this one is evaluated.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    /// Rules that must not be active at the same time.
    #[serde(default)]
    pub conflicts_with: BTreeSet<String>,
    /// Rules deprecated when this one is approved.
    #[serde(default)]
    pub supersedes: BTreeSet<String>,
    /// Start of validity. Defaults to the approval time.
    #[serde(default)]
    pub effective_date: Option<DateTime<Utc>>,
    /// End of validity (exclusive).
    #[serde(default)]
    pub expiration_date: Option<DateTime<Utc>>,
    /// Samples run at submission.
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

impl RuleDraft {
    /// Digest of the draft's content.
    pub fn digest(&self) -> LceResult<ContentDigest> {
        ContentDigest::of(self)
    }
}

// ---------------------------------------------------------------------------
// ComplianceRule
// ---------------------------------------------------------------------------

/// One persisted version of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRule {
    /// Stable rule identifier.
    pub rule_id: String,
    /// Version number, starting at 1.
    pub version: u32,
    /// Display name.
    pub name: String,
    /// What the rule checks.
    pub description: String,
    /// Why the rule exists.
    pub justification: String,
    /// Regulation or policy the rule implements.
    pub regulatory_reference: Option<String>,
    /// Evaluator payload tagged by `type`.
    pub logic: serde_json::Value,
    /// Lifecycle status.
    pub status: RuleStatus,
    /// Handling urgency.
    pub priority: Priority,
    /// When the rule runs.
    pub execution_mode: ExecutionMode,
    /// Business area.
    pub applies_to_domain: String,
    /// Entity kind.
    pub applies_to_entity_type: String,
    /// Business events that make the rule applicable.
    pub trigger_events: BTreeSet<String>,
    /// Prerequisite rules.
    pub dependencies: BTreeSet<String>,
    /// Mutually exclusive rules.
    pub conflicts_with: BTreeSet<String>,
    /// Rules replaced on approval.
    pub supersedes: BTreeSet<String>,
    /// Start of validity.
    pub effective_date: Option<DateTime<Utc>>,
    /// End of validity (exclusive).
    pub expiration_date: Option<DateTime<Utc>>,
    /// Samples run at submission.
    pub test_cases: Vec<TestCase>,
    /// Results of the last submission's test run.
    #[serde(default)]
    pub validation_results: Vec<ValidationResult>,
    /// Author of this version.
    pub created_by: String,
    /// Logical creation time of this version.
    pub created_at: DateTime<Utc>,
    /// Logical time of the last lifecycle change.
    pub updated_at: DateTime<Utc>,
    /// Approver.
    #[serde(default)]
    pub approved_by: Option<String>,
    /// Approval time.
    #[serde(default)]
    pub approval_date: Option<DateTime<Utc>>,
    /// Digest of the version's content.
    pub content_digest: ContentDigest,
}

impl ComplianceRule {
    /// Materialize a draft as a new Draft-status version.
    pub fn from_draft(draft: RuleDraft, version: u32, ctx: &TxContext) -> LceResult<Self> {
        let content_digest = draft.digest()?;
        Ok(Self {
            rule_id: draft.rule_id,
            version,
            name: draft.name,
            description: draft.description,
            justification: draft.justification,
            regulatory_reference: draft.regulatory_reference,
            logic: draft.logic,
            status: RuleStatus::Draft,
            priority: draft.priority,
            execution_mode: draft.execution_mode,
            applies_to_domain: draft.applies_to_domain,
            applies_to_entity_type: draft.applies_to_entity_type,
            trigger_events: draft.trigger_events,
            dependencies: draft.dependencies,
            conflicts_with: draft.conflicts_with,
            supersedes: draft.supersedes,
            effective_date: draft.effective_date,
            expiration_date: draft.expiration_date,
            test_cases: draft.test_cases,
            validation_results: Vec::new(),
            created_by: ctx.actor().to_string(),
            created_at: ctx.now(),
            updated_at: ctx.now(),
            approved_by: None,
            approval_date: None,
            content_digest,
        })
    }

    /// Decode a rule from untrusted JSON.
    ///
    /// Unknown statuses, priorities and execution modes are reported as
    /// validation errors rather than serialization errors.
    pub fn from_json(value: &serde_json::Value) -> LceResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| LceError::validation(format!("invalid rule record: {e}")))
    }

    /// The authored content of this version.
    pub fn draft(&self) -> RuleDraft {
        RuleDraft {
            rule_id: self.rule_id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            justification: self.justification.clone(),
            regulatory_reference: self.regulatory_reference.clone(),
            logic: self.logic.clone(),
            priority: self.priority,
            execution_mode: self.execution_mode,
            applies_to_domain: self.applies_to_domain.clone(),
            applies_to_entity_type: self.applies_to_entity_type.clone(),
            trigger_events: self.trigger_events.clone(),
            dependencies: self.dependencies.clone(),
            conflicts_with: self.conflicts_with.clone(),
            supersedes: self.supersedes.clone(),
            effective_date: self.effective_date,
            expiration_date: self.expiration_date,
            test_cases: self.test_cases.clone(),
        }
    }

    /// Whether the rule is in force at `at`.
    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.inactivity_reason(at).is_none()
    }

    /// Whether the rule may be executed at `at`.
    pub fn is_executable(&self, at: DateTime<Utc>) -> bool {
        self.ensure_executable(at).is_ok()
    }

    /// Fail with [`LceError::NotExecutable`] unless executable at `at`.
    pub fn ensure_executable(&self, at: DateTime<Utc>) -> LceResult<()> {
        let reason = match self.inactivity_reason(at) {
            Some(reason) => Some(reason),
            None if self.validation_results.iter().any(|r| !r.passed) => {
                Some("stored validation results include failures".to_string())
            }
            None => None,
        };
        match reason {
            Some(reason) => Err(LceError::NotExecutable {
                rule_id: self.rule_id.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    fn inactivity_reason(&self, at: DateTime<Utc>) -> Option<String> {
        if self.status != RuleStatus::Active {
            return Some(format!("status is {}", self.status));
        }
        match self.effective_date {
            None => return Some("no effective date".to_string()),
            Some(eff) if at < eff => return Some(format!("not effective until {eff}")),
            Some(_) => {}
        }
        match self.expiration_date {
            Some(exp) if at >= exp => Some(format!("expired at {exp}")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap()
    }

    fn draft() -> RuleDraft {
        RuleDraft {
            rule_id: "R1".into(),
            name: "Large loan".into(),
            description: "Loan amount above 1000".into(),
            justification: "Credit policy 4.2".into(),
            regulatory_reference: None,
            logic: json!({"type": "threshold", "field": "amount", "threshold": 1000, "operator": ">"}),
            priority: Priority::High,
            execution_mode: ExecutionMode::Realtime,
            applies_to_domain: "Loan".into(),
            applies_to_entity_type: "LoanApplication".into(),
            trigger_events: BTreeSet::from(["LoanSubmitted".to_string()]),
            dependencies: BTreeSet::new(),
            conflicts_with: BTreeSet::new(),
            supersedes: BTreeSet::new(),
            effective_date: None,
            expiration_date: None,
            test_cases: Vec::new(),
        }
    }

    fn active_rule() -> ComplianceRule {
        let ctx = TxContext::new("tx", now(), "author");
        let mut rule = ComplianceRule::from_draft(draft(), 1, &ctx).unwrap();
        rule.status = RuleStatus::Active;
        rule.effective_date = Some(now());
        rule
    }

    #[test]
    fn from_draft_starts_in_draft() {
        let ctx = TxContext::new("tx", now(), "author");
        let rule = ComplianceRule::from_draft(draft(), 1, &ctx).unwrap();
        assert_eq!(rule.status, RuleStatus::Draft);
        assert_eq!(rule.created_by, "author");
        assert_eq!(rule.content_digest, draft().digest().unwrap());
        assert_eq!(rule.draft(), draft());
    }

    #[test]
    fn activity_window_is_half_open() {
        let mut rule = active_rule();
        rule.expiration_date = Some(now() + Duration::days(1));
        assert!(rule.is_active(now()));
        assert!(!rule.is_active(now() - Duration::seconds(1)));
        assert!(!rule.is_active(now() + Duration::days(1)));
    }

    #[test]
    fn failed_validation_blocks_execution() {
        let mut rule = active_rule();
        rule.validation_results.push(ValidationResult {
            test_case: "t".into(),
            passed: false,
            observed_passed: true,
            message: "mismatch".into(),
            validated_at: now(),
        });
        assert!(rule.is_active(now()));
        let err = rule.ensure_executable(now()).unwrap_err();
        assert!(matches!(err, LceError::NotExecutable { .. }));
    }

    #[test]
    fn draft_is_not_executable() {
        let ctx = TxContext::new("tx", now(), "author");
        let rule = ComplianceRule::from_draft(draft(), 1, &ctx).unwrap();
        let err = rule.ensure_executable(now()).unwrap_err();
        assert!(format!("{err}").contains("Draft"));
    }

    #[test]
    fn from_json_rejects_unknown_priority() {
        let mut value = serde_json::to_value(active_rule()).unwrap();
        value["priority"] = json!("Urgent");
        let err = ComplianceRule::from_json(&value).unwrap_err();
        assert!(matches!(err, LceError::Validation(_)));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("pendingapproval".parse::<RuleStatus>().unwrap(), RuleStatus::PendingApproval);
        assert!("Retired".parse::<RuleStatus>().is_err());
        assert!(RuleStatus::Deprecated.is_terminal());
    }
}
