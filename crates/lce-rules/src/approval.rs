//! # Approval Workflow
//!
//! Governs a rule's lifecycle:
//!
//! ```text
//!   create ──▶ Draft ──submit──▶ PendingApproval ──approve──▶ Active
//!                ▲                    │                         │
//!                └──────reject────────┘                   deactivate
//!                ▲                                              ▼
//!                └────────────amend (new version)──────────  Inactive
//!
//!   Active ──(superseded by an approved rule)──▶ Deprecated
//! ```
//!
//! Every transition appends an immutable [`ApprovalHistoryEntry`] and
//! produces a compliance event. Each operation validates first and then
//! commits all of its writes (rule versions, requests, history, supersession
//! of other rules) in one batch.
//!
//! ## Key layout
//!
//! | key | value |
//! |-----|-------|
//! | `approval-req~{request_id}` | request (JSON) |
//! | `approval-req-rule~{rule_id}~{request_id}` | marker |
//! | `approval-pending~{rule_id}` | ID of the pending request |
//! | `approval-hist~{rule_id}~{seq:010}` | history entry (JSON) |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lce_core::store::{get_json, scan_json, scan_keys};
use lce_core::{
    composite_key, key_prefix, ComplianceEvent, EventType, LceError, LceResult, Outcome,
    Severity, SharedStore, TxContext, WriteBatch,
};

use crate::engine::RuleEngine;
use crate::rule::{ComplianceRule, RuleDraft, RuleStatus};
use crate::store::RuleStore;

const REQUEST: &str = "approval-req";
const REQUEST_BY_RULE: &str = "approval-req-rule";
const PENDING: &str = "approval-pending";
const HISTORY: &str = "approval-hist";

/// Entity type recorded on lifecycle events.
const RULE_ENTITY: &str = "ComplianceRule";

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Status of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Awaiting review.
    Pending,
    /// Approved. Terminal.
    Approved,
    /// Rejected or superseded by a resubmission. Terminal.
    Rejected,
}

impl RequestStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    /// Whether the request has been decided.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to activate a rule version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleApprovalRequest {
    /// Unique request identifier.
    pub request_id: String,
    /// Rule under review.
    pub rule_id: String,
    /// Version under review.
    pub rule_version: u32,
    /// Submitter.
    pub requested_by: String,
    /// Submitter's justification.
    pub justification: String,
    /// Review status.
    pub status: RequestStatus,
    /// Reviewer.
    pub reviewed_by: Option<String>,
    /// Reviewer's comments or rejection reason.
    pub review_comments: Option<String>,
    /// Submission time.
    pub requested_at: DateTime<Utc>,
    /// Review time.
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// One immutable lifecycle transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalHistoryEntry {
    /// Rule that transitioned.
    pub rule_id: String,
    /// Version that transitioned.
    pub rule_version: u32,
    /// Request the transition belongs to, if any.
    pub request_id: Option<String>,
    /// Who caused the transition.
    pub actor: String,
    /// Status before; `None` on creation.
    pub from_status: Option<RuleStatus>,
    /// Status after.
    pub to_status: RuleStatus,
    /// When.
    pub timestamp: DateTime<Utc>,
    /// Why.
    pub reason: String,
}

// ---------------------------------------------------------------------------
// ApprovalWorkflow
// ---------------------------------------------------------------------------

/// Drives rule lifecycle transitions.
#[derive(Debug, Clone)]
pub struct ApprovalWorkflow {
    engine: RuleEngine,
}

/// Writes and events accumulated by one workflow call.
struct Staged {
    batch: WriteBatch,
    events: Vec<ComplianceEvent>,
    history_seq: std::collections::BTreeMap<String, u64>,
}

impl ApprovalWorkflow {
    /// Create a workflow over a shared state store.
    pub fn new(store: SharedStore) -> Self {
        Self {
            engine: RuleEngine::new(RuleStore::new(store)),
        }
    }

    /// The rule engine used for validation and test runs.
    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// The rule store.
    pub fn rules(&self) -> &RuleStore {
        self.engine.rules()
    }

    fn state(&self) -> &SharedStore {
        self.rules().state()
    }

    // -- Authoring -----------------------------------------------------------

    /// Create version 1 of a new rule in Draft.
    pub fn create_rule(&self, draft: RuleDraft, ctx: &TxContext) -> LceResult<Outcome<ComplianceRule>> {
        if self.rules().exists(&draft.rule_id)? {
            return Err(LceError::validation(format!(
                "rule {} already exists",
                draft.rule_id
            )));
        }
        let rule = ComplianceRule::from_draft(draft, 1, ctx)?;
        let mut staged = self.begin();
        self.rules().stage_save(&rule, &mut staged.batch)?;
        self.record(&mut staged, &rule, None, None, "created", ctx)?;
        staged.events.push(self.rule_event(
            ctx,
            EventType::RuleCreated,
            &rule,
            Severity::Low,
            format!("rule {} created", rule.rule_id),
        ));
        self.commit(staged, rule)
    }

    /// Create a new Draft version of an existing rule.
    ///
    /// Only Draft and Inactive rules may be amended; an Active rule is
    /// replaced by approving a new rule that supersedes it.
    pub fn amend_rule(
        &self,
        rule_id: &str,
        draft: RuleDraft,
        ctx: &TxContext,
    ) -> LceResult<Outcome<ComplianceRule>> {
        if draft.rule_id != rule_id {
            return Err(LceError::validation(format!(
                "amendment for {rule_id} carries rule_id {}",
                draft.rule_id
            )));
        }
        let current = self.rules().get_latest(rule_id)?;
        if !matches!(current.status, RuleStatus::Draft | RuleStatus::Inactive) {
            return Err(LceError::invalid_transition(
                format!("rule {rule_id}"),
                current.status,
                RuleStatus::Draft,
                "only Draft or Inactive rules can be amended",
            ));
        }
        if draft.digest()? == current.content_digest {
            return Err(LceError::validation(format!(
                "amendment of rule {rule_id} does not change its content"
            )));
        }

        let rule = ComplianceRule::from_draft(draft, current.version + 1, ctx)?;
        let mut staged = self.begin();
        self.rules().stage_save(&rule, &mut staged.batch)?;
        self.record(
            &mut staged,
            &rule,
            None,
            Some(current.status),
            &format!("amended from version {}", current.version),
            ctx,
        )?;
        staged.events.push(self.rule_event(
            ctx,
            EventType::RuleAmended,
            &rule,
            Severity::Low,
            format!("rule {} amended to version {}", rule.rule_id, rule.version),
        ));
        self.commit(staged, rule)
    }

    // -- Review --------------------------------------------------------------

    /// Submit the latest version of a rule for approval.
    ///
    /// Runs the rule's test cases and stores their results on the version.
    /// An older pending request for the rule is closed as rejected.
    pub fn submit_for_approval(
        &self,
        rule_id: &str,
        justification: &str,
        ctx: &TxContext,
    ) -> LceResult<Outcome<RuleApprovalRequest>> {
        let mut rule = self.rules().get_latest(rule_id)?;
        if !matches!(rule.status, RuleStatus::Draft | RuleStatus::PendingApproval) {
            return Err(LceError::validation(format!(
                "rule {rule_id} cannot be submitted from status {}",
                rule.status
            )));
        }
        if justification.trim().is_empty() {
            return Err(LceError::validation("submission justification is required"));
        }
        self.engine.validate_rule(&rule, ctx)?;
        if rule.test_cases.is_empty() {
            return Err(LceError::validation(format!(
                "rule {rule_id} has no test case; at least one test case is required"
            )));
        }

        let previous_status = rule.status;
        rule.validation_results = self.engine.run_test_cases(&rule, ctx)?;
        rule.status = RuleStatus::PendingApproval;
        rule.updated_at = ctx.now();

        let request = RuleApprovalRequest {
            request_id: ctx.next_id("req"),
            rule_id: rule.rule_id.clone(),
            rule_version: rule.version,
            requested_by: ctx.actor().to_string(),
            justification: justification.to_string(),
            status: RequestStatus::Pending,
            reviewed_by: None,
            review_comments: None,
            requested_at: ctx.now(),
            reviewed_at: None,
        };

        let mut staged = self.begin();
        if let Some(mut old) = self.pending_request_for(rule_id)? {
            old.status = RequestStatus::Rejected;
            old.reviewed_by = Some(ctx.actor().to_string());
            old.review_comments = Some("superseded by resubmission".to_string());
            old.reviewed_at = Some(ctx.now());
            staged.batch.put_json(composite_key(REQUEST, &[&old.request_id]), &old)?;
        }
        self.rules().stage_save(&rule, &mut staged.batch)?;
        self.stage_request(&mut staged, &request)?;
        staged
            .batch
            .put_json(composite_key(PENDING, &[rule_id]), &request.request_id)?;
        self.record(
            &mut staged,
            &rule,
            Some(&request.request_id),
            Some(previous_status),
            justification,
            ctx,
        )?;

        let failed = rule.validation_results.iter().filter(|r| !r.passed).count();
        staged.events.push(
            self.rule_event(
                ctx,
                EventType::RuleSubmittedForApproval,
                &rule,
                Severity::Low,
                format!(
                    "rule {} v{} submitted for approval ({} of {} test cases failed)",
                    rule.rule_id,
                    rule.version,
                    failed,
                    rule.validation_results.len()
                ),
            )
            .with_details(serde_json::json!({ "request_id": request.request_id })),
        );
        tracing::info!(rule_id = %rule_id, request_id = %request.request_id, "rule submitted for approval");
        self.commit(staged, request)
    }

    /// Approve a pending request: activate the rule and deprecate every rule
    /// it supersedes.
    pub fn approve(
        &self,
        request_id: &str,
        comments: &str,
        ctx: &TxContext,
    ) -> LceResult<Outcome<ComplianceRule>> {
        let mut request = self.get_request(request_id)?;
        if request.status.is_terminal() {
            return Err(LceError::AlreadyAtBoundary {
                id: request_id.to_string(),
                reason: format!("request is already {}", request.status),
            });
        }
        let mut rule = self.rules().get_latest(&request.rule_id)?;
        if !matches!(rule.status, RuleStatus::Draft | RuleStatus::PendingApproval) {
            return Err(LceError::AlreadyAtBoundary {
                id: rule.rule_id.clone(),
                reason: format!("rule cannot be approved from status {}", rule.status),
            });
        }
        if rule.version != request.rule_version {
            return Err(LceError::validation(format!(
                "request {request_id} covers version {} but rule {} is at version {}",
                request.rule_version, rule.rule_id, rule.version
            )));
        }
        let failed: Vec<&str> = rule
            .validation_results
            .iter()
            .filter(|r| !r.passed)
            .map(|r| r.test_case.as_str())
            .collect();
        if rule.validation_results.is_empty() || !failed.is_empty() {
            return Err(LceError::validation(format!(
                "rule {} cannot be approved: failing test cases [{}]",
                rule.rule_id,
                failed.join(", ")
            )));
        }
        self.engine.validate_rule(&rule, ctx)?;

        let previous_status = rule.status;
        rule.status = RuleStatus::Active;
        rule.approved_by = Some(ctx.actor().to_string());
        rule.approval_date = Some(ctx.now());
        rule.effective_date.get_or_insert(ctx.now());
        rule.updated_at = ctx.now();
        if let (Some(eff), Some(exp)) = (rule.effective_date, rule.expiration_date) {
            if exp < eff {
                return Err(LceError::validation(format!(
                    "rule {} expires at {exp}, before its effective date {eff}",
                    rule.rule_id
                )));
            }
        }

        request.status = RequestStatus::Approved;
        request.reviewed_by = Some(ctx.actor().to_string());
        request.review_comments = Some(comments.to_string());
        request.reviewed_at = Some(ctx.now());

        let mut staged = self.begin();
        self.rules().stage_save(&rule, &mut staged.batch)?;
        self.stage_request(&mut staged, &request)?;
        staged.batch.delete(composite_key(PENDING, &[&rule.rule_id]));
        self.record(
            &mut staged,
            &rule,
            Some(request_id),
            Some(previous_status),
            comments,
            ctx,
        )?;
        staged.events.push(self.rule_event(
            ctx,
            EventType::RuleApproved,
            &rule,
            Severity::Medium,
            format!("rule {} v{} approved and active", rule.rule_id, rule.version),
        ));

        for old_id in &rule.supersedes {
            let mut old = self.rules().get_latest(old_id)?;
            if old.status == RuleStatus::Deprecated {
                continue;
            }
            let before = old.status;
            old.status = RuleStatus::Deprecated;
            old.updated_at = ctx.now();
            self.rules().stage_save(&old, &mut staged.batch)?;
            if let Some(pending) = self.pending_request_for(old_id)? {
                staged.batch.delete(composite_key(PENDING, &[old_id]));
                let mut closed = pending;
                closed.status = RequestStatus::Rejected;
                closed.reviewed_by = Some(ctx.actor().to_string());
                closed.review_comments = Some(format!("superseded by rule {}", rule.rule_id));
                closed.reviewed_at = Some(ctx.now());
                self.stage_request(&mut staged, &closed)?;
            }
            self.record(
                &mut staged,
                &old,
                Some(request_id),
                Some(before),
                &format!("superseded by rule {} v{}", rule.rule_id, rule.version),
                ctx,
            )?;
            staged.events.push(
                self.rule_event(
                    ctx,
                    EventType::RuleSuperseded,
                    &old,
                    Severity::Medium,
                    format!("rule {old_id} superseded by {}", rule.rule_id),
                )
                .with_details(serde_json::json!({ "superseded_by": rule.rule_id })),
            );
        }

        tracing::info!(
            rule_id = %rule.rule_id,
            version = rule.version,
            superseded = rule.supersedes.len(),
            "rule approved"
        );
        self.commit(staged, rule)
    }

    /// Reject a pending request; the rule returns to Draft.
    pub fn reject(
        &self,
        request_id: &str,
        reason: &str,
        ctx: &TxContext,
    ) -> LceResult<Outcome<RuleApprovalRequest>> {
        if reason.trim().is_empty() {
            return Err(LceError::validation("rejection reason is required"));
        }
        let mut request = self.get_request(request_id)?;
        if request.status.is_terminal() {
            return Err(LceError::AlreadyAtBoundary {
                id: request_id.to_string(),
                reason: format!("request is already {}", request.status),
            });
        }
        let mut rule = self.rules().get_latest(&request.rule_id)?;

        request.status = RequestStatus::Rejected;
        request.reviewed_by = Some(ctx.actor().to_string());
        request.review_comments = Some(reason.to_string());
        request.reviewed_at = Some(ctx.now());

        let mut staged = self.begin();
        self.stage_request(&mut staged, &request)?;
        staged.batch.delete(composite_key(PENDING, &[&request.rule_id]));
        if rule.status == RuleStatus::PendingApproval {
            let before = rule.status;
            rule.status = RuleStatus::Draft;
            rule.updated_at = ctx.now();
            self.rules().stage_save(&rule, &mut staged.batch)?;
            self.record(&mut staged, &rule, Some(request_id), Some(before), reason, ctx)?;
        }
        staged.events.push(
            self.rule_event(
                ctx,
                EventType::RuleRejected,
                &rule,
                Severity::Low,
                format!("approval of rule {} rejected: {reason}", rule.rule_id),
            )
            .with_details(serde_json::json!({ "request_id": request_id })),
        );
        tracing::info!(rule_id = %rule.rule_id, request_id = %request_id, "rule approval rejected");
        self.commit(staged, request)
    }

    // -- Retirement ----------------------------------------------------------

    /// Take an Active rule out of service.
    pub fn deactivate(
        &self,
        rule_id: &str,
        reason: &str,
        ctx: &TxContext,
    ) -> LceResult<Outcome<ComplianceRule>> {
        let mut rule = self.rules().get_latest(rule_id)?;
        if rule.status != RuleStatus::Active {
            return Err(LceError::invalid_transition(
                format!("rule {rule_id}"),
                rule.status,
                RuleStatus::Inactive,
                "only Active rules can be deactivated",
            ));
        }
        let before = rule.status;
        rule.status = RuleStatus::Inactive;
        rule.updated_at = ctx.now();

        let mut staged = self.begin();
        self.rules().stage_save(&rule, &mut staged.batch)?;
        self.record(&mut staged, &rule, None, Some(before), reason, ctx)?;
        staged.events.push(self.rule_event(
            ctx,
            EventType::RuleDeactivated,
            &rule,
            Severity::Medium,
            format!("rule {rule_id} deactivated: {reason}"),
        ));
        self.commit(staged, rule)
    }

    /// Soft-delete a rule. History stays queryable.
    pub fn deprecate(
        &self,
        rule_id: &str,
        reason: &str,
        ctx: &TxContext,
    ) -> LceResult<Outcome<ComplianceRule>> {
        let mut rule = self.rules().get_latest(rule_id)?;
        if rule.status == RuleStatus::Deprecated {
            return Err(LceError::AlreadyAtBoundary {
                id: rule_id.to_string(),
                reason: "rule is already deprecated".to_string(),
            });
        }
        let before = rule.status;
        rule.status = RuleStatus::Deprecated;
        rule.updated_at = ctx.now();

        let mut staged = self.begin();
        self.rules().stage_save(&rule, &mut staged.batch)?;
        if self.pending_request_for(rule_id)?.is_some() {
            staged.batch.delete(composite_key(PENDING, &[rule_id]));
        }
        self.record(&mut staged, &rule, None, Some(before), reason, ctx)?;
        staged.events.push(self.rule_event(
            ctx,
            EventType::RuleDeprecated,
            &rule,
            Severity::Low,
            format!("rule {rule_id} deprecated: {reason}"),
        ));
        self.commit(staged, rule)
    }

    // -- Queries -------------------------------------------------------------

    /// Fetch a request.
    pub fn get_request(&self, request_id: &str) -> LceResult<RuleApprovalRequest> {
        get_json(self.state().as_ref(), &composite_key(REQUEST, &[request_id]))?
            .ok_or_else(|| LceError::not_found("approval request", request_id))
    }

    /// Every request ever made for a rule.
    pub fn requests_for_rule(&self, rule_id: &str) -> LceResult<Vec<RuleApprovalRequest>> {
        let ids = scan_keys(self.state().as_ref(), &key_prefix(REQUEST_BY_RULE, &[rule_id]))?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_request(&id) {
                Ok(r) => out.push(r),
                Err(e) => tracing::warn!(request_id = %id, error = %e, "skipping unreadable request"),
            }
        }
        out.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        Ok(out)
    }

    /// All requests awaiting review, ordered by rule ID.
    pub fn pending_requests(&self) -> LceResult<Vec<RuleApprovalRequest>> {
        let pointers = self.state().scan_prefix(&format!("{PENDING}~"))?;
        let mut out = Vec::with_capacity(pointers.len());
        for (key, bytes) in pointers {
            let request_id: String = match serde_json::from_slice(&bytes) {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping unreadable pending pointer");
                    continue;
                }
            };
            match self.get_request(&request_id) {
                Ok(r) => out.push(r),
                Err(e) => tracing::warn!(request_id = %request_id, error = %e, "skipping unreadable request"),
            }
        }
        Ok(out)
    }

    /// Lifecycle history of a rule, oldest first.
    pub fn history(&self, rule_id: &str) -> LceResult<Vec<ApprovalHistoryEntry>> {
        scan_json(self.state().as_ref(), &key_prefix(HISTORY, &[rule_id]))
    }

    fn pending_request_for(&self, rule_id: &str) -> LceResult<Option<RuleApprovalRequest>> {
        let pointer: Option<String> =
            get_json(self.state().as_ref(), &composite_key(PENDING, &[rule_id]))?;
        match pointer {
            Some(id) => Ok(Some(self.get_request(&id)?)),
            None => Ok(None),
        }
    }

    // -- Staging -------------------------------------------------------------

    fn begin(&self) -> Staged {
        Staged {
            batch: WriteBatch::new(),
            events: Vec::new(),
            history_seq: std::collections::BTreeMap::new(),
        }
    }

    fn stage_request(&self, staged: &mut Staged, request: &RuleApprovalRequest) -> LceResult<()> {
        staged
            .batch
            .put_json(composite_key(REQUEST, &[&request.request_id]), request)?;
        staged.batch.put_marker(composite_key(
            REQUEST_BY_RULE,
            &[&request.rule_id, &request.request_id],
        ));
        Ok(())
    }

    fn record(
        &self,
        staged: &mut Staged,
        rule: &ComplianceRule,
        request_id: Option<&str>,
        from_status: Option<RuleStatus>,
        reason: &str,
        ctx: &TxContext,
    ) -> LceResult<()> {
        let seq = match staged.history_seq.get(&rule.rule_id) {
            Some(seq) => *seq,
            None => scan_keys(self.state().as_ref(), &key_prefix(HISTORY, &[&rule.rule_id]))?.len()
                as u64,
        };
        staged.history_seq.insert(rule.rule_id.clone(), seq + 1);
        let entry = ApprovalHistoryEntry {
            rule_id: rule.rule_id.clone(),
            rule_version: rule.version,
            request_id: request_id.map(str::to_string),
            actor: ctx.actor().to_string(),
            from_status,
            to_status: rule.status,
            timestamp: ctx.now(),
            reason: reason.to_string(),
        };
        staged.batch.put_json(
            composite_key(HISTORY, &[&rule.rule_id, &format!("{seq:010}")]),
            &entry,
        )
    }

    fn rule_event(
        &self,
        ctx: &TxContext,
        event_type: EventType,
        rule: &ComplianceRule,
        severity: Severity,
        description: String,
    ) -> ComplianceEvent {
        ComplianceEvent::new(ctx, event_type, rule.rule_id.clone(), RULE_ENTITY, severity, description)
            .with_rule(rule.rule_id.clone(), rule.version)
    }

    fn commit<T>(&self, staged: Staged, value: T) -> LceResult<Outcome<T>> {
        self.state().apply(staged.batch)?;
        Ok(Outcome::new(value, staged.events))
    }
}
