//! # Escalation Manager
//!
//! Drives [`ComplianceViolationEscalation`] records through their state
//! machine:
//!
//! ```text
//!   create ──▶ Open ──assign──▶ Assigned ──start_work──▶ InProgress
//!                │                 │                        │
//!                └────escalate─────┴────────────────────────┘
//!                         ▼
//!                     Escalated ──assign──▶ Assigned ──▶ …
//!
//!   any non-terminal ──resolve──▶ Resolved    (terminal)
//!   any non-terminal ──close────▶ Closed      (terminal)
//! ```
//!
//! The level only moves up, one step per `escalate`, and stops at L5.
//! Every mutation appends a history entry, queues a notification for the
//! channel of the current level and returns one compliance event.
//!
//! ## Key layout
//!
//! | key | value |
//! |-----|-------|
//! | `esc~{escalation_id}` | escalation (JSON) |
//! | `esc-status~{status}~{escalation_id}` | marker |
//! | `esc-violation~{violation_id}~{escalation_id}` | marker |

use serde_json::json;

use lce_core::store::{get_json, scan_keys};
use lce_core::{
    composite_key, key_prefix, validate_identifier, ComplianceEvent, EventType, LceError,
    LceResult, Outcome, SharedStore, TxContext, WriteBatch,
};

use crate::config::EscalationConfig;
use crate::escalation::{
    ComplianceViolationEscalation, EscalationComment, ResolutionAction, ViolationReport,
};
use crate::level::{EscalationLevel, EscalationStatus};
use crate::scoring::{due_date, risk_score};

const ESCALATION: &str = "esc";
const BY_STATUS: &str = "esc-status";
const BY_VIOLATION: &str = "esc-violation";

/// Entity type recorded on escalation events.
const ESCALATION_ENTITY: &str = "ComplianceViolationEscalation";

/// Statuses an escalation can still be worked in.
const OPEN_STATUSES: [EscalationStatus; 4] = [
    EscalationStatus::Open,
    EscalationStatus::Assigned,
    EscalationStatus::InProgress,
    EscalationStatus::Escalated,
];

/// Persists escalations and applies their transitions.
pub struct EscalationManager {
    store: SharedStore,
    config: EscalationConfig,
}

impl EscalationManager {
    /// A manager with the default SLA table and recipient channels.
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            config: EscalationConfig::default(),
        }
    }

    /// A manager with a custom configuration, validated first.
    pub fn with_config(store: SharedStore, config: EscalationConfig) -> LceResult<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// The active configuration.
    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Open an escalation for a reported violation.
    pub fn create(
        &self,
        report: ViolationReport,
        ctx: &TxContext,
    ) -> LceResult<Outcome<ComplianceViolationEscalation>> {
        let mut batch = WriteBatch::new();
        let out = self.stage_create(report, ctx, &mut batch)?;
        self.store.apply(batch)?;
        Ok(out)
    }

    /// Validate and build a new escalation, staging its writes into `batch`
    /// without committing them.
    ///
    /// Lets a caller persist the escalation together with the record that
    /// raised it.
    pub fn stage_create(
        &self,
        report: ViolationReport,
        ctx: &TxContext,
        batch: &mut WriteBatch,
    ) -> LceResult<Outcome<ComplianceViolationEscalation>> {
        validate_identifier("violation_id", &report.violation_id)?;
        validate_identifier("entity_id", &report.entity_id)?;
        if report.title.trim().is_empty() {
            return Err(LceError::validation("title is required"));
        }

        let now = ctx.now();
        let level = EscalationLevel::initial(report.severity, report.priority);
        let mut esc = ComplianceViolationEscalation {
            escalation_id: ctx.next_id("esc"),
            violation_id: report.violation_id,
            rule_id: report.rule_id,
            entity_id: report.entity_id,
            title: report.title,
            description: report.description,
            severity: report.severity,
            priority: report.priority,
            risk_score: risk_score(
                report.severity,
                report.priority,
                &report.business_impact,
                &report.regulatory_impact,
            ),
            business_impact: report.business_impact,
            regulatory_impact: report.regulatory_impact,
            current_level: level,
            status: EscalationStatus::Open,
            assigned_to: None,
            due_date: due_date(&self.config, level, report.priority, now)?,
            escalation_history: Vec::new(),
            comments: Vec::new(),
            notifications: Vec::new(),
            resolution_actions: Vec::new(),
            resolution: None,
            created_by: ctx.actor().to_string(),
            created_at: now,
            updated_at: now,
            resolved_at: None,
        };
        esc.record_transition(None, None, "created", "violation reported", ctx);
        esc.queue_notification(
            self.config.recipient(esc.current_level).to_string(),
            format!("New {} escalation: {}", esc.current_level, esc.title),
            format!(
                "Violation {} on {} requires attention by {}",
                esc.violation_id, esc.entity_id, esc.due_date
            ),
            ctx,
        );

        tracing::info!(
            escalation_id = %esc.escalation_id,
            violation_id = %esc.violation_id,
            level = %esc.current_level,
            "escalation opened"
        );
        let event = self.event(
            ctx,
            EventType::EscalationCreated,
            &esc,
            format!("escalation opened at {} for violation {}", esc.current_level, esc.violation_id),
        );
        self.stage(None, &esc, batch)?;
        Ok(Outcome::new(esc, vec![event]))
    }

    /// Assign an escalation to a handler.
    ///
    /// Allowed from Open, Assigned, InProgress and Escalated.
    pub fn assign(
        &self,
        escalation_id: &str,
        assignee: &str,
        ctx: &TxContext,
    ) -> LceResult<Outcome<ComplianceViolationEscalation>> {
        if assignee.trim().is_empty() {
            return Err(LceError::validation("assignee is required"));
        }
        let mut esc = self.get(escalation_id)?;
        esc.ensure_mutable("Assigned")?;

        let (from_level, from_status) = (esc.current_level, esc.status);
        esc.status = EscalationStatus::Assigned;
        esc.assigned_to = Some(assignee.to_string());
        esc.record_transition(
            Some(from_level),
            Some(from_status),
            "assigned",
            &format!("assigned to {assignee}"),
            ctx,
        );
        esc.queue_notification(
            assignee.to_string(),
            format!("Escalation assigned: {}", esc.title),
            format!("You are handling escalation {} due {}", esc.escalation_id, esc.due_date),
            ctx,
        );
        esc.queue_notification(
            self.config.recipient(esc.current_level).to_string(),
            format!("Escalation assigned: {}", esc.title),
            format!("{} is handling escalation {}", assignee, esc.escalation_id),
            ctx,
        );

        let event = self.event(
            ctx,
            EventType::EscalationAssigned,
            &esc,
            format!("escalation assigned to {assignee}"),
        );
        self.commit(Some(from_status), esc, event)
    }

    /// Start work on an assigned escalation.
    pub fn start_work(
        &self,
        escalation_id: &str,
        ctx: &TxContext,
    ) -> LceResult<Outcome<ComplianceViolationEscalation>> {
        let mut esc = self.get(escalation_id)?;
        esc.ensure_mutable("InProgress")?;
        if esc.status != EscalationStatus::Assigned {
            return Err(LceError::invalid_transition(
                format!("escalation {}", esc.escalation_id),
                esc.status,
                EscalationStatus::InProgress,
                "work can only start on an assigned escalation",
            ));
        }

        let (from_level, from_status) = (esc.current_level, esc.status);
        esc.status = EscalationStatus::InProgress;
        let handler = esc.assigned_to.clone().unwrap_or_default();
        esc.record_transition(
            Some(from_level),
            Some(from_status),
            "work started",
            &format!("{handler} started work"),
            ctx,
        );
        esc.queue_notification(
            self.config.recipient(esc.current_level).to_string(),
            format!("Work started: {}", esc.title),
            format!("{handler} started work on escalation {}", esc.escalation_id),
            ctx,
        );

        let event = self.event(ctx, EventType::EscalationInProgress, &esc, "escalation in progress".to_string());
        self.commit(Some(from_status), esc, event)
    }

    /// Move an escalation up one level.
    ///
    /// Clears the assignment, raises the priority one step and recomputes
    /// the due date and risk score from the call time. Fails with
    /// `AlreadyAtBoundary` at L5.
    pub fn escalate(
        &self,
        escalation_id: &str,
        reason: &str,
        ctx: &TxContext,
    ) -> LceResult<Outcome<ComplianceViolationEscalation>> {
        if reason.trim().is_empty() {
            return Err(LceError::validation("escalation reason is required"));
        }
        let esc = self.get(escalation_id)?;
        let (from_status, esc, event) = self.raise(esc, reason, ctx)?;
        self.commit(Some(from_status), esc, event)
    }

    /// Apply one level raise in memory, returning the prior status, the
    /// raised escalation and its event.
    fn raise(
        &self,
        mut esc: ComplianceViolationEscalation,
        reason: &str,
        ctx: &TxContext,
    ) -> LceResult<(EscalationStatus, ComplianceViolationEscalation, ComplianceEvent)> {
        esc.ensure_mutable("Escalated")?;
        let Some(next) = esc.current_level.next() else {
            return Err(LceError::AlreadyAtBoundary {
                id: esc.escalation_id,
                reason: "already at highest level".to_string(),
            });
        };

        let (from_level, from_status) = (esc.current_level, esc.status);
        esc.current_level = next;
        esc.status = EscalationStatus::Escalated;
        esc.assigned_to = None;
        esc.priority = esc.priority.raised();
        esc.due_date = due_date(&self.config, next, esc.priority, ctx.now())?;
        esc.risk_score = risk_score(
            esc.severity,
            esc.priority,
            &esc.business_impact,
            &esc.regulatory_impact,
        );
        esc.record_transition(Some(from_level), Some(from_status), "escalated", reason, ctx);
        esc.queue_notification(
            self.config.recipient(esc.current_level).to_string(),
            format!("Escalated to {}: {}", next, esc.title),
            format!(
                "Escalation {} raised from {} to {}: {}. Due {}",
                esc.escalation_id, from_level, next, reason, esc.due_date
            ),
            ctx,
        );

        tracing::info!(
            escalation_id = %esc.escalation_id,
            from = %from_level,
            to = %next,
            "escalation raised"
        );
        let event = self.event(
            ctx,
            EventType::EscalationLevelRaised,
            &esc,
            format!("escalation raised from {from_level} to {next}: {reason}"),
        );
        Ok((from_status, esc, event))
    }

    /// Add a comment; optionally notify the current assignee.
    pub fn add_comment(
        &self,
        escalation_id: &str,
        text: &str,
        notify_assignee: bool,
        ctx: &TxContext,
    ) -> LceResult<Outcome<ComplianceViolationEscalation>> {
        if text.trim().is_empty() {
            return Err(LceError::validation("comment text is required"));
        }
        let mut esc = self.get(escalation_id)?;
        esc.ensure_mutable("comment")?;

        let status = esc.status;
        esc.comments.push(EscalationComment {
            comment_id: ctx.next_id("cmt"),
            author: ctx.actor().to_string(),
            text: text.to_string(),
            created_at: ctx.now(),
        });
        esc.record_transition(Some(esc.current_level), Some(status), "commented", text, ctx);
        if notify_assignee {
            if let Some(assignee) = esc.assigned_to.clone() {
                esc.queue_notification(
                    assignee,
                    format!("New comment on {}", esc.title),
                    format!("{}: {}", ctx.actor(), text),
                    ctx,
                );
            }
        }
        esc.queue_notification(
            self.config.recipient(esc.current_level).to_string(),
            format!("New comment on {}", esc.title),
            format!("{}: {}", ctx.actor(), text),
            ctx,
        );

        let event = self.event(ctx, EventType::EscalationCommentAdded, &esc, "comment added".to_string());
        self.commit(Some(status), esc, event)
    }

    /// Record a remediation step taken on the escalation.
    pub fn record_resolution_action(
        &self,
        escalation_id: &str,
        description: &str,
        ctx: &TxContext,
    ) -> LceResult<Outcome<ComplianceViolationEscalation>> {
        if description.trim().is_empty() {
            return Err(LceError::validation("action description is required"));
        }
        let mut esc = self.get(escalation_id)?;
        esc.ensure_mutable("record action")?;

        let status = esc.status;
        esc.resolution_actions.push(ResolutionAction {
            action_id: ctx.next_id("act"),
            description: description.to_string(),
            performed_by: ctx.actor().to_string(),
            performed_at: ctx.now(),
        });
        esc.record_transition(Some(esc.current_level), Some(status), "action recorded", description, ctx);
        esc.queue_notification(
            self.config.recipient(esc.current_level).to_string(),
            format!("Remediation on {}", esc.title),
            format!("{} recorded: {}", ctx.actor(), description),
            ctx,
        );

        let event = self.event(
            ctx,
            EventType::EscalationActionRecorded,
            &esc,
            format!("resolution action recorded: {description}"),
        );
        self.commit(Some(status), esc, event)
    }

    /// Resolve an escalation. Terminal.
    pub fn resolve(
        &self,
        escalation_id: &str,
        summary: &str,
        ctx: &TxContext,
    ) -> LceResult<Outcome<ComplianceViolationEscalation>> {
        self.finish(escalation_id, EscalationStatus::Resolved, summary, ctx)
    }

    /// Close an escalation administratively. Terminal.
    pub fn close(
        &self,
        escalation_id: &str,
        reason: &str,
        ctx: &TxContext,
    ) -> LceResult<Outcome<ComplianceViolationEscalation>> {
        self.finish(escalation_id, EscalationStatus::Closed, reason, ctx)
    }

    /// Escalate every overdue escalation one level.
    ///
    /// Escalations already at L5 are left as they are and logged. All raises
    /// commit in one batch: if any of them fails, none is persisted.
    pub fn escalate_overdue(
        &self,
        ctx: &TxContext,
    ) -> LceResult<Outcome<Vec<ComplianceViolationEscalation>>> {
        let mut batch = WriteBatch::new();
        let mut events = Vec::new();
        let mut raised = Vec::new();
        for esc in self.overdue(ctx)? {
            if esc.current_level == EscalationLevel::HIGHEST {
                tracing::warn!(
                    escalation_id = %esc.escalation_id,
                    due_date = %esc.due_date,
                    "overdue escalation already at highest level"
                );
                continue;
            }
            let reason = format!("SLA breached: due {}", esc.due_date);
            let (from_status, esc, event) = self.raise(esc, &reason, ctx)?;
            self.stage(Some(from_status), &esc, &mut batch)?;
            events.push(event);
            raised.push(esc);
        }
        self.store.apply(batch)?;
        Ok(Outcome::new(raised, events))
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Load an escalation.
    pub fn get(&self, escalation_id: &str) -> LceResult<ComplianceViolationEscalation> {
        get_json(self.store.as_ref(), &composite_key(ESCALATION, &[escalation_id]))?
            .ok_or_else(|| LceError::not_found("escalation", escalation_id))
    }

    /// Escalations currently in `status`.
    pub fn list_by_status(
        &self,
        status: EscalationStatus,
    ) -> LceResult<Vec<ComplianceViolationEscalation>> {
        self.load_indexed(&key_prefix(BY_STATUS, &[status.as_str()]))
    }

    /// Escalations opened for a violation.
    pub fn list_for_violation(
        &self,
        violation_id: &str,
    ) -> LceResult<Vec<ComplianceViolationEscalation>> {
        self.load_indexed(&key_prefix(BY_VIOLATION, &[violation_id]))
    }

    /// Non-terminal escalations whose due date has passed at `ctx.now()`,
    /// earliest deadline first.
    pub fn overdue(&self, ctx: &TxContext) -> LceResult<Vec<ComplianceViolationEscalation>> {
        let now = ctx.now();
        let mut out = Vec::new();
        for status in OPEN_STATUSES {
            out.extend(
                self.list_by_status(status)?
                    .into_iter()
                    .filter(|e| e.is_overdue(now)),
            );
        }
        out.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then_with(|| a.escalation_id.cmp(&b.escalation_id))
        });
        Ok(out)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn finish(
        &self,
        escalation_id: &str,
        to: EscalationStatus,
        text: &str,
        ctx: &TxContext,
    ) -> LceResult<Outcome<ComplianceViolationEscalation>> {
        if text.trim().is_empty() {
            return Err(LceError::validation(match to {
                EscalationStatus::Resolved => "resolution summary is required",
                _ => "closing reason is required",
            }));
        }
        let mut esc = self.get(escalation_id)?;
        esc.ensure_mutable(to.as_str())?;

        let (from_level, from_status) = (esc.current_level, esc.status);
        esc.status = to;
        esc.resolution = Some(text.to_string());
        esc.resolved_at = Some(ctx.now());
        let action = match to {
            EscalationStatus::Resolved => "resolved",
            _ => "closed",
        };
        esc.record_transition(Some(from_level), Some(from_status), action, text, ctx);
        esc.queue_notification(
            self.config.recipient(esc.current_level).to_string(),
            format!("Escalation {action}: {}", esc.title),
            format!("Escalation {} {action}: {text}", esc.escalation_id),
            ctx,
        );

        let event_type = match to {
            EscalationStatus::Resolved => EventType::EscalationResolved,
            _ => EventType::EscalationClosed,
        };
        let event = self.event(ctx, event_type, &esc, format!("escalation {action}: {text}"));
        self.commit(Some(from_status), esc, event)
    }

    fn event(
        &self,
        ctx: &TxContext,
        event_type: EventType,
        esc: &ComplianceViolationEscalation,
        description: String,
    ) -> ComplianceEvent {
        let mut event = ComplianceEvent::new(
            ctx,
            event_type,
            esc.escalation_id.clone(),
            ESCALATION_ENTITY,
            esc.severity,
            description,
        )
        .with_details(json!({
            "entity_id": esc.entity_id,
            "violation_id": esc.violation_id,
            "level": esc.current_level,
            "status": esc.status,
            "priority": esc.priority,
            "due_date": esc.due_date,
            "risk_score": esc.risk_score,
            "assigned_to": esc.assigned_to,
        }));
        event.rule_id = esc.rule_id.clone();
        event
    }

    fn commit(
        &self,
        prior_status: Option<EscalationStatus>,
        esc: ComplianceViolationEscalation,
        event: ComplianceEvent,
    ) -> LceResult<Outcome<ComplianceViolationEscalation>> {
        let mut batch = WriteBatch::new();
        self.stage(prior_status, &esc, &mut batch)?;
        self.store.apply(batch)?;
        Ok(Outcome::new(esc, vec![event]))
    }

    fn stage(
        &self,
        prior_status: Option<EscalationStatus>,
        esc: &ComplianceViolationEscalation,
        batch: &mut WriteBatch,
    ) -> LceResult<()> {
        if let Some(prior) = prior_status.filter(|p| *p != esc.status) {
            batch.delete(composite_key(BY_STATUS, &[prior.as_str(), &esc.escalation_id]));
        }
        batch.put_json(composite_key(ESCALATION, &[&esc.escalation_id]), esc)?;
        batch.put_marker(composite_key(BY_STATUS, &[esc.status.as_str(), &esc.escalation_id]));
        batch.put_marker(composite_key(BY_VIOLATION, &[&esc.violation_id, &esc.escalation_id]));
        Ok(())
    }

    fn load_indexed(&self, prefix: &str) -> LceResult<Vec<ComplianceViolationEscalation>> {
        scan_keys(self.store.as_ref(), prefix)?
            .iter()
            .map(|id| self.get(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::sync::Arc;

    use lce_core::store::{StateStore, WriteOp};
    use lce_core::{MemoryStateStore, Priority, Severity};
    use parking_lot::Mutex;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn at(hours: i64, actor: &str) -> TxContext {
        TxContext::new(format!("tx-{hours}-{actor}"), t0() + Duration::hours(hours), actor)
    }

    fn manager() -> EscalationManager {
        EscalationManager::new(MemoryStateStore::shared())
    }

    fn report() -> ViolationReport {
        ViolationReport::new("evt-1", "loan-1", "Loan over threshold").with_rule("R1")
    }

    #[test]
    fn create_starts_at_level_for_classification() {
        let m = manager();
        let esc = m.create(report(), &at(0, "sys")).unwrap().value;
        assert_eq!(esc.current_level, EscalationLevel::L1);
        assert_eq!(esc.status, EscalationStatus::Open);
        assert_eq!(esc.due_date, t0() + Duration::hours(24));
        assert!((esc.risk_score - 0.5).abs() < 1e-12);
        assert_eq!(esc.notifications[0].recipient, "compliance-analysts");
        assert_eq!(esc.escalation_history.len(), 1);

        let critical = m
            .create(
                report().with_classification(Severity::Critical, Priority::Low),
                &at(0, "sys"),
            )
            .unwrap()
            .value;
        assert_eq!(critical.current_level, EscalationLevel::L3);
        assert_eq!(critical.due_date, t0() + Duration::hours(108));
    }

    #[test]
    fn escalate_clears_assignment_and_tightens_sla() {
        let m = manager();
        let id = m.create(report(), &at(0, "sys")).unwrap().value.escalation_id;
        m.assign(&id, "analyst-7", &at(1, "lead")).unwrap();

        let out = m.escalate(&id, "no response", &at(2, "lead")).unwrap();
        let esc = out.value;
        assert_eq!(esc.current_level, EscalationLevel::L2);
        assert_eq!(esc.status, EscalationStatus::Escalated);
        assert_eq!(esc.assigned_to, None);
        assert_eq!(esc.priority, Priority::High);
        assert_eq!(esc.due_date, t0() + Duration::hours(2 + 36));
        assert_eq!(out.events[0].event_type, EventType::EscalationLevelRaised);
        assert_eq!(out.events[0].affected_entity_id, id);
        assert_eq!(out.events[0].details["entity_id"], "loan-1");
        assert_eq!(
            esc.notifications.last().map(|n| n.recipient.as_str()),
            Some("compliance-officers")
        );
    }

    #[test]
    fn escalating_past_l5_fails() {
        let m = manager();
        let id = m
            .create(report().with_classification(Severity::Critical, Priority::Critical), &at(0, "s"))
            .unwrap()
            .value
            .escalation_id;
        m.escalate(&id, "r", &at(1, "s")).unwrap();
        m.escalate(&id, "r", &at(2, "s")).unwrap();
        let err = m.escalate(&id, "r", &at(3, "s")).unwrap_err();
        assert!(err.to_string().contains("already at highest level"));
        assert_eq!(m.get(&id).unwrap().current_level, EscalationLevel::L5);
    }

    #[test]
    fn terminal_escalations_reject_mutation() {
        let m = manager();
        let id = m.create(report(), &at(0, "s")).unwrap().value.escalation_id;
        m.resolve(&id, "loan restructured", &at(1, "officer")).unwrap();

        for err in [
            m.assign(&id, "x", &at(2, "s")).unwrap_err(),
            m.escalate(&id, "r", &at(2, "s")).unwrap_err(),
            m.add_comment(&id, "late", false, &at(2, "s")).unwrap_err(),
            m.close(&id, "dup", &at(2, "s")).unwrap_err(),
        ] {
            assert!(matches!(err, LceError::InvalidTransition { .. }), "{err}");
        }
        let esc = m.get(&id).unwrap();
        assert_eq!(esc.status, EscalationStatus::Resolved);
        assert_eq!(esc.resolved_at, Some(t0() + Duration::hours(1)));
    }

    #[test]
    fn start_work_requires_assignment() {
        let m = manager();
        let id = m.create(report(), &at(0, "s")).unwrap().value.escalation_id;
        assert!(matches!(
            m.start_work(&id, &at(1, "s")),
            Err(LceError::InvalidTransition { .. })
        ));
        m.assign(&id, "analyst", &at(1, "s")).unwrap();
        let esc = m.start_work(&id, &at(2, "analyst")).unwrap().value;
        assert_eq!(esc.status, EscalationStatus::InProgress);
        assert_eq!(esc.assigned_to.as_deref(), Some("analyst"));
    }

    #[test]
    fn comments_notify_assignee_on_request() {
        let m = manager();
        let id = m.create(report(), &at(0, "s")).unwrap().value.escalation_id;
        m.assign(&id, "analyst", &at(1, "s")).unwrap();
        let before = m.get(&id).unwrap().notifications.len();
        let esc = m
            .add_comment(&id, "customer called", true, &at(2, "lead"))
            .unwrap()
            .value;
        assert_eq!(esc.comments.len(), 1);
        assert_eq!(esc.comments[0].author, "lead");
        let added: Vec<_> = esc.notifications[before..].iter().map(|n| n.recipient.as_str()).collect();
        assert_eq!(added, vec!["analyst", "compliance-analysts"]);
    }

    #[test]
    fn status_index_follows_transitions() {
        let m = manager();
        let id = m.create(report(), &at(0, "s")).unwrap().value.escalation_id;
        assert_eq!(m.list_by_status(EscalationStatus::Open).unwrap().len(), 1);
        m.assign(&id, "a", &at(1, "s")).unwrap();
        assert!(m.list_by_status(EscalationStatus::Open).unwrap().is_empty());
        assert_eq!(m.list_by_status(EscalationStatus::Assigned).unwrap().len(), 1);
        assert_eq!(m.list_for_violation("evt-1").unwrap().len(), 1);
    }

    #[test]
    fn sla_sweep_escalates_overdue_only() {
        let m = manager();
        let late = m.create(report(), &at(0, "s")).unwrap().value.escalation_id;
        let fresh = m
            .create(ViolationReport::new("evt-2", "loan-2", "other"), &at(20, "s"))
            .unwrap()
            .value
            .escalation_id;

        let sweep = at(30, "sla-monitor");
        assert_eq!(m.overdue(&sweep).unwrap().len(), 1);
        let out = m.escalate_overdue(&sweep).unwrap();
        assert_eq!(out.value.len(), 1);
        assert_eq!(out.value[0].escalation_id, late);
        assert_eq!(m.get(&fresh).unwrap().current_level, EscalationLevel::L1);
        assert!(m.overdue(&sweep).unwrap().is_empty());
    }

    /// Memory store whose batch commits fail while any put key contains
    /// the armed fragment.
    #[derive(Default)]
    struct FailingStore {
        inner: MemoryStateStore,
        fail_on: Mutex<Option<String>>,
    }

    impl StateStore for FailingStore {
        fn get(&self, key: &str) -> LceResult<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: Vec<u8>) -> LceResult<()> {
            self.inner.put(key, value)
        }

        fn delete(&self, key: &str) -> LceResult<()> {
            self.inner.delete(key)
        }

        fn scan_prefix(&self, prefix: &str) -> LceResult<Vec<(String, Vec<u8>)>> {
            self.inner.scan_prefix(prefix)
        }

        fn apply(&self, batch: WriteBatch) -> LceResult<()> {
            if let Some(fragment) = self.fail_on.lock().as_deref() {
                let hit = batch
                    .ops()
                    .iter()
                    .any(|op| matches!(op, WriteOp::Put(k, _) if k.contains(fragment)));
                if hit {
                    return Err(LceError::Storage(format!("write to {fragment} refused")));
                }
            }
            self.inner.apply(batch)
        }
    }

    #[test]
    fn sla_sweep_commits_all_raises_or_none() {
        let store = Arc::new(FailingStore::default());
        let m = EscalationManager::new(store.clone());
        let first = m.create(report(), &at(0, "s")).unwrap().value.escalation_id;
        let second = m
            .create(ViolationReport::new("evt-2", "loan-2", "other"), &at(1, "s"))
            .unwrap()
            .value
            .escalation_id;

        let sweep = at(30, "sla-monitor");
        *store.fail_on.lock() = Some(second.clone());
        assert!(matches!(m.escalate_overdue(&sweep), Err(LceError::Storage(_))));
        for id in [&first, &second] {
            let esc = m.get(id).unwrap();
            assert_eq!(esc.current_level, EscalationLevel::L1);
            assert_eq!(esc.status, EscalationStatus::Open);
        }
        assert!(m.list_by_status(EscalationStatus::Escalated).unwrap().is_empty());

        *store.fail_on.lock() = None;
        let out = m.escalate_overdue(&sweep).unwrap();
        assert_eq!(out.value.len(), 2);
        assert_eq!(out.events.len(), 2);
        assert!(out
            .events
            .iter()
            .all(|e| e.event_type == EventType::EscalationLevelRaised));
        assert_eq!(m.list_by_status(EscalationStatus::Escalated).unwrap().len(), 2);
    }

    #[test]
    fn staged_create_writes_nothing_until_applied() {
        let store = MemoryStateStore::shared();
        let m = EscalationManager::new(store.clone());
        let mut batch = WriteBatch::new();
        let out = m.stage_create(report(), &at(0, "s"), &mut batch).unwrap();
        assert_eq!(out.events[0].event_type, EventType::EscalationCreated);
        assert!(matches!(m.get(&out.value.escalation_id), Err(LceError::NotFound { .. })));

        store.apply(batch).unwrap();
        assert_eq!(m.get(&out.value.escalation_id).unwrap(), out.value);
        assert_eq!(m.list_for_violation("evt-1").unwrap().len(), 1);
    }

    #[test]
    fn oversized_sla_config_is_rejected() {
        let mut config = EscalationConfig::default();
        config.sla_hours.l1 = 1e13;
        assert!(EscalationManager::with_config(MemoryStateStore::shared(), config).is_err());
    }

    #[test]
    fn unknown_escalation_is_not_found() {
        assert!(matches!(
            manager().assign("esc-missing", "a", &at(0, "s")),
            Err(LceError::NotFound { .. })
        ));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Assign,
        Escalate,
        Comment,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Assign), Just(Op::Escalate), Just(Op::Comment)]
    }

    proptest! {
        #[test]
        fn level_never_decreases(ops in prop::collection::vec(arb_op(), 1..20)) {
            let m = manager();
            let id = m.create(report(), &at(0, "s")).unwrap().value.escalation_id;
            let mut level = EscalationLevel::L1;
            for (i, op) in ops.iter().enumerate() {
                let ctx = at(i as i64 + 1, "s");
                match op {
                    Op::Assign => { m.assign(&id, "a", &ctx).unwrap(); }
                    Op::Comment => { m.add_comment(&id, "c", true, &ctx).unwrap(); }
                    Op::Escalate => match m.escalate(&id, "r", &ctx) {
                        Ok(out) => {
                            prop_assert!(out.value.due_date > ctx.now());
                        }
                        Err(e) => {
                            prop_assert_eq!(level, EscalationLevel::L5);
                            prop_assert!(matches!(e, LceError::AlreadyAtBoundary { .. }), "expected AlreadyAtBoundary, got {:?}", e);
                        }
                    },
                }
                let now = m.get(&id).unwrap().current_level;
                prop_assert!(now >= level);
                level = now;
            }
        }
    }
}
