//! # Violation Escalation Records
//!
//! A [`ComplianceViolationEscalation`] tracks one rule violation from the
//! moment it is reported until it is resolved or closed. Its level only
//! ever increases and, once the status is Resolved or Closed, the record
//! is read-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lce_core::{LceError, LceResult, Priority, Severity, TxContext};

use crate::level::{EscalationLevel, EscalationStatus};

/// What a caller reports to open an escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationReport {
    /// The violation (usually a compliance event ID).
    pub violation_id: String,
    /// Rule that detected the violation, if any.
    #[serde(default)]
    pub rule_id: Option<String>,
    /// The violating entity.
    pub entity_id: String,
    /// Short title.
    pub title: String,
    /// Full description.
    #[serde(default)]
    pub description: String,
    /// Seriousness.
    #[serde(default)]
    pub severity: Severity,
    /// Urgency.
    #[serde(default)]
    pub priority: Priority,
    /// Business impact statement.
    #[serde(default)]
    pub business_impact: String,
    /// Regulatory impact statement.
    #[serde(default)]
    pub regulatory_impact: String,
}

impl ViolationReport {
    /// A report at default (Medium) severity and priority.
    pub fn new(
        violation_id: impl Into<String>,
        entity_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            violation_id: violation_id.into(),
            rule_id: None,
            entity_id: entity_id.into(),
            title: title.into(),
            description: String::new(),
            severity: Severity::default(),
            priority: Priority::default(),
            business_impact: String::new(),
            regulatory_impact: String::new(),
        }
    }

    /// Builder: attribute the violation to a rule.
    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    /// Builder: set severity and priority.
    pub fn with_classification(mut self, severity: Severity, priority: Priority) -> Self {
        self.severity = severity;
        self.priority = priority;
        self
    }

    /// Builder: set the impact statements.
    pub fn with_impact(
        mut self,
        business: impl Into<String>,
        regulatory: impl Into<String>,
    ) -> Self {
        self.business_impact = business.into();
        self.regulatory_impact = regulatory.into();
        self
    }

    /// Builder: set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// One mutation of an escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationHistoryEntry {
    /// Level before, `None` on creation.
    pub from_level: Option<EscalationLevel>,
    /// Level after.
    pub to_level: EscalationLevel,
    /// Status before, `None` on creation.
    pub from_status: Option<EscalationStatus>,
    /// Status after.
    pub to_status: EscalationStatus,
    /// What happened.
    pub action: String,
    /// Who did it.
    pub actor: String,
    /// When.
    pub timestamp: DateTime<Utc>,
    /// Why.
    pub reason: String,
}

/// A comment on an escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationComment {
    /// Unique comment identifier.
    pub comment_id: String,
    /// Author.
    pub author: String,
    /// Body.
    pub text: String,
    /// When.
    pub created_at: DateTime<Utc>,
}

/// A queued notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique notification identifier.
    pub notification_id: String,
    /// Channel or person to notify.
    pub recipient: String,
    /// Subject line.
    pub subject: String,
    /// Body.
    pub message: String,
    /// When it was queued.
    pub queued_at: DateTime<Utc>,
}

/// A remediation step taken on an escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionAction {
    /// Unique action identifier.
    pub action_id: String,
    /// What was done.
    pub description: String,
    /// Who did it.
    pub performed_by: String,
    /// When.
    pub performed_at: DateTime<Utc>,
}

/// A tracked, multi-level incident raised from a rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceViolationEscalation {
    /// Unique escalation identifier.
    pub escalation_id: String,
    /// The violation being escalated.
    pub violation_id: String,
    /// Rule that detected it.
    pub rule_id: Option<String>,
    /// The violating entity.
    pub entity_id: String,
    /// Short title.
    pub title: String,
    /// Full description.
    pub description: String,
    /// Seriousness.
    pub severity: Severity,
    /// Urgency; raised one step on every escalation.
    pub priority: Priority,
    /// Business impact statement.
    pub business_impact: String,
    /// Regulatory impact statement.
    pub regulatory_impact: String,
    /// Current tier.
    pub current_level: EscalationLevel,
    /// Handling status.
    pub status: EscalationStatus,
    /// Current handler.
    pub assigned_to: Option<String>,
    /// SLA deadline at the current level.
    pub due_date: DateTime<Utc>,
    /// Weighted risk in `[0, 1]`.
    pub risk_score: f64,
    /// Every mutation, oldest first.
    pub escalation_history: Vec<EscalationHistoryEntry>,
    /// Comments, oldest first.
    pub comments: Vec<EscalationComment>,
    /// Queued notifications, oldest first.
    pub notifications: Vec<Notification>,
    /// Remediation steps, oldest first.
    pub resolution_actions: Vec<ResolutionAction>,
    /// Resolution summary or closing reason.
    pub resolution: Option<String>,
    /// Who opened it.
    pub created_by: String,
    /// When it was opened.
    pub created_at: DateTime<Utc>,
    /// When it was last mutated.
    pub updated_at: DateTime<Utc>,
    /// When it was resolved or closed.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ComplianceViolationEscalation {
    /// Whether the SLA deadline has passed at `at` on an open escalation.
    pub fn is_overdue(&self, at: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && at > self.due_date
    }

    /// Fail with `InvalidTransition` if the escalation is Resolved or
    /// Closed.
    pub fn ensure_mutable(&self, attempted: &str) -> LceResult<()> {
        if self.status.is_terminal() {
            return Err(LceError::invalid_transition(
                format!("escalation {}", self.escalation_id),
                self.status,
                attempted,
                "escalation is closed to further changes",
            ));
        }
        Ok(())
    }

    /// Append a history entry for the current level and status.
    pub(crate) fn record_transition(
        &mut self,
        from_level: Option<EscalationLevel>,
        from_status: Option<EscalationStatus>,
        action: &str,
        reason: &str,
        ctx: &TxContext,
    ) {
        self.escalation_history.push(EscalationHistoryEntry {
            from_level,
            to_level: self.current_level,
            from_status,
            to_status: self.status,
            action: action.to_string(),
            actor: ctx.actor().to_string(),
            timestamp: ctx.now(),
            reason: reason.to_string(),
        });
        self.updated_at = ctx.now();
    }

    /// Queue a notification for `recipient`.
    pub(crate) fn queue_notification(
        &mut self,
        recipient: String,
        subject: String,
        message: String,
        ctx: &TxContext,
    ) {
        tracing::debug!(escalation_id = %self.escalation_id, recipient = %recipient, "notification queued");
        self.notifications.push(Notification {
            notification_id: ctx.next_id("ntf"),
            recipient,
            subject,
            message,
            queued_at: ctx.now(),
        });
    }
}
