//! # Compliance Events
//!
//! Durable records of everything the engine and the screening sub-engine
//! produce: rule executions and violations, lifecycle transitions,
//! escalations, AML verdicts.
//!
//! Engine operations never emit as a side effect. They return an
//! [`Outcome`] carrying the value and the events the call produced; the
//! orchestrating caller forwards them through an [`EventPublisher`], which
//! records each event in the [`EventLog`] and hands it to the external
//! [`EventSink`]. Events are never deleted; only acknowledgement and
//! resolution status change after creation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::classification::Severity;
use crate::error::{LceError, LceResult};
use crate::store::{composite_key, get_json, key_prefix, scan_keys, SharedStore, WriteBatch};
use crate::temporal::TxContext;

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A rule was evaluated.
    RuleExecuted,
    /// A rule evaluated to `passed=false`.
    RuleViolationDetected,
    /// A rule was created in Draft.
    RuleCreated,
    /// A new version of a rule was created.
    RuleAmended,
    /// A rule was submitted for approval.
    RuleSubmittedForApproval,
    /// A rule was approved and activated.
    RuleApproved,
    /// A rule approval request was rejected.
    RuleRejected,
    /// A rule was deprecated by a newly approved rule.
    RuleSuperseded,
    /// A rule was taken out of service.
    RuleDeactivated,
    /// A rule was soft-deleted.
    RuleDeprecated,
    /// A violation escalation was opened.
    EscalationCreated,
    /// An escalation was assigned.
    EscalationAssigned,
    /// Work started on an escalation.
    EscalationInProgress,
    /// An escalation moved up a level.
    EscalationLevelRaised,
    /// A comment was added to an escalation.
    EscalationCommentAdded,
    /// A remediation step was recorded on an escalation.
    EscalationActionRecorded,
    /// An escalation was resolved.
    EscalationResolved,
    /// An escalation was closed administratively.
    EscalationClosed,
    /// An AML check finished.
    AmlCheckCompleted,
    /// An AML check's status changed.
    AmlStatusChanged,
}

impl EventType {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleExecuted => "RULE_EXECUTED",
            Self::RuleViolationDetected => "RULE_VIOLATION_DETECTED",
            Self::RuleCreated => "RULE_CREATED",
            Self::RuleAmended => "RULE_AMENDED",
            Self::RuleSubmittedForApproval => "RULE_SUBMITTED_FOR_APPROVAL",
            Self::RuleApproved => "RULE_APPROVED",
            Self::RuleRejected => "RULE_REJECTED",
            Self::RuleSuperseded => "RULE_SUPERSEDED",
            Self::RuleDeactivated => "RULE_DEACTIVATED",
            Self::RuleDeprecated => "RULE_DEPRECATED",
            Self::EscalationCreated => "ESCALATION_CREATED",
            Self::EscalationAssigned => "ESCALATION_ASSIGNED",
            Self::EscalationInProgress => "ESCALATION_IN_PROGRESS",
            Self::EscalationLevelRaised => "ESCALATION_LEVEL_RAISED",
            Self::EscalationCommentAdded => "ESCALATION_COMMENT_ADDED",
            Self::EscalationActionRecorded => "ESCALATION_ACTION_RECORDED",
            Self::EscalationResolved => "ESCALATION_RESOLVED",
            Self::EscalationClosed => "ESCALATION_CLOSED",
            Self::AmlCheckCompleted => "AML_CHECK_COMPLETED",
            Self::AmlStatusChanged => "AML_STATUS_CHANGED",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ResolutionStatus
// ---------------------------------------------------------------------------

/// Follow-up state of an event.
///
/// Moves forward only: `Open → InProgress → Resolved → Closed`, with
/// `Open → Resolved` and `* → Closed` shortcuts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResolutionStatus {
    /// Nobody has acted on the event.
    #[default]
    Open,
    /// Follow-up is under way.
    InProgress,
    /// Follow-up finished.
    Resolved,
    /// Archived. Terminal.
    Closed,
}

impl ResolutionStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::InProgress => "InProgress",
            Self::Resolved => "Resolved",
            Self::Closed => "Closed",
        }
    }

    /// Whether `self → to` is permitted.
    pub fn can_transition_to(&self, to: ResolutionStatus) -> bool {
        *self != Self::Closed && to > *self
    }
}

impl std::fmt::Display for ResolutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ComplianceEvent
// ---------------------------------------------------------------------------

/// A durable record of an engine outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceEvent {
    /// Unique event identifier.
    pub event_id: String,
    /// Rule that produced the event, if any.
    pub rule_id: Option<String>,
    /// Version of that rule.
    pub rule_version: Option<u32>,
    /// Identifier of the affected entity.
    pub affected_entity_id: String,
    /// Kind of the affected entity (e.g. "LoanApplication").
    pub affected_entity_type: String,
    /// What happened.
    pub event_type: EventType,
    /// How serious it is.
    pub severity: Severity,
    /// Human-readable summary.
    pub description: String,
    /// Structured payload (e.g. the embedded execution result).
    pub details: serde_json::Value,
    /// Whether the event warrants an alert.
    pub is_alerted: bool,
    /// Follow-up state.
    pub resolution_status: ResolutionStatus,
    /// Who acknowledged the event.
    pub acknowledged_by: Option<String>,
    /// When the event was acknowledged.
    pub acknowledged_date: Option<DateTime<Utc>>,
    /// Who last moved the resolution status.
    pub resolved_by: Option<String>,
    /// When the resolution status last moved.
    pub resolved_date: Option<DateTime<Utc>>,
    /// Actor of the call that produced the event.
    pub actor: String,
    /// Logical time of the producing call.
    pub timestamp: DateTime<Utc>,
}

impl ComplianceEvent {
    /// Create an event stamped with the context's time, actor and a fresh ID.
    ///
    /// `is_alerted` defaults to `severity >= High`.
    pub fn new(
        ctx: &TxContext,
        event_type: EventType,
        affected_entity_id: impl Into<String>,
        affected_entity_type: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            event_id: ctx.next_id("evt"),
            rule_id: None,
            rule_version: None,
            affected_entity_id: affected_entity_id.into(),
            affected_entity_type: affected_entity_type.into(),
            event_type,
            severity,
            description: description.into(),
            details: serde_json::Value::Null,
            is_alerted: severity >= Severity::High,
            resolution_status: ResolutionStatus::Open,
            acknowledged_by: None,
            acknowledged_date: None,
            resolved_by: None,
            resolved_date: None,
            actor: ctx.actor().to_string(),
            timestamp: ctx.now(),
        }
    }

    /// Builder: attribute the event to a rule version.
    pub fn with_rule(mut self, rule_id: impl Into<String>, version: u32) -> Self {
        self.rule_id = Some(rule_id.into());
        self.rule_version = Some(version);
        self
    }

    /// Builder: attach a structured payload.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Builder: override the alert flag.
    pub fn alerted(mut self, is_alerted: bool) -> Self {
        self.is_alerted = is_alerted;
        self
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// A value together with the events its producing call generated.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    /// The operation's return value.
    pub value: T,
    /// Events to forward to the sink, in production order.
    pub events: Vec<ComplianceEvent>,
}

impl<T> Outcome<T> {
    /// Wrap a value with its events.
    pub fn new(value: T, events: Vec<ComplianceEvent>) -> Self {
        Self { value, events }
    }

    /// Wrap a value that produced no events.
    pub fn quiet(value: T) -> Self {
        Self {
            value,
            events: Vec::new(),
        }
    }

    /// Transform the value, keeping the events.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            events: self.events,
        }
    }

    /// Move this outcome's events onto `events`, returning the value.
    pub fn drain_into(self, events: &mut Vec<ComplianceEvent>) -> T {
        events.extend(self.events);
        self.value
    }

    /// Forward the events through `publisher` and return the value.
    pub fn publish(self, publisher: &EventPublisher) -> LceResult<T> {
        publisher.publish(&self.events)?;
        Ok(self.value)
    }
}

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

/// External consumer of compliance events.
pub trait EventSink: Send + Sync {
    /// Publish one event. An error is surfaced to the engine's caller.
    fn emit(&self, event: &ComplianceEvent) -> LceResult<()>;
}

/// Sink that buffers events in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<ComplianceEvent>>,
}

impl MemoryEventSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<ComplianceEvent> {
        self.events.lock().clone()
    }

    /// Remove and return everything emitted so far.
    pub fn drain(&self) -> Vec<ComplianceEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: &ComplianceEvent) -> LceResult<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Sink that writes events to the `tracing` pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &ComplianceEvent) -> LceResult<()> {
        tracing::info!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            severity = %event.severity,
            entity = %event.affected_entity_id,
            alerted = event.is_alerted,
            "{}",
            event.description
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

const EVENT: &str = "event";
const EVENT_BY_ENTITY: &str = "event-entity";
const EVENT_BY_RULE: &str = "event-rule";

/// Durable, append-only store of compliance events.
#[derive(Clone)]
pub struct EventLog {
    store: SharedStore,
}

impl EventLog {
    /// Create a log over the given store.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Persist new events. An event ID that already exists is rejected and
    /// nothing from the call is written.
    pub fn record(&self, events: &[ComplianceEvent]) -> LceResult<()> {
        let mut batch = WriteBatch::new();
        for event in events {
            let key = composite_key(EVENT, &[&event.event_id]);
            if self.store.get(&key)?.is_some() {
                return Err(LceError::validation(format!(
                    "event {} already recorded",
                    event.event_id
                )));
            }
            batch.put_json(key, event)?;
            batch.put_marker(composite_key(
                EVENT_BY_ENTITY,
                &[&event.affected_entity_id, &event.event_id],
            ));
            if let Some(rule_id) = &event.rule_id {
                batch.put_marker(composite_key(EVENT_BY_RULE, &[rule_id, &event.event_id]));
            }
        }
        self.store.apply(batch)
    }

    /// Fetch one event.
    pub fn get(&self, event_id: &str) -> LceResult<ComplianceEvent> {
        get_json(self.store.as_ref(), &composite_key(EVENT, &[event_id]))?
            .ok_or_else(|| LceError::not_found("event", event_id))
    }

    /// Mark an event acknowledged by the context's actor.
    pub fn acknowledge(&self, event_id: &str, ctx: &TxContext) -> LceResult<ComplianceEvent> {
        let mut event = self.get(event_id)?;
        if let Some(by) = &event.acknowledged_by {
            return Err(LceError::AlreadyAtBoundary {
                id: event_id.to_string(),
                reason: format!("already acknowledged by {by}"),
            });
        }
        event.acknowledged_by = Some(ctx.actor().to_string());
        event.acknowledged_date = Some(ctx.now());
        self.overwrite(&event)?;
        Ok(event)
    }

    /// Move an event's resolution status forward.
    pub fn update_resolution(
        &self,
        event_id: &str,
        status: ResolutionStatus,
        ctx: &TxContext,
    ) -> LceResult<ComplianceEvent> {
        let mut event = self.get(event_id)?;
        if !event.resolution_status.can_transition_to(status) {
            return Err(LceError::invalid_transition(
                format!("event {event_id}"),
                event.resolution_status,
                status,
                "resolution status only moves forward",
            ));
        }
        event.resolution_status = status;
        event.resolved_by = Some(ctx.actor().to_string());
        event.resolved_date = Some(ctx.now());
        self.overwrite(&event)?;
        Ok(event)
    }

    /// Events affecting an entity, ordered by event ID.
    pub fn list_for_entity(&self, entity_id: &str) -> LceResult<Vec<ComplianceEvent>> {
        self.list_indexed(&key_prefix(EVENT_BY_ENTITY, &[entity_id]))
    }

    /// Events produced by a rule, ordered by event ID.
    pub fn list_for_rule(&self, rule_id: &str) -> LceResult<Vec<ComplianceEvent>> {
        self.list_indexed(&key_prefix(EVENT_BY_RULE, &[rule_id]))
    }

    fn list_indexed(&self, prefix: &str) -> LceResult<Vec<ComplianceEvent>> {
        let mut out = Vec::new();
        for event_id in scan_keys(self.store.as_ref(), prefix)? {
            match self.get(&event_id) {
                Ok(e) => out.push(e),
                Err(e) => tracing::warn!(event_id = %event_id, error = %e, "skipping unreadable index entry"),
            }
        }
        Ok(out)
    }

    fn overwrite(&self, event: &ComplianceEvent) -> LceResult<()> {
        let mut batch = WriteBatch::new();
        batch.put_json(composite_key(EVENT, &[&event.event_id]), event)?;
        self.store.apply(batch)
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// EventPublisher
// ---------------------------------------------------------------------------

/// Records events in the log, then forwards them to the sink.
#[derive(Clone)]
pub struct EventPublisher {
    log: EventLog,
    sink: Arc<dyn EventSink>,
}

impl EventPublisher {
    /// Create a publisher.
    pub fn new(log: EventLog, sink: Arc<dyn EventSink>) -> Self {
        Self { log, sink }
    }

    /// The underlying event log.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Record and emit events in order. A sink failure is returned after
    /// the events have been recorded.
    pub fn publish(&self, events: &[ComplianceEvent]) -> LceResult<()> {
        self.log.record(events)?;
        for event in events {
            self.sink.emit(event)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStateStore;
    use chrono::TimeZone;

    fn ctx(actor: &str) -> TxContext {
        TxContext::new("tx-events", Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap(), actor)
    }

    fn sample(ctx: &TxContext, severity: Severity) -> ComplianceEvent {
        ComplianceEvent::new(
            ctx,
            EventType::RuleViolationDetected,
            "loan-1",
            "LoanApplication",
            severity,
            "amount above limit",
        )
        .with_rule("R1", 2)
    }

    #[test]
    fn new_event_defaults() {
        let c = ctx("engine");
        let e = sample(&c, Severity::High);
        assert!(e.is_alerted);
        assert_eq!(e.resolution_status, ResolutionStatus::Open);
        assert_eq!(e.rule_version, Some(2));
        assert_eq!(e.actor, "engine");
        assert!(!sample(&c, Severity::Low).is_alerted);
    }

    #[test]
    fn event_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&EventType::AmlCheckCompleted).unwrap();
        assert_eq!(json, "\"AML_CHECK_COMPLETED\"");
    }

    #[test]
    fn resolution_only_moves_forward() {
        assert!(ResolutionStatus::Open.can_transition_to(ResolutionStatus::InProgress));
        assert!(ResolutionStatus::Open.can_transition_to(ResolutionStatus::Closed));
        assert!(!ResolutionStatus::Resolved.can_transition_to(ResolutionStatus::Open));
        assert!(!ResolutionStatus::Closed.can_transition_to(ResolutionStatus::Closed));
    }

    #[test]
    fn publisher_records_and_emits() {
        let store = MemoryStateStore::shared();
        let sink = Arc::new(MemoryEventSink::new());
        let publisher = EventPublisher::new(EventLog::new(store), sink.clone());
        let c = ctx("engine");
        let outcome = Outcome::new(7, vec![sample(&c, Severity::High), sample(&c, Severity::Low)]);

        let value = outcome.publish(&publisher).unwrap();
        assert_eq!(value, 7);
        assert_eq!(sink.events().len(), 2);
        assert_eq!(publisher.log().list_for_entity("loan-1").unwrap().len(), 2);
        assert_eq!(publisher.log().list_for_rule("R1").unwrap().len(), 2);
    }

    #[test]
    fn duplicate_event_rejected_without_partial_write() {
        let log = EventLog::new(MemoryStateStore::shared());
        let c = ctx("engine");
        let e = sample(&c, Severity::High);
        log.record(std::slice::from_ref(&e)).unwrap();

        let fresh = sample(&c, Severity::Low);
        let err = log.record(&[fresh.clone(), e]).unwrap_err();
        assert!(matches!(err, LceError::Validation(_)));
        assert!(log.get(&fresh.event_id).is_err());
    }

    #[test]
    fn acknowledge_once() {
        let log = EventLog::new(MemoryStateStore::shared());
        let c = ctx("engine");
        let e = sample(&c, Severity::High);
        log.record(std::slice::from_ref(&e)).unwrap();

        let acked = log.acknowledge(&e.event_id, &ctx("officer-7")).unwrap();
        assert_eq!(acked.acknowledged_by.as_deref(), Some("officer-7"));
        let again = log.acknowledge(&e.event_id, &ctx("officer-8")).unwrap_err();
        assert!(matches!(again, LceError::AlreadyAtBoundary { .. }));
    }

    #[test]
    fn update_resolution_rejects_backwards() {
        let log = EventLog::new(MemoryStateStore::shared());
        let c = ctx("engine");
        let e = sample(&c, Severity::High);
        log.record(std::slice::from_ref(&e)).unwrap();

        let resolved = log
            .update_resolution(&e.event_id, ResolutionStatus::Resolved, &ctx("officer"))
            .unwrap();
        assert_eq!(resolved.resolution_status, ResolutionStatus::Resolved);
        let err = log
            .update_resolution(&e.event_id, ResolutionStatus::InProgress, &ctx("officer"))
            .unwrap_err();
        assert!(matches!(err, LceError::InvalidTransition { .. }));
    }

    #[test]
    fn get_missing_event_is_not_found() {
        let log = EventLog::new(MemoryStateStore::shared());
        assert!(matches!(log.get("evt-x"), Err(LceError::NotFound { .. })));
    }
}
