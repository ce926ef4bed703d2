//! # lce-escalation — Violation Escalation Manager
//!
//! Turns a rule violation into a tracked incident with five escalation
//! levels, SLA deadlines, assignment, comments, notifications and
//! remediation records.
//!
//! ## SLA
//!
//! | level | base hours | default channel |
//! |-------|-----------:|-----------------|
//! | L1 | 24 | compliance-analysts |
//! | L2 | 48 | compliance-officers |
//! | L3 | 72 | compliance-managers |
//! | L4 | 120 | chief-compliance-officer |
//! | L5 | 240 | executive-board |
//!
//! The base is scaled by priority (Critical 0.5, High 0.75, Medium 1.0,
//! Low 1.5). Escalating also raises the priority one step, so an L1
//! Medium escalation raised to L2 is due 36 hours after the call.

pub mod config;
pub mod escalation;
pub mod level;
pub mod manager;
pub mod scoring;

pub use config::EscalationConfig;
pub use escalation::{
    ComplianceViolationEscalation, EscalationComment, EscalationHistoryEntry, Notification,
    ResolutionAction, ViolationReport,
};
pub use level::{EscalationLevel, EscalationStatus};
pub use manager::EscalationManager;
pub use scoring::{due_date, impact_weight, risk_score};
