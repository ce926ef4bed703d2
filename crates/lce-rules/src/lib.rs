//! # lce-rules — Compliance Rules, Engine and Approval
//!
//! Rules are versioned policy units stored in the ledger's key/value state.
//! This crate persists them ([`store`]), evaluates them in dependency order
//! ([`engine`], [`graph`], [`logic`]) and drives their lifecycle from draft
//! to active ([`approval`]). Default policy ships as data ([`pack`]).
//!
//! ## Flow
//!
//! ```text
//!   RuleDraft ──ApprovalWorkflow──▶ RuleStore ◀──RuleEngine── EntityData
//!                    │                              │
//!                    └──────── Outcome<T> ──────────┘
//!                              (value + events)
//! ```
//!
//! No operation reads the clock or emits events directly. Callers pass a
//! [`lce_core::TxContext`] and forward the returned events.

pub mod approval;
pub mod engine;
pub mod graph;
pub mod logic;
pub mod pack;
pub mod rule;
pub mod store;
pub mod validation;

pub use approval::{ApprovalHistoryEntry, ApprovalWorkflow, RequestStatus, RuleApprovalRequest};
pub use engine::{RuleEngine, RuleExecutionResult};
pub use graph::DependencyGraph;
pub use logic::{RuleLogic, ThresholdOperator};
pub use pack::RulePack;
pub use rule::{ComplianceRule, ExecutionMode, RuleDraft, RuleStatus, TestCase, ValidationResult};
pub use store::RuleStore;
