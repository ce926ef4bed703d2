//! # Error Hierarchy
//!
//! Structured error types for the compliance engine, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.
//!
//! Every variant carries the identifiers an operator needs to act on the
//! failure: the rule, request, escalation, or check involved, the state at
//! the time of failure, and the reason for rejection.

use thiserror::Error;

/// Convenience alias used throughout the engine crates.
pub type LceResult<T> = Result<T, LceError>;

/// Top-level error type for the compliance engine.
#[derive(Error, Debug)]
pub enum LceError {
    /// Missing or invalid fields, enum violations, date ordering.
    #[error("validation error: {0}")]
    Validation(String),

    /// A rule, request, escalation, check, or reference entry is absent.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// The kind of record that was looked up (e.g. "rule").
        kind: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// A self-dependency or dependency cycle was detected.
    #[error("circular dependency detected: {}", path.join(" -> "))]
    CircularDependency {
        /// The rules participating in the cycle, in traversal order.
        path: Vec<String>,
    },

    /// A prerequisite rule did not pass.
    #[error("rule {rule_id} blocked: dependency {dependency_id} failed ({reason})")]
    DependencyFailed {
        /// The rule whose evaluation was blocked.
        rule_id: String,
        /// The prerequisite that failed.
        dependency_id: String,
        /// Why the prerequisite failed.
        reason: String,
    },

    /// A state machine or AML status transition is not permitted.
    #[error("invalid {entity} transition from {from} to {to}: {reason}")]
    InvalidTransition {
        /// The record kind and identifier (e.g. "escalation esc-1").
        entity: String,
        /// The current state name.
        from: String,
        /// The attempted target state name.
        to: String,
        /// Human-readable reason for the rejection.
        reason: String,
    },

    /// Evaluator type or operator not recognized, or malformed logic payload.
    #[error("unsupported logic in rule {rule_id}: {reason}")]
    UnsupportedLogic {
        /// The rule carrying the logic payload.
        rule_id: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// An operation would move past the edge of a lifecycle.
    #[error("{id}: {reason}")]
    AlreadyAtBoundary {
        /// The record the operation targeted.
        id: String,
        /// Which boundary was hit.
        reason: String,
    },

    /// The rule exists but is not active and validated at the call time.
    #[error("rule {rule_id} is not executable: {reason}")]
    NotExecutable {
        /// The rule that was requested.
        rule_id: String,
        /// Why it cannot be executed.
        reason: String,
    },

    /// The storage collaborator failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LceError {
    /// Build a [`LceError::Validation`] from anything displayable.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`LceError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Build a [`LceError::InvalidTransition`].
    pub fn invalid_transition(
        entity: impl Into<String>,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            entity: entity.into(),
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_kind_and_id() {
        let err = LceError::not_found("rule", "R-404");
        assert_eq!(format!("{err}"), "rule not found: R-404");
    }

    #[test]
    fn circular_dependency_display_joins_path() {
        let err = LceError::CircularDependency {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert!(format!("{err}").contains("A -> B -> A"));
    }

    #[test]
    fn dependency_failed_names_dependency() {
        let err = LceError::DependencyFailed {
            rule_id: "B".into(),
            dependency_id: "A".into(),
            reason: "did not pass".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("dependency A failed"));
        assert!(msg.contains("rule B"));
    }

    #[test]
    fn invalid_transition_display() {
        let err = LceError::invalid_transition("aml check c-1", "BLOCKED", "CLEAR", "not permitted");
        let msg = format!("{err}");
        assert!(msg.contains("BLOCKED"));
        assert!(msg.contains("CLEAR"));
        assert!(msg.contains("aml check c-1"));
    }

    #[test]
    fn validation_display() {
        let err = LceError::validation("rule must have at least one test case");
        assert!(format!("{err}").contains("test case"));
    }

    #[test]
    fn serialization_from_serde_error() {
        let bad: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: LceError = bad.unwrap_err().into();
        assert!(matches!(err, LceError::Serialization(_)));
    }
}
