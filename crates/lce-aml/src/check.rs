//! AML check records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lce_core::{LceError, Severity};

use crate::config::ScreeningConfig;
use crate::risk::RiskFactor;
use crate::screening::ScreenResult;
use crate::status::AmlStatus;

/// Why a check was run. Determines how long the result stays valid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckType {
    /// First screening of a new customer.
    #[default]
    Onboarding,
    /// Scheduled re-screening.
    PeriodicReview,
    /// Triggered by a transaction.
    TransactionBased,
    /// Triggered by a change in the customer's risk.
    RiskReassessment,
}

impl CheckType {
    /// All check types.
    pub const ALL: [Self; 4] = [
        Self::Onboarding,
        Self::PeriodicReview,
        Self::TransactionBased,
        Self::RiskReassessment,
    ];

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onboarding => "Onboarding",
            Self::PeriodicReview => "PeriodicReview",
            Self::TransactionBased => "TransactionBased",
            Self::RiskReassessment => "RiskReassessment",
        }
    }

    /// Days a check of this type stays valid.
    pub fn validity_days(&self, config: &ScreeningConfig) -> i64 {
        let v = &config.validity_days;
        match self {
            Self::Onboarding => v.onboarding,
            Self::PeriodicReview => v.periodic_review,
            Self::TransactionBased => v.transaction_based,
            Self::RiskReassessment => v.risk_reassessment,
        }
    }
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CheckType {
    type Err = LceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| c.is_alphanumeric()).collect();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| LceError::validation(format!("unknown check type: {s}")))
    }
}

/// Kind of follow-up a high-risk result demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// Review the sanction match.
    SanctionReview,
    /// Senior approval of a PEP relationship.
    PepApproval,
    /// Put the customer under enhanced monitoring.
    EnhancedMonitoring,
}

/// A time-boxed follow-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredAction {
    /// What to do.
    pub action_type: ActionType,
    /// Instructions.
    pub description: String,
    /// Deadline.
    pub due_date: DateTime<Utc>,
}

/// One status change on a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Previous status, `None` for the initial verdict.
    pub from: Option<AmlStatus>,
    /// New status.
    pub to: AmlStatus,
    /// Why.
    pub reason: String,
    /// Who.
    pub actor: String,
    /// When.
    pub timestamp: DateTime<Utc>,
}

/// Result of screening one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmlCheckResult {
    /// Unique check identifier.
    pub check_id: String,
    /// Screened customer.
    pub customer_id: String,
    /// Why the check was run.
    pub check_type: CheckType,
    /// Weighted score in `[0, 1]`.
    pub overall_risk_score: f64,
    /// Ordinal reading of the score.
    pub risk_level: Severity,
    /// Current verdict.
    pub status: AmlStatus,
    /// Sanction list screening.
    pub sanction_screen_result: ScreenResult,
    /// PEP list screening.
    pub pep_screen_result: ScreenResult,
    /// Assessed risk factors.
    pub risk_factors: Vec<RiskFactor>,
    /// Advice for the reviewer.
    pub recommendations: Vec<String>,
    /// Time-boxed follow-ups.
    pub required_actions: Vec<RequiredAction>,
    /// Escalation opened for a High or Critical result.
    pub escalation_id: Option<String>,
    /// Who ran the check.
    pub checked_by: String,
    /// When the check ran.
    pub checked_at: DateTime<Utc>,
    /// When the check must be repeated.
    pub expiry_date: DateTime<Utc>,
    /// Every status the check has had, oldest first.
    pub status_history: Vec<StatusChange>,
}

impl AmlCheckResult {
    /// Whether the check has lapsed at `at`.
    pub fn is_expired(&self, at: DateTime<Utc>) -> bool {
        at >= self.expiry_date
    }

    /// Whether either list matched.
    pub fn has_list_match(&self) -> bool {
        self.sanction_screen_result.is_match || self.pep_screen_result.is_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_per_type() {
        let c = ScreeningConfig::default();
        let days: Vec<_> = CheckType::ALL.iter().map(|t| t.validity_days(&c)).collect();
        assert_eq!(days, vec![365, 365, 180, 90]);
    }

    #[test]
    fn check_type_parses_loosely() {
        assert_eq!("periodic-review".parse::<CheckType>().unwrap(), CheckType::PeriodicReview);
        assert_eq!("transaction_based".parse::<CheckType>().unwrap(), CheckType::TransactionBased);
        assert!("annual".parse::<CheckType>().is_err());
    }
}
