//! AML status and its transition table.
//!
//! ```text
//!   Clear     → Flagged | Reviewing
//!   Flagged   → Clear | Reviewing | Blocked
//!   Reviewing → Clear | Flagged | Blocked
//!   Blocked   → Reviewing
//! ```

use serde::{Deserialize, Serialize};

use lce_core::{LceError, Severity};

/// Screening verdict on a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AmlStatus {
    /// No concern.
    Clear,
    /// High risk; under watch.
    Flagged,
    /// A list match needs analyst review.
    Reviewing,
    /// Critical risk; business with the customer is stopped.
    Blocked,
}

impl AmlStatus {
    /// All statuses.
    pub const ALL: [Self; 4] = [Self::Clear, Self::Flagged, Self::Reviewing, Self::Blocked];

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::Flagged => "Flagged",
            Self::Reviewing => "Reviewing",
            Self::Blocked => "Blocked",
        }
    }

    /// Statuses reachable from this one.
    pub fn allowed_transitions(&self) -> &'static [AmlStatus] {
        match self {
            Self::Clear => &[Self::Flagged, Self::Reviewing],
            Self::Flagged => &[Self::Clear, Self::Reviewing, Self::Blocked],
            Self::Reviewing => &[Self::Clear, Self::Flagged, Self::Blocked],
            Self::Blocked => &[Self::Reviewing],
        }
    }

    /// Whether `self → to` is in the table. A status never moves to itself.
    pub fn can_transition_to(&self, to: AmlStatus) -> bool {
        self.allowed_transitions().contains(&to)
    }

    /// Initial status for a screening verdict.
    ///
    /// Critical blocks, High flags, a list match below High goes to review.
    pub fn for_verdict(level: Severity, list_match: bool) -> Self {
        match level {
            Severity::Critical => Self::Blocked,
            Severity::High => Self::Flagged,
            _ if list_match => Self::Reviewing,
            _ => Self::Clear,
        }
    }
}

impl std::fmt::Display for AmlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AmlStatus {
    type Err = LceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LceError::validation(format!("unknown AML status: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AmlStatus::*;

    #[test]
    fn table_is_exact() {
        let allowed = [
            (Clear, Flagged),
            (Clear, Reviewing),
            (Flagged, Clear),
            (Flagged, Reviewing),
            (Flagged, Blocked),
            (Reviewing, Clear),
            (Reviewing, Flagged),
            (Reviewing, Blocked),
            (Blocked, Reviewing),
        ];
        for from in AmlStatus::ALL {
            for to in AmlStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn verdict_mapping() {
        assert_eq!(AmlStatus::for_verdict(Severity::Critical, false), Blocked);
        assert_eq!(AmlStatus::for_verdict(Severity::High, true), Flagged);
        assert_eq!(AmlStatus::for_verdict(Severity::Medium, true), Reviewing);
        assert_eq!(AmlStatus::for_verdict(Severity::Low, false), Clear);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("blocked".parse::<AmlStatus>().unwrap(), Blocked);
        assert!("frozen".parse::<AmlStatus>().is_err());
    }
}
