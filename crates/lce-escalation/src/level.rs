//! Escalation levels and statuses.

use serde::{Deserialize, Serialize};

use lce_core::{Priority, Severity};

/// Escalation tier, totally ordered `L1 < L2 < L3 < L4 < L5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EscalationLevel {
    /// Analyst desk.
    L1,
    /// Compliance officer.
    L2,
    /// Compliance management.
    L3,
    /// Chief compliance officer.
    L4,
    /// Executive board.
    L5,
}

impl EscalationLevel {
    /// All levels, lowest first.
    pub const ALL: [Self; 5] = [Self::L1, Self::L2, Self::L3, Self::L4, Self::L5];

    /// The highest level.
    pub const HIGHEST: Self = Self::L5;

    /// Starting level for a new escalation.
    ///
    /// Critical severity or priority starts at L3, High at L2, anything
    /// else at L1.
    pub fn initial(severity: Severity, priority: Priority) -> Self {
        if severity == Severity::Critical || priority == Priority::Critical {
            Self::L3
        } else if severity == Severity::High || priority == Priority::High {
            Self::L2
        } else {
            Self::L1
        }
    }

    /// The next level up, or `None` at L5.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::L1 => Some(Self::L2),
            Self::L2 => Some(Self::L3),
            Self::L3 => Some(Self::L4),
            Self::L4 => Some(Self::L5),
            Self::L5 => None,
        }
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::L4 => "L4",
            Self::L5 => "L5",
        }
    }
}

impl std::fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handling status of an escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscalationStatus {
    /// Created, nobody assigned.
    Open,
    /// Assigned to a handler.
    Assigned,
    /// The handler is working on it.
    InProgress,
    /// Moved up a level; waiting for reassignment.
    Escalated,
    /// Handled. Terminal.
    Resolved,
    /// Closed administratively. Terminal.
    Closed,
}

impl EscalationStatus {
    /// All statuses.
    pub const ALL: [Self; 6] = [
        Self::Open,
        Self::Assigned,
        Self::InProgress,
        Self::Escalated,
        Self::Resolved,
        Self::Closed,
    ];

    /// Whether no further mutation is permitted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Assigned => "Assigned",
            Self::InProgress => "InProgress",
            Self::Escalated => "Escalated",
            Self::Resolved => "Resolved",
            Self::Closed => "Closed",
        }
    }
}

impl std::fmt::Display for EscalationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_level_selection() {
        assert_eq!(EscalationLevel::initial(Severity::Critical, Priority::Low), EscalationLevel::L3);
        assert_eq!(EscalationLevel::initial(Severity::Low, Priority::Critical), EscalationLevel::L3);
        assert_eq!(EscalationLevel::initial(Severity::High, Priority::Medium), EscalationLevel::L2);
        assert_eq!(EscalationLevel::initial(Severity::Medium, Priority::High), EscalationLevel::L2);
        assert_eq!(EscalationLevel::initial(Severity::Medium, Priority::Medium), EscalationLevel::L1);
    }

    #[test]
    fn levels_are_ordered_and_bounded() {
        assert!(EscalationLevel::L1 < EscalationLevel::L5);
        assert_eq!(EscalationLevel::L4.next(), Some(EscalationLevel::L5));
        assert_eq!(EscalationLevel::HIGHEST.next(), None);
    }

    #[test]
    fn terminal_statuses() {
        let terminal: Vec<_> = EscalationStatus::ALL
            .into_iter()
            .filter(EscalationStatus::is_terminal)
            .collect();
        assert_eq!(terminal, vec![EscalationStatus::Resolved, EscalationStatus::Closed]);
    }
}
