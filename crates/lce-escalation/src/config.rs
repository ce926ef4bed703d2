//! # Escalation Configuration
//!
//! SLA base hours per level, priority multipliers and the recipient channel
//! notified at each level. Every section deserializes with defaults, so a
//! configuration document only needs to name what it overrides:
//!
//! ```yaml
//! sla_hours:
//!   l1: 12
//! recipients:
//!   l5: board-risk-committee
//! ```

use serde::{Deserialize, Serialize};

use lce_core::{LceError, LceResult, Priority, MAX_OFFSET_HOURS};

use crate::level::EscalationLevel;

/// Base SLA hours per level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaHours {
    /// L1 base hours.
    pub l1: f64,
    /// L2 base hours.
    pub l2: f64,
    /// L3 base hours.
    pub l3: f64,
    /// L4 base hours.
    pub l4: f64,
    /// L5 base hours.
    pub l5: f64,
}

impl Default for SlaHours {
    fn default() -> Self {
        Self {
            l1: 24.0,
            l2: 48.0,
            l3: 72.0,
            l4: 120.0,
            l5: 240.0,
        }
    }
}

/// SLA multipliers per priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityMultipliers {
    /// Critical priority.
    pub critical: f64,
    /// High priority.
    pub high: f64,
    /// Medium priority.
    pub medium: f64,
    /// Low priority.
    pub low: f64,
}

impl Default for PriorityMultipliers {
    fn default() -> Self {
        Self {
            critical: 0.5,
            high: 0.75,
            medium: 1.0,
            low: 1.5,
        }
    }
}

/// Notification channel per level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelRecipients {
    /// L1 channel.
    pub l1: String,
    /// L2 channel.
    pub l2: String,
    /// L3 channel.
    pub l3: String,
    /// L4 channel.
    pub l4: String,
    /// L5 channel.
    pub l5: String,
}

impl Default for LevelRecipients {
    fn default() -> Self {
        Self {
            l1: "compliance-analysts".to_string(),
            l2: "compliance-officers".to_string(),
            l3: "compliance-managers".to_string(),
            l4: "chief-compliance-officer".to_string(),
            l5: "executive-board".to_string(),
        }
    }
}

/// Escalation manager configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Base SLA hours per level.
    pub sla_hours: SlaHours,
    /// SLA multipliers per priority.
    pub priority_multipliers: PriorityMultipliers,
    /// Notification channel per level.
    pub recipients: LevelRecipients,
}

impl EscalationConfig {
    /// Base SLA hours for a level.
    pub fn base_hours(&self, level: EscalationLevel) -> f64 {
        let h = &self.sla_hours;
        match level {
            EscalationLevel::L1 => h.l1,
            EscalationLevel::L2 => h.l2,
            EscalationLevel::L3 => h.l3,
            EscalationLevel::L4 => h.l4,
            EscalationLevel::L5 => h.l5,
        }
    }

    /// SLA multiplier for a priority.
    pub fn multiplier(&self, priority: Priority) -> f64 {
        let m = &self.priority_multipliers;
        match priority {
            Priority::Critical => m.critical,
            Priority::High => m.high,
            Priority::Medium => m.medium,
            Priority::Low => m.low,
        }
    }

    /// Notification channel for a level.
    pub fn recipient(&self, level: EscalationLevel) -> &str {
        let r = &self.recipients;
        match level {
            EscalationLevel::L1 => &r.l1,
            EscalationLevel::L2 => &r.l2,
            EscalationLevel::L3 => &r.l3,
            EscalationLevel::L4 => &r.l4,
            EscalationLevel::L5 => &r.l5,
        }
    }

    /// Reject non-positive or unbounded durations and blank channels.
    ///
    /// The slowest deadline (base hours times the largest multiplier) must
    /// stay within [`MAX_OFFSET_HOURS`].
    pub fn validate(&self) -> LceResult<()> {
        for priority in Priority::ALL {
            let m = self.multiplier(priority);
            if !(m.is_finite() && m > 0.0) {
                return Err(LceError::validation(format!(
                    "priority_multipliers.{} must be positive, got {m}",
                    priority.as_str().to_lowercase()
                )));
            }
        }
        let slowest = Priority::ALL
            .into_iter()
            .map(|p| self.multiplier(p))
            .fold(0.0_f64, f64::max);
        for level in EscalationLevel::ALL {
            let hours = self.base_hours(level);
            if !(hours.is_finite() && hours > 0.0) {
                return Err(LceError::validation(format!(
                    "sla_hours.{} must be positive, got {hours}",
                    level.as_str().to_lowercase()
                )));
            }
            if hours * slowest > MAX_OFFSET_HOURS {
                return Err(LceError::validation(format!(
                    "sla_hours.{} of {hours} exceeds {MAX_OFFSET_HOURS} hours at multiplier {slowest}",
                    level.as_str().to_lowercase()
                )));
            }
            if self.recipient(level).trim().is_empty() {
                return Err(LceError::validation(format!(
                    "recipients.{} is required",
                    level.as_str().to_lowercase()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_policy() {
        let c = EscalationConfig::default();
        assert_eq!(c.base_hours(EscalationLevel::L2), 48.0);
        assert_eq!(c.multiplier(Priority::High), 0.75);
        assert_eq!(c.recipient(EscalationLevel::L4), "chief-compliance-officer");
        c.validate().unwrap();
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let c: EscalationConfig =
            serde_yaml::from_str("sla_hours:\n  l1: 12\nrecipients:\n  l5: board\n").unwrap();
        assert_eq!(c.base_hours(EscalationLevel::L1), 12.0);
        assert_eq!(c.base_hours(EscalationLevel::L2), 48.0);
        assert_eq!(c.recipient(EscalationLevel::L5), "board");
        assert_eq!(c.recipient(EscalationLevel::L1), "compliance-analysts");
    }

    #[test]
    fn validate_rejects_zero_hours() {
        let mut c = EscalationConfig::default();
        c.sla_hours.l3 = 0.0;
        assert!(c.validate().unwrap_err().to_string().contains("sla_hours.l3"));
    }

    #[test]
    fn validate_rejects_deadlines_past_the_representable_range() {
        let mut c = EscalationConfig::default();
        c.sla_hours.l1 = 1e13;
        assert!(c.validate().unwrap_err().to_string().contains("sla_hours.l1"));

        let mut c = EscalationConfig::default();
        c.priority_multipliers.low = 1e9;
        assert!(c.validate().is_err());

        let mut c = EscalationConfig::default();
        c.sla_hours.l5 = 8_760.0;
        c.validate().unwrap();
    }
}
