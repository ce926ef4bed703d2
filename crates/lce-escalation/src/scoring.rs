//! # SLA and Risk Scoring
//!
//! Due date: `now + base_hours(level) × multiplier(priority)`.
//!
//! Risk score: `0.4·severity + 0.3·priority + 0.15·business + 0.15·regulatory`
//! where severity and priority use the ordinal weights
//! `{Critical 1.0, High 0.75, Medium 0.5, Low 0.25}` and impact statements
//! are classified by keyword.

use chrono::{DateTime, Utc};

use lce_core::{add_hours, LceResult, Priority, Severity};

use crate::config::EscalationConfig;
use crate::level::EscalationLevel;

/// Weight of a free-text impact statement.
///
/// Mentions of "high" or "critical" weigh 1.0, "low" weighs 0.25, anything
/// else (including an empty statement) 0.5.
pub fn impact_weight(statement: &str) -> f64 {
    let text = statement.to_lowercase();
    if text.contains("high") || text.contains("critical") {
        1.0
    } else if text.contains("low") {
        0.25
    } else {
        0.5
    }
}

/// Weighted risk score in `[0, 1]`.
pub fn risk_score(
    severity: Severity,
    priority: Priority,
    business_impact: &str,
    regulatory_impact: &str,
) -> f64 {
    let score = 0.4 * severity.weight()
        + 0.3 * priority.weight()
        + 0.15 * impact_weight(business_impact)
        + 0.15 * impact_weight(regulatory_impact);
    score.clamp(0.0, 1.0)
}

/// SLA deadline for an escalation at `level` with `priority`, from `now`.
pub fn due_date(
    config: &EscalationConfig,
    level: EscalationLevel,
    priority: Priority,
    now: DateTime<Utc>,
) -> LceResult<DateTime<Utc>> {
    add_hours(now, config.base_hours(level) * config.multiplier(priority))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    #[test]
    fn impact_keywords() {
        assert_eq!(impact_weight("HIGH exposure"), 1.0);
        assert_eq!(impact_weight("critical reporting breach"), 1.0);
        assert_eq!(impact_weight("low"), 0.25);
        assert_eq!(impact_weight(""), 0.5);
        assert_eq!(impact_weight("moderate"), 0.5);
    }

    #[test]
    fn medium_everything_scores_half() {
        assert!((risk_score(Severity::Medium, Priority::Medium, "", "") - 0.5).abs() < 1e-12);
        assert!((risk_score(Severity::Critical, Priority::Critical, "high", "critical") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn due_date_formula() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let c = EscalationConfig::default();
        assert_eq!(due_date(&c, EscalationLevel::L1, Priority::Medium, now).unwrap(), now + Duration::hours(24));
        assert_eq!(due_date(&c, EscalationLevel::L2, Priority::High, now).unwrap(), now + Duration::hours(36));
        assert_eq!(due_date(&c, EscalationLevel::L5, Priority::Low, now).unwrap(), now + Duration::hours(360));
    }

    #[test]
    fn due_date_fails_instead_of_overflowing() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut c = EscalationConfig::default();
        c.sla_hours.l1 = 1e13;
        assert!(matches!(
            due_date(&c, EscalationLevel::L1, Priority::Low, now),
            Err(lce_core::LceError::Validation(_))
        ));
    }

    fn arb_severity() -> impl Strategy<Value = Severity> {
        prop::sample::select(Severity::ALL.to_vec())
    }

    fn arb_priority() -> impl Strategy<Value = Priority> {
        prop::sample::select(Priority::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn risk_score_is_bounded(
            s in arb_severity(),
            p in arb_priority(),
            business in ".*",
            regulatory in ".*",
        ) {
            let score = risk_score(s, p, &business, &regulatory);
            prop_assert!((0.0..=1.0).contains(&score));
        }
    }
}
