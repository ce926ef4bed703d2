//! # Screening Configuration
//!
//! Match thresholds, high-risk reference tables, transaction tiers, check
//! validity windows and required-action deadlines. Sections deserialize
//! with defaults; a document names only what it overrides.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use lce_core::{LceError, LceResult, MAX_OFFSET_DAYS, MAX_OFFSET_HOURS};

/// Record and match thresholds for one reference list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchThresholds {
    /// Confidence at which a candidate is recorded.
    pub record: f64,
    /// Maximum confidence at which the subject counts as a match.
    pub is_match: f64,
}

/// Transaction value tiers, in the entity's currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionTiers {
    /// Above this: Medium.
    pub medium: f64,
    /// Above this: High.
    pub high: f64,
    /// Above this: Critical.
    pub critical: f64,
}

impl Default for TransactionTiers {
    fn default() -> Self {
        Self {
            medium: 10_000.0,
            high: 50_000.0,
            critical: 100_000.0,
        }
    }
}

/// Days a check stays valid, per check type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckValidity {
    /// Onboarding checks.
    pub onboarding: i64,
    /// Periodic reviews.
    pub periodic_review: i64,
    /// Transaction-triggered checks.
    pub transaction_based: i64,
    /// Risk reassessments.
    pub risk_reassessment: i64,
}

impl Default for CheckValidity {
    fn default() -> Self {
        Self {
            onboarding: 365,
            periodic_review: 365,
            transaction_based: 180,
            risk_reassessment: 90,
        }
    }
}

/// Hours allowed for each required action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionWindows {
    /// Sanction match review.
    pub sanction_review: f64,
    /// PEP relationship approval.
    pub pep_approval: f64,
    /// Enhanced monitoring set-up.
    pub enhanced_monitoring: f64,
}

impl Default for ActionWindows {
    fn default() -> Self {
        Self {
            sanction_review: 24.0,
            pep_approval: 72.0,
            enhanced_monitoring: 48.0,
        }
    }
}

/// AML screening configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Sanction list thresholds.
    pub sanction: MatchThresholds,
    /// PEP list thresholds.
    pub pep: MatchThresholds,
    /// ISO country code to geographic risk score (0–100).
    pub high_risk_countries: BTreeMap<String, f64>,
    /// Occupations that raise the profile risk, lowercase.
    pub high_risk_occupations: BTreeSet<String>,
    /// Profile risk score for a listed occupation (0–100).
    pub occupation_score: f64,
    /// Transaction value tiers.
    pub transaction_tiers: TransactionTiers,
    /// Check validity per check type.
    pub validity_days: CheckValidity,
    /// Required-action deadlines.
    pub action_hours: ActionWindows,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        let countries = [
            ("KP", 100.0),
            ("IR", 100.0),
            ("MM", 90.0),
            ("SY", 85.0),
            ("AF", 80.0),
            ("YE", 75.0),
        ];
        let occupations = [
            "arms dealer",
            "casino operator",
            "cryptocurrency exchanger",
            "money service business",
            "precious metals dealer",
        ];
        Self {
            sanction: MatchThresholds {
                record: 0.7,
                is_match: 0.8,
            },
            pep: MatchThresholds {
                record: 0.8,
                is_match: 0.85,
            },
            high_risk_countries: countries
                .into_iter()
                .map(|(c, s)| (c.to_string(), s))
                .collect(),
            high_risk_occupations: occupations.into_iter().map(str::to_string).collect(),
            occupation_score: 70.0,
            transaction_tiers: TransactionTiers::default(),
            validity_days: CheckValidity::default(),
            action_hours: ActionWindows::default(),
        }
    }
}

impl ScreeningConfig {
    /// Parse a YAML document, filling unnamed sections with defaults.
    pub fn from_yaml(text: &str) -> LceResult<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| LceError::validation(format!("invalid screening config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges and orderings.
    pub fn validate(&self) -> LceResult<()> {
        for (name, t) in [("sanction", self.sanction), ("pep", self.pep)] {
            let in_unit = |v: f64| (0.0..=1.0).contains(&v);
            if !(in_unit(t.record) && in_unit(t.is_match)) || t.record > t.is_match {
                return Err(LceError::validation(format!(
                    "{name} thresholds must satisfy 0 <= record <= is_match <= 1"
                )));
            }
        }
        for (country, score) in &self.high_risk_countries {
            if !(0.0..=100.0).contains(score) {
                return Err(LceError::validation(format!(
                    "high_risk_countries.{country} must be within 0..=100"
                )));
            }
        }
        if !(0.0..=100.0).contains(&self.occupation_score) {
            return Err(LceError::validation("occupation_score must be within 0..=100"));
        }
        let tiers = &self.transaction_tiers;
        if !(tiers.medium < tiers.high && tiers.high < tiers.critical) {
            return Err(LceError::validation(
                "transaction_tiers must be strictly increasing",
            ));
        }
        let v = &self.validity_days;
        if [v.onboarding, v.periodic_review, v.transaction_based, v.risk_reassessment]
            .iter()
            .any(|d| *d <= 0 || *d > MAX_OFFSET_DAYS)
        {
            return Err(LceError::validation(format!(
                "validity_days must be within 1..={MAX_OFFSET_DAYS}"
            )));
        }
        let a = &self.action_hours;
        if [a.sanction_review, a.pep_approval, a.enhanced_monitoring]
            .iter()
            .any(|h| !(h.is_finite() && *h > 0.0 && *h <= MAX_OFFSET_HOURS))
        {
            return Err(LceError::validation(format!(
                "action_hours must be positive and at most {MAX_OFFSET_HOURS}"
            )));
        }
        Ok(())
    }

    /// Geographic risk score for a country code, if the country is listed.
    pub fn country_score(&self, country: &str) -> Option<f64> {
        self.high_risk_countries
            .get(&country.trim().to_uppercase())
            .copied()
    }

    /// Whether an occupation is on the high-risk list.
    pub fn is_high_risk_occupation(&self, occupation: &str) -> bool {
        self.high_risk_occupations
            .contains(&occupation.trim().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let c = ScreeningConfig::default();
        c.validate().unwrap();
        assert_eq!(c.sanction.is_match, 0.8);
        assert_eq!(c.pep.record, 0.8);
        assert_eq!(c.validity_days.transaction_based, 180);
    }

    #[test]
    fn lookups_normalise_case() {
        let c = ScreeningConfig::default();
        assert_eq!(c.country_score(" ir "), Some(100.0));
        assert_eq!(c.country_score("FR"), None);
        assert!(c.is_high_risk_occupation("Casino Operator"));
    }

    #[test]
    fn yaml_override_keeps_other_defaults() {
        let c = ScreeningConfig::from_yaml("pep:\n  record: 0.75\n  is_match: 0.9\n").unwrap();
        assert_eq!(c.pep.is_match, 0.9);
        assert_eq!(c.sanction.record, 0.7);
        assert_eq!(c.action_hours.pep_approval, 72.0);
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let err = ScreeningConfig::from_yaml("sanction:\n  record: 0.9\n  is_match: 0.8\n").unwrap_err();
        assert!(err.to_string().contains("sanction thresholds"));
    }

    #[test]
    fn unbounded_deadlines_rejected() {
        let err = ScreeningConfig::from_yaml("validity_days:\n  onboarding: 100000000000\n").unwrap_err();
        assert!(err.to_string().contains("validity_days"));
        let err = ScreeningConfig::from_yaml("action_hours:\n  sanction_review: 1.0e13\n").unwrap_err();
        assert!(err.to_string().contains("action_hours"));
        ScreeningConfig::from_yaml("validity_days:\n  onboarding: 3650\n").unwrap();
    }
}
