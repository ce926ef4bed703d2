//! # Risk Factors
//!
//! Independent checks on the screened entity, each producing a score in
//! `0..=100`:
//!
//! | category | source field | scoring |
//! |----------|--------------|---------|
//! | Geographic | `country` / `nationality` | per-country table |
//! | Transaction | `transaction_amount` / `amount` | >10k 50, >50k 75, >100k 100 |
//! | Profile | `occupation` | fixed score for listed occupations |
//! | Historical | collaborator | [`HistoricalRiskProvider`] |
//!
//! Only checks that find something contribute a factor.

use serde::{Deserialize, Serialize};

use lce_core::{EntityData, LceResult, Severity};

use crate::config::ScreeningConfig;

const COUNTRY_FIELDS: [&str; 2] = ["country", "nationality"];
const AMOUNT_FIELDS: [&str; 2] = ["transaction_amount", "amount"];
const OCCUPATION_FIELD: &str = "occupation";

/// Kind of risk a factor measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskCategory {
    /// Jurisdiction exposure.
    Geographic,
    /// Transaction value.
    Transaction,
    /// Customer profile.
    Profile,
    /// Prior behaviour.
    Historical,
}

impl RiskCategory {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Geographic => "Geographic",
            Self::Transaction => "Transaction",
            Self::Profile => "Profile",
            Self::Historical => "Historical",
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One assessed risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    /// What was assessed.
    pub category: RiskCategory,
    /// Human-readable finding.
    pub description: String,
    /// Score in `0..=100`.
    pub risk_score: f64,
    /// Ordinal reading of the score.
    pub severity: Severity,
}

impl RiskFactor {
    /// A factor whose severity follows from its score.
    pub fn new(category: RiskCategory, description: impl Into<String>, risk_score: f64) -> Self {
        let risk_score = risk_score.clamp(0.0, 100.0);
        Self {
            category,
            description: description.into(),
            risk_score,
            severity: severity_for_score(risk_score),
        }
    }
}

/// `≥90` Critical, `≥70` High, `≥40` Medium, else Low.
pub fn severity_for_score(score: f64) -> Severity {
    if score >= 90.0 {
        Severity::Critical
    } else if score >= 70.0 {
        Severity::High
    } else if score >= 40.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Source of a customer's historical risk, e.g. prior alerts or SARs.
pub trait HistoricalRiskProvider: Send + Sync {
    /// Assess a customer's history. `None` when there is nothing to report.
    fn assess(&self, customer_id: &str, data: &EntityData) -> LceResult<Option<RiskFactor>>;
}

/// A provider with no history.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHistory;

impl HistoricalRiskProvider for NoHistory {
    fn assess(&self, _customer_id: &str, _data: &EntityData) -> LceResult<Option<RiskFactor>> {
        Ok(None)
    }
}

fn first_text<'a>(data: &'a EntityData, fields: &[&str]) -> Option<&'a str> {
    fields.iter().find_map(|f| data.text_opt(f))
}

fn first_number(data: &EntityData, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|f| data.number_opt(f))
}

/// Country on the high-risk table.
pub fn geographic(config: &ScreeningConfig, data: &EntityData) -> Option<RiskFactor> {
    let country = first_text(data, &COUNTRY_FIELDS)?;
    let score = config.country_score(country)?;
    Some(RiskFactor::new(
        RiskCategory::Geographic,
        format!("high-risk jurisdiction {}", country.trim().to_uppercase()),
        score,
    ))
}

/// Transaction value above the first tier.
pub fn transaction(config: &ScreeningConfig, data: &EntityData) -> Option<RiskFactor> {
    let amount = first_number(data, &AMOUNT_FIELDS)?;
    let tiers = &config.transaction_tiers;
    let score = if amount > tiers.critical {
        100.0
    } else if amount > tiers.high {
        75.0
    } else if amount > tiers.medium {
        50.0
    } else {
        return None;
    };
    Some(RiskFactor::new(
        RiskCategory::Transaction,
        format!("transaction value {amount}"),
        score,
    ))
}

/// Occupation on the high-risk list.
pub fn profile(config: &ScreeningConfig, data: &EntityData) -> Option<RiskFactor> {
    let occupation = data.text_opt(OCCUPATION_FIELD)?;
    if !config.is_high_risk_occupation(occupation) {
        return None;
    }
    Some(RiskFactor::new(
        RiskCategory::Profile,
        format!("high-risk occupation {}", occupation.trim()),
        config.occupation_score,
    ))
}

/// Run every check. The historical provider's errors propagate.
pub fn assess(
    config: &ScreeningConfig,
    history: &dyn HistoricalRiskProvider,
    customer_id: &str,
    data: &EntityData,
) -> LceResult<Vec<RiskFactor>> {
    let mut factors: Vec<RiskFactor> = [
        geographic(config, data),
        transaction(config, data),
        profile(config, data),
    ]
    .into_iter()
    .flatten()
    .collect();
    factors.extend(history.assess(customer_id, data)?);
    Ok(factors)
}

/// Mean factor score, 0 when there are none.
pub fn average_score(factors: &[RiskFactor]) -> f64 {
    if factors.is_empty() {
        return 0.0;
    }
    factors.iter().map(|f| f.risk_score).sum::<f64>() / factors.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_tiers() {
        let c = ScreeningConfig::default();
        let score = |amount: f64| {
            transaction(&c, &EntityData::new().with("amount", amount)).map(|f| f.risk_score)
        };
        assert_eq!(score(10_000.0), None);
        assert_eq!(score(10_001.0), Some(50.0));
        assert_eq!(score(50_001.0), Some(75.0));
        assert_eq!(score(100_001.0), Some(100.0));
    }

    #[test]
    fn factor_severity_follows_score() {
        assert_eq!(RiskFactor::new(RiskCategory::Profile, "p", 70.0).severity, Severity::High);
        assert_eq!(RiskFactor::new(RiskCategory::Profile, "p", 150.0).risk_score, 100.0);
    }

    #[test]
    fn assess_collects_only_findings() {
        let c = ScreeningConfig::default();
        let data = EntityData::new()
            .with("country", "ir")
            .with("occupation", "Nurse")
            .with("amount", 500.0);
        let factors = assess(&c, &NoHistory, "C-1", &data).unwrap();
        assert_eq!(factors.len(), 1);
        assert_eq!(factors[0].category, RiskCategory::Geographic);
        assert_eq!(average_score(&factors), 100.0);
        assert_eq!(average_score(&[]), 0.0);
    }

    struct PriorAlerts;

    impl HistoricalRiskProvider for PriorAlerts {
        fn assess(&self, customer_id: &str, _: &EntityData) -> LceResult<Option<RiskFactor>> {
            Ok(Some(RiskFactor::new(
                RiskCategory::Historical,
                format!("{customer_id} has prior alerts"),
                40.0,
            )))
        }
    }

    #[test]
    fn history_provider_contributes() {
        let factors =
            assess(&ScreeningConfig::default(), &PriorAlerts, "C-9", &EntityData::new()).unwrap();
        assert_eq!(factors[0].category, RiskCategory::Historical);
        assert_eq!(factors[0].severity, Severity::Medium);
    }
}
