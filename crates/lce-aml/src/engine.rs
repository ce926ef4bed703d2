//! # AML Screening Engine
//!
//! Screens a customer in one call:
//!
//! 1. sanction and PEP list screening ([`crate::screening`]);
//! 2. risk factors ([`crate::risk`]);
//! 3. overall score `0.4·sanction + 0.3·pep + 0.3·avg(factors)/100`,
//!    where a list only counts when it matched;
//! 4. risk level (`≥0.8` Critical, `≥0.6` High, `≥0.3` Medium) and status;
//! 5. expiry from the check type;
//! 6. for High and Critical results, recommendations, time-boxed actions
//!    and an escalation opened through the [`EscalationManager`].
//!
//! ## Key layout
//!
//! | key | value |
//! |-----|-------|
//! | `aml-check~{check_id}` | check (JSON) |
//! | `aml-check-cust~{customer_id}~{seq:010}` | check ID (JSON) |

use std::sync::Arc;

use serde_json::json;

use lce_core::store::{get_json, scan_json, scan_keys};
use lce_core::{
    add_days, add_hours, composite_key, key_prefix, validate_identifier, ComplianceEvent, EntityData,
    EventType, LceError, LceResult, Outcome, Priority, Severity, SharedStore, TxContext,
    WriteBatch,
};
use lce_escalation::{EscalationManager, ViolationReport};

use crate::check::{ActionType, AmlCheckResult, CheckType, RequiredAction, StatusChange};
use crate::config::ScreeningConfig;
use crate::reference::ReferenceStore;
use crate::risk::{self, average_score, HistoricalRiskProvider, NoHistory, RiskFactor};
use crate::screening::{screen, Candidate, ScreenMatch, ScreenResult, Subject};
use crate::status::AmlStatus;

const CHECK: &str = "aml-check";
const CHECK_BY_CUSTOMER: &str = "aml-check-cust";

/// Entity type recorded on AML events.
const CUSTOMER_ENTITY: &str = "Customer";

const SANCTION_WEIGHT: f64 = 0.4;
const PEP_WEIGHT: f64 = 0.3;
const FACTOR_WEIGHT: f64 = 0.3;

/// Overall score from list results and factors, clamped to `[0, 1]`.
pub fn overall_score(sanction: &ScreenResult, pep: &ScreenResult, factors: &[RiskFactor]) -> f64 {
    let score = SANCTION_WEIGHT * sanction.counted_confidence()
        + PEP_WEIGHT * pep.counted_confidence()
        + FACTOR_WEIGHT * average_score(factors) / 100.0;
    score.clamp(0.0, 1.0)
}

/// `≥0.8` Critical, `≥0.6` High, `≥0.3` Medium, else Low.
pub fn risk_level(score: f64) -> Severity {
    if score >= 0.8 {
        Severity::Critical
    } else if score >= 0.6 {
        Severity::High
    } else if score >= 0.3 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn strongest_match(result: &ScreenResult) -> Option<&ScreenMatch> {
    result.matches.first().filter(|_| result.is_match)
}

fn status_severity(status: AmlStatus) -> Severity {
    match status {
        AmlStatus::Blocked => Severity::Critical,
        AmlStatus::Flagged => Severity::High,
        AmlStatus::Reviewing => Severity::Medium,
        AmlStatus::Clear => Severity::Low,
    }
}

/// Customer screening over shared reference data.
pub struct AmlScreeningEngine {
    store: SharedStore,
    reference: ReferenceStore,
    escalations: EscalationManager,
    config: ScreeningConfig,
    history: Arc<dyn HistoricalRiskProvider>,
}

impl AmlScreeningEngine {
    /// An engine with the default configuration and no history provider.
    pub fn new(store: SharedStore) -> Self {
        Self {
            reference: ReferenceStore::new(store.clone()),
            escalations: EscalationManager::new(store.clone()),
            store,
            config: ScreeningConfig::default(),
            history: Arc::new(NoHistory),
        }
    }

    /// Builder: replace the screening configuration.
    pub fn with_config(mut self, config: ScreeningConfig) -> LceResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Builder: plug in a historical risk source.
    pub fn with_history_provider(mut self, history: Arc<dyn HistoricalRiskProvider>) -> Self {
        self.history = history;
        self
    }

    /// Builder: open escalations through a configured manager.
    pub fn with_escalation_manager(mut self, escalations: EscalationManager) -> Self {
        self.escalations = escalations;
        self
    }

    /// Sanction and PEP reference data.
    pub fn reference(&self) -> &ReferenceStore {
        &self.reference
    }

    /// The escalation manager high-risk results go to.
    pub fn escalations(&self) -> &EscalationManager {
        &self.escalations
    }

    /// The screening configuration.
    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    /// Screen a customer and persist the result.
    pub fn screen_customer(
        &self,
        customer_id: &str,
        data: &EntityData,
        check_type: CheckType,
        ctx: &TxContext,
    ) -> LceResult<Outcome<AmlCheckResult>> {
        validate_identifier("customer_id", customer_id)?;
        let subject = Subject::from_entity(data)?;

        let sanctions = self.reference.list_sanctions()?;
        let peps = self.reference.list_peps()?;
        let sanction = screen(&subject, sanctions.iter().map(Candidate::from), self.config.sanction);
        let pep = screen(&subject, peps.iter().map(Candidate::from), self.config.pep);
        let factors = risk::assess(&self.config, self.history.as_ref(), customer_id, data)?;

        let score = overall_score(&sanction, &pep, &factors);
        let level = risk_level(score);
        let status = AmlStatus::for_verdict(level, sanction.is_match || pep.is_match);
        let now = ctx.now();

        let mut check = AmlCheckResult {
            check_id: ctx.next_id("aml"),
            customer_id: customer_id.to_string(),
            check_type,
            overall_risk_score: score,
            risk_level: level,
            status,
            sanction_screen_result: sanction,
            pep_screen_result: pep,
            risk_factors: factors,
            recommendations: Vec::new(),
            required_actions: Vec::new(),
            escalation_id: None,
            checked_by: ctx.actor().to_string(),
            checked_at: now,
            expiry_date: add_days(now, check_type.validity_days(&self.config))?,
            status_history: vec![StatusChange {
                from: None,
                to: status,
                reason: format!("screening scored {score:.3} ({level})"),
                actor: ctx.actor().to_string(),
                timestamp: now,
            }],
        };

        let mut batch = WriteBatch::new();
        let mut events = Vec::new();
        if level >= Severity::High {
            self.plan_follow_up(&mut check, ctx)?;
            let escalation = self
                .escalations
                .stage_create(self.violation_report(&check), ctx, &mut batch)?
                .drain_into(&mut events);
            check.escalation_id = Some(escalation.escalation_id);
        }

        tracing::info!(
            check_id = %check.check_id,
            customer_id = %customer_id,
            score = check.overall_risk_score,
            level = %level,
            status = %status,
            "AML screening completed"
        );
        events.push(
            ComplianceEvent::new(
                ctx,
                EventType::AmlCheckCompleted,
                customer_id,
                CUSTOMER_ENTITY,
                level,
                format!("AML {check_type} check: {status} ({level} risk)"),
            )
            .with_details(json!({
                "check_id": check.check_id,
                "check_type": check_type,
                "status": status,
                "overall_risk_score": score,
                "sanction_match": check.sanction_screen_result.is_match,
                "pep_match": check.pep_screen_result.is_match,
                "escalation_id": check.escalation_id,
            })),
        );

        let seq = scan_keys(self.store.as_ref(), &key_prefix(CHECK_BY_CUSTOMER, &[customer_id]))?.len();
        batch.put_json(composite_key(CHECK, &[&check.check_id]), &check)?;
        batch.put_json(
            composite_key(CHECK_BY_CUSTOMER, &[customer_id, &format!("{seq:010}")]),
            &check.check_id,
        )?;
        self.store.apply(batch)?;
        Ok(Outcome::new(check, events))
    }

    /// Move a check to a new status along the transition table.
    pub fn update_status(
        &self,
        check_id: &str,
        new_status: AmlStatus,
        reason: &str,
        ctx: &TxContext,
    ) -> LceResult<Outcome<AmlCheckResult>> {
        if reason.trim().is_empty() {
            return Err(LceError::validation("status change reason is required"));
        }
        let mut check = self.get_check(check_id)?;
        let from = check.status;
        if !from.can_transition_to(new_status) {
            return Err(LceError::invalid_transition(
                format!("AML check {check_id}"),
                from,
                new_status,
                format!(
                    "allowed from {from}: {}",
                    from.allowed_transitions()
                        .iter()
                        .map(AmlStatus::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ));
        }

        check.status = new_status;
        check.status_history.push(StatusChange {
            from: Some(from),
            to: new_status,
            reason: reason.to_string(),
            actor: ctx.actor().to_string(),
            timestamp: ctx.now(),
        });

        let mut batch = WriteBatch::new();
        batch.put_json(composite_key(CHECK, &[check_id]), &check)?;
        self.store.apply(batch)?;

        tracing::info!(check_id = %check_id, from = %from, to = %new_status, "AML status changed");
        let event = ComplianceEvent::new(
            ctx,
            EventType::AmlStatusChanged,
            check.customer_id.clone(),
            CUSTOMER_ENTITY,
            status_severity(new_status),
            format!("AML status {from} -> {new_status}: {reason}"),
        )
        .with_details(json!({
            "check_id": check.check_id,
            "from": from,
            "to": new_status,
            "reason": reason,
        }));
        Ok(Outcome::new(check, vec![event]))
    }

    /// Load a check.
    pub fn get_check(&self, check_id: &str) -> LceResult<AmlCheckResult> {
        get_json(self.store.as_ref(), &composite_key(CHECK, &[check_id]))?
            .ok_or_else(|| LceError::not_found("AML check", check_id))
    }

    /// A customer's checks, oldest first.
    pub fn checks_for_customer(&self, customer_id: &str) -> LceResult<Vec<AmlCheckResult>> {
        let ids: Vec<String> =
            scan_json(self.store.as_ref(), &key_prefix(CHECK_BY_CUSTOMER, &[customer_id]))?;
        ids.iter().map(|id| self.get_check(id)).collect()
    }

    /// A customer's most recent check, if any.
    pub fn latest_check(&self, customer_id: &str) -> LceResult<Option<AmlCheckResult>> {
        Ok(self.checks_for_customer(customer_id)?.pop())
    }

    fn plan_follow_up(&self, check: &mut AmlCheckResult, ctx: &TxContext) -> LceResult<()> {
        let hours = &self.config.action_hours;
        let now = ctx.now();
        if let Some(top) = strongest_match(&check.sanction_screen_result) {
            check.recommendations.push(format!(
                "Suspend onboarding until sanction match {} ({}) is reviewed",
                top.entry_id, top.matched_name
            ));
            check.required_actions.push(RequiredAction {
                action_type: ActionType::SanctionReview,
                description: format!("Review sanction match {}", top.entry_id),
                due_date: add_hours(now, hours.sanction_review)?,
            });
        }
        if let Some(top) = strongest_match(&check.pep_screen_result) {
            check.recommendations.push(format!(
                "Obtain senior management approval for PEP relationship {} ({})",
                top.entry_id, top.matched_name
            ));
            check.required_actions.push(RequiredAction {
                action_type: ActionType::PepApproval,
                description: format!("Approve PEP relationship {}", top.entry_id),
                due_date: add_hours(now, hours.pep_approval)?,
            });
        }
        for factor in check.risk_factors.iter().filter(|f| f.severity >= Severity::High) {
            check
                .recommendations
                .push(format!("Document mitigation of {} risk: {}", factor.category, factor.description));
        }
        check.recommendations.push("Apply enhanced due diligence".to_string());
        if check.risk_level == Severity::Critical {
            check
                .recommendations
                .push("Block transactions pending compliance review".to_string());
        }
        check.required_actions.push(RequiredAction {
            action_type: ActionType::EnhancedMonitoring,
            description: "Place customer under enhanced monitoring".to_string(),
            due_date: add_hours(now, hours.enhanced_monitoring)?,
        });
        Ok(())
    }

    fn violation_report(&self, check: &AmlCheckResult) -> ViolationReport {
        let regulatory = if check.sanction_screen_result.is_match {
            "critical: potential sanctions breach"
        } else if check.pep_screen_result.is_match {
            "high: PEP enhanced due diligence required"
        } else {
            "high: elevated AML risk"
        };
        let business = match check.risk_level {
            Severity::Critical => "critical: customer blocked",
            _ => "high: customer flagged",
        };
        ViolationReport::new(
            check.check_id.clone(),
            check.customer_id.clone(),
            format!("AML {} risk for customer {}", check.risk_level, check.customer_id),
        )
        .with_classification(check.risk_level, Priority::from(check.risk_level))
        .with_impact(business, regulatory)
        .with_description(format!(
            "{} check scored {:.3}; status {}",
            check.check_type, check.overall_risk_score, check.status
        ))
    }
}
