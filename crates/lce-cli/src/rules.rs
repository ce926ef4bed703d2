//! # Rules Subcommand
//!
//! `lce rules validate` checks a rule pack offline and prints its
//! installation order. `lce rules execute` seeds an in-memory store with a
//! pack, runs the applicable rules over one entity and prints the results
//! and events; `--escalate` opens an escalation for each violation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::json;

use lce_core::{EventType, MemoryStateStore, Priority, TxContext};
use lce_escalation::{EscalationManager, ViolationReport};
use lce_rules::{ApprovalWorkflow, RulePack};

use crate::config::AppConfig;
use crate::{print_json, publisher, read_entity, read_text};

/// Arguments for `lce rules`.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

/// `lce rules` subcommands.
#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// Validate a rule pack and print its installation order.
    Validate {
        /// Rule pack YAML. Defaults to the built-in standard pack.
        #[arg(long)]
        pack: Option<PathBuf>,
    },
    /// Execute the rules that apply to one entity.
    Execute(ExecuteArgs),
}

/// Arguments for `lce rules execute`.
#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("selector").required(true).args(["entity_type", "event"])))]
pub struct ExecuteArgs {
    /// Rule pack YAML. Defaults to the built-in standard pack.
    #[arg(long)]
    pub pack: Option<PathBuf>,

    /// Entity data as a JSON object of scalar fields.
    #[arg(long)]
    pub data: PathBuf,

    /// Run the rules that apply to this entity type.
    #[arg(long)]
    pub entity_type: Option<String>,

    /// Run the rules triggered by this business event.
    #[arg(long)]
    pub event: Option<String>,

    /// Open an escalation for every violation.
    #[arg(long)]
    pub escalate: bool,
}

/// Execute `lce rules`.
///
/// Returns 0 when everything passed and 1 on a validation failure or
/// violation.
pub fn run_rules(args: &RulesArgs, config: &AppConfig, ctx: &TxContext) -> Result<u8> {
    match &args.command {
        RulesCommand::Validate { pack } => run_validate(pack.as_deref(), ctx),
        RulesCommand::Execute(exec) => run_execute(exec, config, ctx),
    }
}

fn load_pack(path: Option<&Path>) -> Result<RulePack> {
    match path {
        Some(p) => RulePack::from_yaml(&read_text(p)?)
            .with_context(|| format!("failed to load rule pack {}", p.display())),
        None => RulePack::standard().context("built-in rule pack is invalid"),
    }
}

fn run_validate(path: Option<&Path>, ctx: &TxContext) -> Result<u8> {
    let pack = load_pack(path)?;
    match pack.validate(ctx) {
        Ok(order) => {
            print_json(&json!({
                "pack": pack.name,
                "valid": true,
                "execution_order": order,
            }))?;
            Ok(0)
        }
        Err(e) => {
            print_json(&json!({
                "pack": pack.name,
                "valid": false,
                "error": e.to_string(),
            }))?;
            Ok(1)
        }
    }
}

fn run_execute(args: &ExecuteArgs, config: &AppConfig, ctx: &TxContext) -> Result<u8> {
    let pack = load_pack(args.pack.as_deref())?;
    let data = read_entity(&args.data)?;

    let store = MemoryStateStore::shared();
    let events = publisher(&store);
    let workflow = ApprovalWorkflow::new(store.clone());
    let seeded = pack
        .seed(&workflow, ctx)
        .context("failed to seed rule pack")?
        .publish(&events)?;
    tracing::info!(pack = %pack.name, rules = seeded.len(), "rules installed");

    let engine = workflow.engine();
    let outcome = match (&args.entity_type, &args.event) {
        (Some(entity_type), _) => engine.execute_rules_for_entity(entity_type, &data, ctx)?,
        (None, Some(event)) => engine.execute_rules_for_event(event, &data, ctx)?,
        (None, None) => anyhow::bail!("either --entity-type or --event is required"),
    };
    let mut emitted = outcome.events.clone();
    let results = outcome.publish(&events)?;

    let mut escalations = Vec::new();
    if args.escalate {
        let manager = EscalationManager::with_config(store.clone(), config.escalation.clone())?;
        let violations: Vec<_> = emitted
            .iter()
            .filter(|e| e.event_type == EventType::RuleViolationDetected)
            .cloned()
            .collect();
        for violation in violations {
            let mut report = ViolationReport::new(
                violation.event_id.clone(),
                violation.affected_entity_id.clone(),
                violation.description.clone(),
            )
            .with_classification(violation.severity, Priority::from(violation.severity));
            if let Some(rule_id) = &violation.rule_id {
                report = report.with_rule(rule_id.clone());
            }
            let out = manager.create(report, ctx)?;
            emitted.extend(out.events.iter().cloned());
            escalations.push(out.publish(&events)?);
        }
    }

    let all_passed = results.iter().all(|r| r.success && r.passed);
    print_json(&json!({
        "results": results,
        "events": emitted,
        "escalations": escalations,
    }))?;
    Ok(if all_passed { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;

    fn ctx() -> TxContext {
        crate::tx_context("test", Some(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()), "tester")
    }

    fn data_file(json: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{json}").unwrap();
        f
    }

    #[test]
    fn standard_pack_validates() {
        let args = RulesArgs {
            command: RulesCommand::Validate { pack: None },
        };
        assert_eq!(run_rules(&args, &AppConfig::default(), &ctx()).unwrap(), 0);
    }

    #[test]
    fn broken_pack_exits_one() {
        let pack = data_file(
            "rules:\n  - rule_id: A\n    name: a\n    description: a\n    logic: { type: nope }\n    applies_to_domain: D\n    applies_to_entity_type: E\n    test_cases: [{ name: t, input: {}, expected_passed: true }]\n",
        );
        let args = RulesArgs {
            command: RulesCommand::Validate {
                pack: Some(pack.path().to_path_buf()),
            },
        };
        assert_eq!(run_rules(&args, &AppConfig::default(), &ctx()).unwrap(), 1);
    }

    #[test]
    fn violation_exits_one_and_escalates() {
        let loan = data_file(
            r#"{"entity_id": "loan-9", "customer_id": "C-1", "amount": 5000000, "term_months": 24, "purpose": "plant"}"#,
        );
        let args = RulesArgs {
            command: RulesCommand::Execute(ExecuteArgs {
                pack: None,
                data: loan.path().to_path_buf(),
                entity_type: None,
                event: Some("LoanSubmitted".into()),
                escalate: true,
            }),
        };
        assert_eq!(run_rules(&args, &AppConfig::default(), &ctx()).unwrap(), 1);
    }

    #[test]
    fn compliant_customer_exits_zero() {
        let customer = data_file(
            r#"{"entity_id": "C-1", "full_name": "Jane Doe", "date_of_birth": "1990-04-01", "national_id": "X1", "address": "1 Main St"}"#,
        );
        let args = RulesArgs {
            command: RulesCommand::Execute(ExecuteArgs {
                pack: None,
                data: customer.path().to_path_buf(),
                entity_type: Some("Customer".into()),
                event: None,
                escalate: false,
            }),
        };
        assert_eq!(run_rules(&args, &AppConfig::default(), &ctx()).unwrap(), 0);
    }
}
