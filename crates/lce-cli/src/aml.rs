//! # AML Subcommand
//!
//! `lce aml screen` loads sanction and PEP lists into an in-memory store,
//! screens one customer and prints the check result.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use lce_aml::{AmlScreeningEngine, AmlStatus, CheckType, ReferenceLists};
use lce_core::{MemoryStateStore, TxContext};
use lce_escalation::EscalationManager;

use crate::config::AppConfig;
use crate::{print_json, publisher, read_entity, read_text};

/// Arguments for `lce aml`.
#[derive(Args, Debug)]
pub struct AmlArgs {
    #[command(subcommand)]
    pub command: AmlCommand,
}

/// `lce aml` subcommands.
#[derive(Subcommand, Debug)]
pub enum AmlCommand {
    /// Screen a customer against reference lists.
    Screen(ScreenArgs),
}

/// Arguments for `lce aml screen`.
#[derive(Args, Debug)]
pub struct ScreenArgs {
    /// Sanction and PEP lists (YAML with `sanctions:` and `peps:`).
    #[arg(long)]
    pub reference: PathBuf,

    /// Customer identifier.
    #[arg(long)]
    pub customer_id: String,

    /// Customer data as a JSON object of scalar fields.
    #[arg(long)]
    pub data: PathBuf,

    /// onboarding, periodic-review, transaction-based or risk-reassessment.
    #[arg(long, default_value = "onboarding")]
    pub check_type: CheckType,
}

/// Execute `lce aml`.
///
/// Returns 0 for a Clear verdict and 1 for any other status.
pub fn run_aml(args: &AmlArgs, config: &AppConfig, ctx: &TxContext) -> Result<u8> {
    match &args.command {
        AmlCommand::Screen(screen) => run_screen(screen, config, ctx),
    }
}

fn run_screen(args: &ScreenArgs, config: &AppConfig, ctx: &TxContext) -> Result<u8> {
    let lists = ReferenceLists::from_yaml(&read_text(&args.reference)?)
        .with_context(|| format!("failed to load {}", args.reference.display()))?;
    let data = read_entity(&args.data)?;

    let store = MemoryStateStore::shared();
    let engine = AmlScreeningEngine::new(store.clone())
        .with_config(config.screening.clone())?
        .with_escalation_manager(EscalationManager::with_config(
            store.clone(),
            config.escalation.clone(),
        )?);
    engine.reference().load(&lists)?;

    let check = engine
        .screen_customer(&args.customer_id, &data, args.check_type, ctx)?
        .publish(&publisher(&store))?;
    print_json(&check)?;
    Ok(if check.status == AmlStatus::Clear { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::io::Write;

    fn file(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{content}").unwrap();
        f
    }

    fn ctx() -> TxContext {
        crate::tx_context("aml", Some(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()), "tester")
    }

    fn screen(name: &str) -> u8 {
        let lists = file("sanctions:\n  - entry_id: SDN-1\n    name: Ivan Petrov\n    list: OFAC-SDN\n");
        let data = file(&format!(r#"{{"full_name": "{name}"}}"#));
        let args = AmlArgs {
            command: AmlCommand::Screen(ScreenArgs {
                reference: lists.path().to_path_buf(),
                customer_id: "C-1".into(),
                data: data.path().to_path_buf(),
                check_type: CheckType::Onboarding,
            }),
        };
        run_aml(&args, &AppConfig::default(), &ctx()).unwrap()
    }

    #[test]
    fn clear_customer_exits_zero() {
        assert_eq!(screen("Jane Doe"), 0);
    }

    #[test]
    fn listed_customer_exits_one() {
        assert_eq!(screen("Ivan Petrov"), 1);
    }
}
