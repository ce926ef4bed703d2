//! # lce CLI entry point
//!
//! Parses arguments, loads configuration and dispatches to subcommand
//! handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lce_cli::aml::{run_aml, AmlArgs};
use lce_cli::config::AppConfig;
use lce_cli::rules::{run_rules, RulesArgs};
use lce_cli::tx_context;

/// Ledger compliance engine.
///
/// Validates and executes compliance rule packs and screens customers
/// against sanction and PEP lists.
#[derive(Parser, Debug)]
#[command(name = "lce", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file. Falls back to $LCE_CONFIG.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Logical timestamp for the run (RFC 3339). Defaults to now.
    #[arg(long, global = true)]
    at: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate and execute rule packs.
    Rules(RulesArgs),

    /// AML and sanction screening.
    Aml(AmlArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::from(2);
        }
    };

    let result = match &cli.command {
        Commands::Rules(args) => run_rules(args, &config, &tx_context("rules", cli.at, &config.actor)),
        Commands::Aml(args) => run_aml(args, &config, &tx_context("aml", cli.at, &config.actor)),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}
