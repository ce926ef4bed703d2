//! # lce-cli — Ledger Compliance Engine CLI
//!
//! A thin adapter over the engine crates. Each invocation builds an
//! in-memory state store, loads the inputs it is given and prints JSON.
//!
//! ## Subcommands
//!
//! ```bash
//! lce rules validate --pack rules.yaml
//! lce rules execute --pack rules.yaml --data loan.json --event LoanSubmitted
//! lce aml screen --reference lists.yaml --customer-id C-1 --data customer.json
//! ```
//!
//! Exit codes: 0 when everything passed, 1 when a check found a problem,
//! 2 on operational errors.

pub mod aml;
pub mod config;
pub mod rules;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use lce_core::{
    EntityData, EventLog, EventPublisher, SharedStore, TracingEventSink, TxContext,
};

/// Read a file to a string, naming the file on failure.
pub fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Read a JSON object of scalar fields as entity data.
pub fn read_entity(path: &Path) -> Result<EntityData> {
    let value: serde_json::Value = serde_json::from_str(&read_text(path)?)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    EntityData::from_json(&value).with_context(|| format!("invalid entity data in {}", path.display()))
}

/// Transaction context for one CLI invocation.
///
/// The timestamp is `at` when given, the wall clock otherwise.
pub fn tx_context(command: &str, at: Option<DateTime<Utc>>, actor: &str) -> TxContext {
    let at = at.unwrap_or_else(Utc::now);
    TxContext::new(format!("cli-{command}-{}", at.to_rfc3339()), at, actor)
}

/// Publisher that records events in `store` and logs them.
pub fn publisher(store: &SharedStore) -> EventPublisher {
    EventPublisher::new(EventLog::new(store.clone()), Arc::new(TracingEventSink))
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
