//! # Transaction Context and Logical Time
//!
//! Every mutating or evaluating operation in the engine runs inside a
//! [`TxContext`]: the ledger transaction identifier, the transaction's
//! logical timestamp, and the actor the call is attributed to.
//!
//! Independent parties replay the same transaction to validate it, so no
//! engine code reads the wall clock. "Now" is always `ctx.now()`, and every
//! identifier minted during the call is derived from the transaction ID and
//! a per-context sequence number (see [`crate::identity`]).

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};

use crate::error::{LceError, LceResult};
use crate::identity::derive_id;

/// Longest relative deadline a configuration may produce: ten years.
pub const MAX_OFFSET_HOURS: f64 = 87_660.0;

/// Longest validity window a configuration may produce, in days.
pub const MAX_OFFSET_DAYS: i64 = 3_652;

/// Execution context for one logical ledger call.
#[derive(Debug)]
pub struct TxContext {
    tx_id: String,
    timestamp: DateTime<Utc>,
    actor: String,
    sequence: AtomicU64,
}

impl TxContext {
    /// Create a context for transaction `tx_id` at logical time `timestamp`,
    /// attributed to `actor`.
    pub fn new(
        tx_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            tx_id: tx_id.into(),
            timestamp,
            actor: actor.into(),
            sequence: AtomicU64::new(0),
        }
    }

    /// The ledger transaction identifier.
    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    /// The transaction's logical time.
    pub fn now(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The actor the call is attributed to.
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// Mint the next deterministic identifier with the given prefix.
    ///
    /// The same transaction replayed with the same call sequence yields the
    /// same identifiers.
    pub fn next_id(&self, prefix: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        derive_id(prefix, &self.tx_id, seq)
    }
}

/// Add a fractional number of hours to a timestamp, at minute precision.
///
/// Fails with `Validation` when `hours` is not finite or the result falls
/// outside the representable range.
pub fn add_hours(at: DateTime<Utc>, hours: f64) -> LceResult<DateTime<Utc>> {
    let out_of_range = || LceError::validation(format!("{hours} hours after {at} is out of range"));
    if !hours.is_finite() {
        return Err(out_of_range());
    }
    let minutes = (hours * 60.0).round() as i64;
    Duration::try_minutes(minutes)
        .and_then(|d| at.checked_add_signed(d))
        .ok_or_else(out_of_range)
}

/// Add whole days to a timestamp.
pub fn add_days(at: DateTime<Utc>, days: i64) -> LceResult<DateTime<Utc>> {
    Duration::try_days(days)
        .and_then(|d| at.checked_add_signed(d))
        .ok_or_else(|| LceError::validation(format!("{days} days after {at} is out of range")))
}

/// Render a timestamp as ISO 8601 with a `Z` suffix, truncated to seconds.
pub fn to_canonical_string(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn now_is_the_logical_timestamp() {
        let ctx = TxContext::new("tx-1", t0(), "alice");
        assert_eq!(ctx.now(), t0());
        assert_eq!(ctx.actor(), "alice");
        assert_eq!(ctx.tx_id(), "tx-1");
    }

    #[test]
    fn ids_are_deterministic_per_transaction() {
        let a = TxContext::new("tx-1", t0(), "alice");
        let b = TxContext::new("tx-1", t0(), "bob");
        assert_eq!(a.next_id("exec"), b.next_id("exec"));
        assert_eq!(a.next_id("exec"), b.next_id("exec"));
    }

    #[test]
    fn ids_are_unique_within_a_transaction() {
        let ctx = TxContext::new("tx-1", t0(), "alice");
        let first = ctx.next_id("evt");
        let second = ctx.next_id("evt");
        assert_ne!(first, second);
    }

    #[test]
    fn add_hours_handles_fractions() {
        let due = add_hours(t0(), 36.0).unwrap();
        assert_eq!(due, t0() + Duration::hours(36));
        let due = add_hours(t0(), 0.5).unwrap();
        assert_eq!(due, t0() + Duration::minutes(30));
    }

    #[test]
    fn add_hours_rejects_unrepresentable_offsets() {
        for hours in [1e13, -1e13, f64::MAX, f64::INFINITY, f64::NAN] {
            assert!(
                matches!(add_hours(t0(), hours), Err(LceError::Validation(_))),
                "{hours} hours"
            );
        }
    }

    #[test]
    fn add_days_rejects_unrepresentable_offsets() {
        assert_eq!(add_days(t0(), 180).unwrap(), t0() + Duration::days(180));
        assert!(matches!(add_days(t0(), i64::MAX), Err(LceError::Validation(_))));
        assert!(matches!(add_days(t0(), 1_000_000_000), Err(LceError::Validation(_))));
    }

    #[test]
    fn canonical_string_has_z_suffix() {
        assert_eq!(to_canonical_string(&t0()), "2026-03-01T09:00:00Z");
    }
}
