//! # lce-core — Foundational Types for the Ledger Compliance Engine
//!
//! Every other `lce-*` crate depends on this one; it depends on nothing
//! internal. It defines the vocabulary the engine speaks: the error
//! taxonomy, the transaction context that replaces the wall clock, the
//! severity and priority scales, the flat entity data handed in by callers,
//! compliance events, and the key/value storage contract.
//!
//! ## Key Design Principles
//!
//! 1. **One error taxonomy.** [`LceError`] is shared by all library crates.
//!    Every variant names the record and state involved.
//!
//! 2. **No ambient time or randomness.** All operations take a
//!    [`TxContext`] carrying the transaction ID, logical timestamp and actor.
//!    Identifiers are UUID v5 derivations of the transaction ID, so a replay
//!    produces byte-identical state.
//!
//! 3. **Validate, then commit once.** Writes are staged in a
//!    [`WriteBatch`] after every check has passed and committed through
//!    [`StateStore::apply`].
//!
//! 4. **Events are values.** Operations return an [`Outcome`] holding the
//!    events they produced; the caller decides when to publish them.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `lce-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

#![deny(missing_docs)]

pub mod classification;
pub mod digest;
pub mod entity;
pub mod error;
pub mod event;
pub mod identity;
pub mod store;
pub mod temporal;

pub use classification::{Priority, Severity};
pub use digest::ContentDigest;
pub use entity::{EntityData, FieldValue, Lookup};
pub use error::{LceError, LceResult};
pub use event::{
    ComplianceEvent, EventLog, EventPublisher, EventSink, EventType, MemoryEventSink, Outcome,
    ResolutionStatus, TracingEventSink,
};
pub use identity::{derive_id, validate_identifier};
pub use store::{
    composite_key, key_prefix, MemoryStateStore, SharedStore, StateStore, WriteBatch, WriteOp,
};
pub use temporal::{add_days, add_hours, TxContext, MAX_OFFSET_DAYS, MAX_OFFSET_HOURS};
