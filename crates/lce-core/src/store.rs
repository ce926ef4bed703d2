//! # Storage Contract
//!
//! The engine depends only on a narrow key/value contract: point reads and
//! writes, deletes, and prefix range scans over composite keys. Secondary
//! indexes are implemented as composite keys (`rule-idx-domain~Loan~R1`)
//! whose range scans enumerate the indexed records.
//!
//! ## Atomicity
//!
//! Operations stage their writes in a [`WriteBatch`] after all validation
//! has succeeded and commit it with [`StateStore::apply`]. A validation
//! failure therefore never leaves partial state behind. The in-memory store
//! applies a batch under a single write lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{LceError, LceResult};

/// Separator between composite key components.
pub const KEY_SEPARATOR: char = '~';

/// Build a composite key: `object_type~attr1~attr2…`.
pub fn composite_key(object_type: &str, attributes: &[&str]) -> String {
    let mut key = String::from(object_type);
    for attr in attributes {
        key.push(KEY_SEPARATOR);
        key.push_str(attr);
    }
    key
}

/// Build a range-scan prefix: `object_type~attr1~…~` (trailing separator),
/// so that `rule~R1~` never matches `rule~R10~…`.
pub fn key_prefix(object_type: &str, attributes: &[&str]) -> String {
    let mut key = composite_key(object_type, attributes);
    key.push(KEY_SEPARATOR);
    key
}

/// Split a composite key into its components (object type first).
pub fn split_key(key: &str) -> Vec<&str> {
    key.split(KEY_SEPARATOR).collect()
}

// ---------------------------------------------------------------------------
// WriteBatch
// ---------------------------------------------------------------------------

/// A single staged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Store `value` under `key`.
    Put(String, Vec<u8>),
    /// Remove `key`.
    Delete(String),
}

/// An ordered set of staged writes committed together.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a raw put.
    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.ops.push(WriteOp::Put(key.into(), value));
    }

    /// Stage a JSON-encoded put.
    pub fn put_json<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> LceResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(key, bytes);
        Ok(())
    }

    /// Stage an index marker (empty value).
    pub fn put_marker(&mut self, key: impl Into<String>) {
        self.put(key, Vec::new());
    }

    /// Stage a delete.
    pub fn delete(&mut self, key: impl Into<String>) {
        self.ops.push(WriteOp::Delete(key.into()));
    }

    /// Append all writes of another batch.
    pub fn extend(&mut self, other: WriteBatch) {
        self.ops.extend(other.ops);
    }

    /// Number of staged writes.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Staged writes in order.
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Consume the batch, yielding its writes in order.
    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

// ---------------------------------------------------------------------------
// StateStore
// ---------------------------------------------------------------------------

/// The key/value state accessor the engine runs against.
pub trait StateStore: Send + Sync {
    /// Read a key.
    fn get(&self, key: &str) -> LceResult<Option<Vec<u8>>>;

    /// Write a key.
    fn put(&self, key: &str, value: Vec<u8>) -> LceResult<()>;

    /// Remove a key. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> LceResult<()>;

    /// All entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &str) -> LceResult<Vec<(String, Vec<u8>)>>;

    /// Commit a batch of writes.
    ///
    /// The default implementation applies writes one by one; stores that can
    /// commit atomically should override it.
    fn apply(&self, batch: WriteBatch) -> LceResult<()> {
        for op in batch.into_ops() {
            match op {
                WriteOp::Put(key, value) => self.put(&key, value)?,
                WriteOp::Delete(key) => self.delete(&key)?,
            }
        }
        Ok(())
    }
}

/// A store shared between the engine components of one deployment.
pub type SharedStore = Arc<dyn StateStore>;

/// Read and decode a JSON record.
pub fn get_json<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> LceResult<Option<T>> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Decode every JSON record under `prefix`.
///
/// Best effort: entries that fail to decode are skipped with a warning so
/// that one corrupt record does not hide the rest of a listing.
pub fn scan_json<T: DeserializeOwned>(store: &dyn StateStore, prefix: &str) -> LceResult<Vec<T>> {
    let mut out = Vec::new();
    for (key, bytes) in store.scan_prefix(prefix)? {
        match serde_json::from_slice(&bytes) {
            Ok(v) => out.push(v),
            Err(e) => tracing::warn!(key = %key, error = %e, "skipping undecodable record"),
        }
    }
    Ok(out)
}

/// Keys under `prefix`, with the prefix stripped.
pub fn scan_keys(store: &dyn StateStore, prefix: &str) -> LceResult<Vec<String>> {
    Ok(store
        .scan_prefix(prefix)?
        .into_iter()
        .map(|(k, _)| k[prefix.len()..].to_string())
        .collect())
}

// ---------------------------------------------------------------------------
// MemoryStateStore
// ---------------------------------------------------------------------------

/// An in-memory [`StateStore`] over a sorted map.
///
/// Sorted keys make prefix scans deterministic. Used by tests, the CLI, and
/// embedders that keep state elsewhere and replay it into the engine.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store behind an `Arc`, ready to share.
    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> LceResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: Vec<u8>) -> LceResult<()> {
        if key.is_empty() {
            return Err(LceError::Storage("empty key".to_string()));
        }
        self.data.write().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> LceResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> LceResult<Vec<(String, Vec<u8>)>> {
        let data = self.data.read();
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn apply(&self, batch: WriteBatch) -> LceResult<()> {
        let ops = batch.into_ops();
        if ops
            .iter()
            .any(|op| matches!(op, WriteOp::Put(k, _) if k.is_empty()))
        {
            return Err(LceError::Storage("empty key in write batch".to_string()));
        }
        let mut data = self.data.write();
        for op in ops {
            match op {
                WriteOp::Put(key, value) => {
                    data.insert(key, value);
                }
                WriteOp::Delete(key) => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }
}
