//! # Screening Reference Data
//!
//! Sanction-list and PEP entries, persisted in the shared state store so
//! every screening in a deployment sees the same lists. Lists are loaded
//! from YAML and replaced entry by entry.
//!
//! | key | value |
//! |-----|-------|
//! | `aml-sanction~{entry_id}` | sanction entry (JSON) |
//! | `aml-pep~{entry_id}` | PEP entry (JSON) |

use serde::{Deserialize, Serialize};

use lce_core::store::{get_json, scan_json};
use lce_core::{
    composite_key, key_prefix, validate_identifier, LceError, LceResult, SharedStore, WriteBatch,
};

const SANCTION: &str = "aml-sanction";
const PEP: &str = "aml-pep";

/// One entry on a sanction list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanctionEntry {
    /// Unique entry identifier.
    pub entry_id: String,
    /// Primary name.
    pub name: String,
    /// Known aliases.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Date of birth, `YYYY-MM-DD`.
    #[serde(default)]
    pub date_of_birth: Option<String>,
    /// Issuing list, e.g. "OFAC-SDN".
    #[serde(default)]
    pub list: String,
    /// Sanctions programme.
    #[serde(default)]
    pub program: Option<String>,
    /// Country code.
    #[serde(default)]
    pub country: Option<String>,
}

/// One politically exposed person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PepEntry {
    /// Unique entry identifier.
    pub entry_id: String,
    /// Primary name.
    pub name: String,
    /// Known aliases.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Date of birth, `YYYY-MM-DD`.
    #[serde(default)]
    pub date_of_birth: Option<String>,
    /// Public function held.
    #[serde(default)]
    pub position: String,
    /// Country code.
    #[serde(default)]
    pub country: Option<String>,
}

/// A document of reference entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLists {
    /// Sanction entries.
    #[serde(default)]
    pub sanctions: Vec<SanctionEntry>,
    /// PEP entries.
    #[serde(default)]
    pub peps: Vec<PepEntry>,
}

impl ReferenceLists {
    /// Parse a YAML document.
    pub fn from_yaml(text: &str) -> LceResult<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| LceError::validation(format!("invalid reference lists: {e}")))
    }
}

fn validate_entry(entry_id: &str, name: &str) -> LceResult<()> {
    validate_identifier("entry_id", entry_id)?;
    if name.trim().is_empty() {
        return Err(LceError::validation(format!("entry {entry_id}: name is required")));
    }
    Ok(())
}

/// Sanction and PEP reference data over a shared store.
#[derive(Clone)]
pub struct ReferenceStore {
    store: SharedStore,
}

impl ReferenceStore {
    /// Create a reference store.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Insert or replace a sanction entry.
    pub fn add_sanction(&self, entry: &SanctionEntry) -> LceResult<()> {
        validate_entry(&entry.entry_id, &entry.name)?;
        let mut batch = WriteBatch::new();
        batch.put_json(composite_key(SANCTION, &[&entry.entry_id]), entry)?;
        self.store.apply(batch)
    }

    /// Load a sanction entry.
    pub fn get_sanction(&self, entry_id: &str) -> LceResult<SanctionEntry> {
        get_json(self.store.as_ref(), &composite_key(SANCTION, &[entry_id]))?
            .ok_or_else(|| LceError::not_found("sanction entry", entry_id))
    }

    /// Every sanction entry, by ID.
    pub fn list_sanctions(&self) -> LceResult<Vec<SanctionEntry>> {
        scan_json(self.store.as_ref(), &key_prefix(SANCTION, &[]))
    }

    /// Insert or replace a PEP entry.
    pub fn add_pep(&self, entry: &PepEntry) -> LceResult<()> {
        validate_entry(&entry.entry_id, &entry.name)?;
        let mut batch = WriteBatch::new();
        batch.put_json(composite_key(PEP, &[&entry.entry_id]), entry)?;
        self.store.apply(batch)
    }

    /// Load a PEP entry.
    pub fn get_pep(&self, entry_id: &str) -> LceResult<PepEntry> {
        get_json(self.store.as_ref(), &composite_key(PEP, &[entry_id]))?
            .ok_or_else(|| LceError::not_found("PEP entry", entry_id))
    }

    /// Every PEP entry, by ID.
    pub fn list_peps(&self) -> LceResult<Vec<PepEntry>> {
        scan_json(self.store.as_ref(), &key_prefix(PEP, &[]))
    }

    /// Insert or replace every entry of a document in one batch.
    ///
    /// Returns the number of entries written.
    pub fn load(&self, lists: &ReferenceLists) -> LceResult<usize> {
        let mut batch = WriteBatch::new();
        for e in &lists.sanctions {
            validate_entry(&e.entry_id, &e.name)?;
            batch.put_json(composite_key(SANCTION, &[&e.entry_id]), e)?;
        }
        for e in &lists.peps {
            validate_entry(&e.entry_id, &e.name)?;
            batch.put_json(composite_key(PEP, &[&e.entry_id]), e)?;
        }
        let written = batch.len();
        self.store.apply(batch)?;
        tracing::info!(
            sanctions = lists.sanctions.len(),
            peps = lists.peps.len(),
            "reference lists loaded"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lce_core::MemoryStateStore;

    const LISTS: &str = r#"
sanctions:
  - entry_id: SDN-1
    name: Ivan Petrov
    aliases: [I. Petrov]
    date_of_birth: "1970-01-01"
    list: OFAC-SDN
peps:
  - entry_id: PEP-1
    name: Maria Gonzalez
    position: Minister of Finance
    country: ES
"#;

    #[test]
    fn load_then_read_back() {
        let refs = ReferenceStore::new(MemoryStateStore::shared());
        let n = refs.load(&ReferenceLists::from_yaml(LISTS).unwrap()).unwrap();
        assert_eq!(n, 2);
        assert_eq!(refs.get_sanction("SDN-1").unwrap().aliases, vec!["I. Petrov"]);
        assert_eq!(refs.list_peps().unwrap()[0].position, "Minister of Finance");
    }

    #[test]
    fn missing_entry_is_not_found() {
        let refs = ReferenceStore::new(MemoryStateStore::shared());
        assert!(matches!(refs.get_sanction("nope"), Err(LceError::NotFound { .. })));
        assert!(matches!(refs.get_pep("nope"), Err(LceError::NotFound { .. })));
    }

    #[test]
    fn blank_name_rejected_without_partial_load() {
        let refs = ReferenceStore::new(MemoryStateStore::shared());
        let mut lists = ReferenceLists::from_yaml(LISTS).unwrap();
        lists.peps[0].name = " ".into();
        assert!(refs.load(&lists).is_err());
        assert!(refs.list_sanctions().unwrap().is_empty());
    }
}
