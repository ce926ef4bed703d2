//! # Rule Store
//!
//! Versioned persistence of rules over the key/value [`StateStore`], with
//! secondary indexes maintained as composite keys.
//!
//! ## Key layout
//!
//! | key | value |
//! |-----|-------|
//! | `rule~{id}~{version:010}` | the rule version (JSON) |
//! | `rule-latest~{id}` | latest version number |
//! | `rule-idx-domain~{domain}~{id}` | marker |
//! | `rule-idx-entity~{entity_type}~{id}` | marker |
//! | `rule-idx-event~{event}~{id}` | marker, one per trigger event |
//! | `rule-idx-status~{status}~{id}` | marker |
//! | `rule-idx-priority~{priority}~{id}` | marker |
//!
//! Indexes always describe the latest version of a rule. When a new
//! latest version is saved, the index entries of the previous one are
//! deleted in the same batch.
//!
//! Index reads are best-effort: an entry whose rule record cannot be read
//! is skipped with a warning rather than failing the listing.

use lce_core::store::{get_json, scan_json, scan_keys};
use lce_core::{
    composite_key, key_prefix, LceError, LceResult, Priority, SharedStore, TxContext, WriteBatch,
};

use crate::rule::{ComplianceRule, RuleStatus};
use crate::validation::validate_structure;

const RULE: &str = "rule";
const RULE_LATEST: &str = "rule-latest";
const IDX_DOMAIN: &str = "rule-idx-domain";
const IDX_ENTITY: &str = "rule-idx-entity";
const IDX_EVENT: &str = "rule-idx-event";
const IDX_STATUS: &str = "rule-idx-status";
const IDX_PRIORITY: &str = "rule-idx-priority";

fn version_key(rule_id: &str, version: u32) -> String {
    composite_key(RULE, &[rule_id, &format!("{version:010}")])
}

fn latest_key(rule_id: &str) -> String {
    composite_key(RULE_LATEST, &[rule_id])
}

fn index_keys(rule: &ComplianceRule) -> Vec<String> {
    let id = rule.rule_id.as_str();
    let mut keys = vec![
        composite_key(IDX_DOMAIN, &[&rule.applies_to_domain, id]),
        composite_key(IDX_ENTITY, &[&rule.applies_to_entity_type, id]),
        composite_key(IDX_STATUS, &[rule.status.as_str(), id]),
        composite_key(IDX_PRIORITY, &[rule.priority.as_str(), id]),
    ];
    for event in &rule.trigger_events {
        keys.push(composite_key(IDX_EVENT, &[event, id]));
    }
    keys
}

/// Versioned rule persistence.
#[derive(Clone)]
pub struct RuleStore {
    store: SharedStore,
}

impl std::fmt::Debug for RuleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleStore").finish_non_exhaustive()
    }
}

impl RuleStore {
    /// Create a rule store over a shared state store.
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// The underlying state store.
    pub fn state(&self) -> &SharedStore {
        &self.store
    }

    // -- Reads ---------------------------------------------------------------

    /// A specific version.
    pub fn get(&self, rule_id: &str, version: u32) -> LceResult<ComplianceRule> {
        get_json(self.store.as_ref(), &version_key(rule_id, version))?
            .ok_or_else(|| LceError::not_found("rule version", format!("{rule_id}@v{version}")))
    }

    /// The latest version number, if the rule exists.
    pub fn latest_version(&self, rule_id: &str) -> LceResult<Option<u32>> {
        get_json(self.store.as_ref(), &latest_key(rule_id))
    }

    /// Whether any version of the rule exists.
    pub fn exists(&self, rule_id: &str) -> LceResult<bool> {
        Ok(self.latest_version(rule_id)?.is_some())
    }

    /// The latest version.
    pub fn get_latest(&self, rule_id: &str) -> LceResult<ComplianceRule> {
        let version = self
            .latest_version(rule_id)?
            .ok_or_else(|| LceError::not_found("rule", rule_id))?;
        self.get(rule_id, version)
    }

    /// Every version of a rule, oldest first.
    pub fn history(&self, rule_id: &str) -> LceResult<Vec<ComplianceRule>> {
        let versions: Vec<ComplianceRule> =
            scan_json(self.store.as_ref(), &key_prefix(RULE, &[rule_id]))?;
        if versions.is_empty() {
            return Err(LceError::not_found("rule", rule_id));
        }
        Ok(versions)
    }

    /// Latest versions of every rule, ordered by rule ID.
    pub fn list_all(&self) -> LceResult<Vec<ComplianceRule>> {
        let ids = scan_keys(self.store.as_ref(), &format!("{RULE_LATEST}~"))?;
        Ok(self.load_latest(ids))
    }

    /// Rules whose latest version applies to `domain`.
    pub fn list_by_domain(&self, domain: &str) -> LceResult<Vec<ComplianceRule>> {
        self.list_index(IDX_DOMAIN, domain)
    }

    /// Rules whose latest version applies to `entity_type`.
    pub fn list_by_entity_type(&self, entity_type: &str) -> LceResult<Vec<ComplianceRule>> {
        self.list_index(IDX_ENTITY, entity_type)
    }

    /// Rules whose latest version is triggered by `event`.
    pub fn list_by_event(&self, event: &str) -> LceResult<Vec<ComplianceRule>> {
        self.list_index(IDX_EVENT, event)
    }

    /// Rules whose latest version has `status`.
    pub fn list_by_status(&self, status: RuleStatus) -> LceResult<Vec<ComplianceRule>> {
        self.list_index(IDX_STATUS, status.as_str())
    }

    /// Rules whose latest version has `priority`.
    pub fn list_by_priority(&self, priority: Priority) -> LceResult<Vec<ComplianceRule>> {
        self.list_index(IDX_PRIORITY, priority.as_str())
    }

    /// Case-insensitive substring search over name, description and
    /// justification of latest versions.
    pub fn search(&self, term: &str) -> LceResult<Vec<ComplianceRule>> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Err(LceError::validation("search term is required"));
        }
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|r| {
                [&r.name, &r.description, &r.justification]
                    .iter()
                    .any(|text| text.to_lowercase().contains(&needle))
            })
            .collect())
    }

    fn list_index(&self, index: &str, value: &str) -> LceResult<Vec<ComplianceRule>> {
        let ids = scan_keys(self.store.as_ref(), &key_prefix(index, &[value]))?;
        Ok(self.load_latest(ids))
    }

    fn load_latest(&self, ids: Vec<String>) -> Vec<ComplianceRule> {
        let mut rules = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_latest(&id) {
                Ok(rule) => rules.push(rule),
                Err(e) => tracing::warn!(rule_id = %id, error = %e, "skipping unreadable rule index entry"),
            }
        }
        rules
    }

    // -- Writes --------------------------------------------------------------

    /// Validate and persist a rule version, updating the latest pointer and
    /// every secondary index. A failed validation writes nothing.
    pub fn save(&self, rule: &ComplianceRule) -> LceResult<()> {
        let mut batch = WriteBatch::new();
        self.stage_save(rule, &mut batch)?;
        self.store.apply(batch)
    }

    /// Validate a rule version and stage its writes into `batch`.
    ///
    /// Saving the current latest version again updates its lifecycle
    /// metadata; its content digest must be unchanged. A new version must
    /// be exactly one above the current latest.
    pub fn stage_save(&self, rule: &ComplianceRule, batch: &mut WriteBatch) -> LceResult<()> {
        validate_structure(rule)?;

        let previous = match self.latest_version(&rule.rule_id)? {
            None if rule.version != 1 => {
                return Err(LceError::validation(format!(
                    "first version of rule {} must be 1, got {}",
                    rule.rule_id, rule.version
                )))
            }
            None => None,
            Some(latest) if rule.version == latest => {
                let stored = self.get(&rule.rule_id, latest)?;
                if stored.content_digest != rule.content_digest {
                    return Err(LceError::validation(format!(
                        "content of rule {} version {latest} is immutable",
                        rule.rule_id
                    )));
                }
                Some(stored)
            }
            Some(latest) if rule.version == latest + 1 => Some(self.get(&rule.rule_id, latest)?),
            Some(latest) => {
                return Err(LceError::validation(format!(
                    "rule {} version {} does not follow latest version {latest}",
                    rule.rule_id, rule.version
                )))
            }
        };

        if let Some(previous) = previous {
            for key in index_keys(&previous) {
                batch.delete(key);
            }
        }
        batch.put_json(version_key(&rule.rule_id, rule.version), rule)?;
        batch.put_json(latest_key(&rule.rule_id), &rule.version)?;
        for key in index_keys(rule) {
            batch.put_marker(key);
        }
        Ok(())
    }

    /// Soft-delete: store the latest version as Deprecated. History remains.
    pub fn deprecate(&self, rule_id: &str, ctx: &TxContext) -> LceResult<ComplianceRule> {
        let mut rule = self.get_latest(rule_id)?;
        if rule.status == RuleStatus::Deprecated {
            return Err(LceError::AlreadyAtBoundary {
                id: rule_id.to_string(),
                reason: "rule is already deprecated".to_string(),
            });
        }
        rule.status = RuleStatus::Deprecated;
        rule.updated_at = ctx.now();
        self.save(&rule)?;
        Ok(rule)
    }
}
