//! # Content Digests
//!
//! SHA-256 digests over a canonical JSON rendering (object keys sorted
//! recursively, no insignificant whitespace). Used to fingerprint rule
//! content so that versions can be compared without field-by-field diffing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::LceError;

/// A SHA-256 digest of canonical JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the digest of any serializable value.
    pub fn of<T: Serialize>(value: &T) -> Result<Self, LceError> {
        let value = serde_json::to_value(value)?;
        let bytes = canonical_bytes(&value)?;
        let hash = Sha256::digest(&bytes);
        Ok(Self(hash.iter().map(|b| format!("{b:02x}")).collect()))
    }

    /// The digest as a lowercase hex string.
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.0)
    }
}

/// Render a JSON value with recursively sorted object keys.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, LceError> {
    Ok(serde_json::to_vec(&sort_keys(value))?)
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = serde_json::Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), sort_keys(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}
