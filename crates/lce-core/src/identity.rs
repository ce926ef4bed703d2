//! # Identifiers
//!
//! Deterministic identifier minting and validation of caller-supplied
//! identifiers.
//!
//! Minted identifiers are UUID v5 values over the transaction ID and a
//! per-context sequence number, rendered with a short kind prefix
//! (`exec-…`, `evt-…`, `esc-…`). Caller-supplied identifiers (rule IDs,
//! domains, entity types) become components of composite storage keys, so
//! they must be non-empty and free of the key separator.

use uuid::Uuid;

use crate::error::LceError;
use crate::store::KEY_SEPARATOR;

/// Namespace for all identifiers minted by the engine.
const ENGINE_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6c, 0x63, 0x65, 0x2d, 0x69, 0x64, 0x2d, 0x6e, 0x61, 0x6d, 0x65, 0x73, 0x70, 0x61, 0x63, 0x65,
]);

/// Derive an identifier from a transaction ID and sequence number.
pub fn derive_id(prefix: &str, tx_id: &str, seq: u64) -> String {
    let name = format!("{prefix}:{tx_id}:{seq}");
    let id = Uuid::new_v5(&ENGINE_NAMESPACE, name.as_bytes());
    format!("{prefix}-{}", id.simple())
}

/// Validate an identifier that will be embedded in a composite key.
///
/// `field` names the offending field in the error message.
pub fn validate_identifier(field: &str, value: &str) -> Result<(), LceError> {
    if value.trim().is_empty() {
        return Err(LceError::validation(format!("{field} is required")));
    }
    if value.contains(KEY_SEPARATOR) {
        return Err(LceError::validation(format!(
            "{field} \"{value}\" must not contain '{KEY_SEPARATOR}'"
        )));
    }
    if value.chars().any(char::is_control) {
        return Err(LceError::validation(format!(
            "{field} must not contain control characters"
        )));
    }
    Ok(())
}
