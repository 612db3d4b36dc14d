//! SHA-256 hashing with the frozen `sha256:` prefix convention.
//!
//! Every hash CDIL stores or returns — `note_hash`, `patient_hash`,
//! `reviewer_hash`, `chain_hash`, `event_hash` — goes through one of these
//! two functions so the prefix convention can never drift between call
//! sites.

use cdil_core::canon::{self, Value};
use sha2::{Digest, Sha256};

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub fn sha256_prefixed(data: &[u8]) -> String {
    format!("sha256:{}", sha256_hex(data))
}

/// Canonicalize `value` with c14n v1, then hash the result, `sha256:`-prefixed.
pub fn hash_canonical(value: &Value) -> Result<String, canon::CanonError> {
    let bytes = canon::encode(value)?;
    Ok(sha256_prefixed(&bytes))
}
