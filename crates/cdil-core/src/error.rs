//! Error taxonomy shared by every CDIL crate.
//!
//! One variant per failure kind the core can produce. `Display` messages
//! never embed a full hash (only its first 16 hex characters, via
//! [`crate::canon::short_hash`]-style truncation at the call site) and never
//! embed PHI — note text, patient identifiers, or reviewer identifiers never
//! reach an error value in the first place.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CdilError {
    // --- Tenant / identity ---------------------------------------------
    #[error("tenant_id is required")]
    TenantIdRequired,

    #[error("tenant {0} is not active")]
    InvalidTenant(String),

    #[error("certificate belongs to a different tenant")]
    TenantMismatch,

    // --- Key registry -----------------------------------------------------
    #[error("no key {key_id} for tenant {tenant_id}")]
    KeyNotFound { tenant_id: String, key_id: String },

    #[error("private key material unavailable for key {0}")]
    PrivateKeyUnavailable(String),

    // --- Certificate issuance & structure ----------------------------------
    #[error("certificate {0} not found")]
    CertificateNotFound(String),

    #[error("chain hash mismatch: stored={stored} recomputed={recomputed}")]
    ChainHashMismatch { stored: String, recomputed: String },

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("finalized_at is after ehr_referenced_at")]
    FinalizedAfterEhrReference,

    #[error("canonical_message is missing key_id")]
    MissingKeyId,

    #[error("certificate has no signature")]
    MissingSignature,

    #[error("certificate has no integrity_chain")]
    MissingChain,

    #[error("phi-shaped pattern detected in request body")]
    PhiDetected { patterns: Vec<String> },

    // --- Nonces -------------------------------------------------------------
    #[error("nonce already used for this tenant")]
    NonceAlreadyUsed,

    #[error("nonce missing from canonical message")]
    NonceMissing,

    // --- Commit tokens --------------------------------------------------
    #[error("commit token has expired")]
    TokenExpired,

    #[error("commit token is invalid")]
    InvalidToken,

    // --- Canonical encoding -------------------------------------------------
    #[error("canonicalization failed: {0}")]
    Canon(#[from] crate::canon::CanonError),

    // --- Adapter boundary -----------------------------------------------
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type CdilResult<T> = Result<T, CdilError>;

impl CdilError {
    /// The machine-readable check/error tag the verifier and the HTTP
    /// boundary surface to callers — stable across `Display` wording
    /// changes.
    pub fn code(&self) -> &'static str {
        match self {
            CdilError::TenantIdRequired => "tenant_id_required",
            CdilError::InvalidTenant(_) => "invalid_tenant",
            CdilError::TenantMismatch => "tenant_mismatch",
            CdilError::KeyNotFound { .. } => "key_not_found",
            CdilError::PrivateKeyUnavailable(_) => "private_key_unavailable",
            CdilError::CertificateNotFound(_) => "certificate_not_found",
            CdilError::ChainHashMismatch { .. } => "chain_hash_mismatch",
            CdilError::InvalidSignature => "invalid_signature",
            CdilError::FinalizedAfterEhrReference => "finalized_after_ehr_reference",
            CdilError::MissingKeyId => "missing_key_id",
            CdilError::MissingSignature => "missing_signature",
            CdilError::MissingChain => "missing_chain",
            CdilError::PhiDetected { .. } => "phi_detected",
            CdilError::NonceAlreadyUsed => "nonce_already_used",
            CdilError::NonceMissing => "nonce_missing",
            CdilError::TokenExpired => "token_expired",
            CdilError::InvalidToken => "invalid_token",
            CdilError::Canon(_) => "canonicalization_failed",
            CdilError::Storage(_) => "storage_error",
            CdilError::Serialization(_) => "serialization_error",
        }
    }
}

/// Truncate a hex hash to the 16-character prefix safe to surface in an
/// error body — never return a full hash to a caller through `debug`. Hashes
/// are always `sha256:`-prefixed, so the prefix is stripped first; the 16
/// characters returned are real hex digits of the hash, not of the prefix.
pub fn short_hash(hash: &str) -> &str {
    let hex = hash.strip_prefix("sha256:").unwrap_or(hash);
    let end = hex.char_indices().nth(16).map(|(i, _)| i).unwrap_or(hex.len());
    &hex[..end]
}
