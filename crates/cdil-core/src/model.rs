//! The CDIL data model: tenants, keys, certificates, audit events, nonces.
//!
//! Field names below are the wire/storage contract — renaming a field here
//! is a breaking change to every persisted record and every bundle already
//! handed to a third party.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CertificateId, EventId, KeyId, TenantId};

/// An already-authenticated caller. Transport, JWT parsing, and
/// role-based authorization all happen upstream of the core; by the time
/// an `Identity` reaches `cdil-issuer` or `cdil-verifier`, it is trusted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    pub tenant_id: TenantId,
    pub role: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Retired,
}

/// Boundary of isolation. Created once; never deleted while any
/// certificate or audit event references it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub status: TenantStatus,
    /// Opaque retention-policy blob; the core never interprets it.
    pub retention_policy: serde_json::Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStatus {
    Active,
    Rotated,
    Retired,
}

/// An EC P-256 JSON Web Key, public half only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    /// base64url, unpadded.
    pub x: String,
    /// base64url, unpadded.
    pub y: String,
    pub kid: String,
}

/// A signing keypair owned by exactly one tenant. At most one key per
/// tenant has `status == Active`.
#[derive(Clone, Serialize, Deserialize)]
pub struct TenantKey {
    pub key_id: KeyId,
    pub tenant_id: TenantId,
    /// PKCS#8 DER of the private scalar. `None` for keys whose private
    /// material has been purged (e.g. an externally-revoked key) —
    /// verification of certificates signed under the key still works
    /// from `public_jwk` alone.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub private_key_pkcs8: Option<Vec<u8>>,
    pub public_jwk: Jwk,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantKey")
            .field("key_id", &self.key_id)
            .field("tenant_id", &self.tenant_id)
            .field("private_key_pkcs8", &self.private_key_pkcs8.as_ref().map(|_| "<redacted>"))
            .field("public_jwk", &self.public_jwk)
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// The tenant-local linkage hash for one certificate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityChain {
    pub previous_hash: Option<String>,
    pub chain_hash: String,
}

/// The closed set of fields that are signed. Adding, removing, or
/// reordering a field here changes every future signature's meaning —
/// this set is frozen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub certificate_id: CertificateId,
    pub chain_hash: String,
    pub governance_policy_hash: String,
    pub governance_policy_version: String,
    pub human_attested_at_utc: Option<DateTime<Utc>>,
    pub human_reviewed: bool,
    pub human_reviewer_id_hash: Option<String>,
    pub issued_at_utc: DateTime<Utc>,
    pub key_id: KeyId,
    pub model_name: String,
    pub model_version: String,
    pub note_hash: String,
    pub nonce: String,
    pub prompt_version: String,
    pub server_timestamp: DateTime<Utc>,
    pub tenant_id: TenantId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub key_id: KeyId,
    pub algorithm: String,
    /// base64-encoded ECDSA signature over the canonicalized `canonical_message`.
    pub signature_b64: String,
}

/// An immutable claim about one version of one note. No field may change
/// after issuance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Certificate {
    pub certificate_id: CertificateId,
    pub tenant_id: TenantId,
    pub timestamp: DateTime<Utc>,
    pub finalized_at: DateTime<Utc>,
    pub ehr_referenced_at: Option<DateTime<Utc>>,
    pub ehr_commit_id: Option<String>,
    pub model_name: String,
    pub model_version: String,
    pub prompt_version: String,
    pub governance_policy_version: String,
    pub policy_hash: String,
    pub note_hash: String,
    pub patient_hash: Option<String>,
    pub reviewer_hash: Option<String>,
    pub human_reviewed: bool,
    pub human_attested_at: Option<DateTime<Utc>>,
    pub integrity_chain: IntegrityChain,
    pub signature: Signature,
    pub canonical_message: CanonicalMessage,
}

/// One entry in a tenant's append-only audit ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: EventId,
    pub tenant_id: TenantId,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<String>,
    pub object_type: String,
    pub object_id: String,
    pub action: String,
    /// Stored and hashed as text, verbatim — never re-parsed as JSON.
    pub event_payload_json: String,
    pub prev_event_hash: Option<String>,
    pub event_hash: String,
}

/// A consumed `(tenant_id, nonce)` pair, recorded at consumption time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedNonce {
    pub tenant_id: TenantId,
    pub nonce: String,
    pub consumed_at: DateTime<Utc>,
}
