//! Builds the two hashes that make a certificate tamper-evident:
//!
//! - `chain_hash` — the tenant-local linkage hash, a function of
//!   `previous_hash` and a fixed subset of certificate fields.
//! - `canonical_message` — the closed, frozen set of fields that get
//!   signed. Adding, removing, or reordering a field here changes the
//!   meaning of every future signature.
//!
//! Neither function touches storage or cryptography directly; `cdil-issuer`
//! calls these to build inputs, then hands the resulting bytes to
//! `cdil-crypto::signer`.

use cdil_core::canon::{self, CanonError, ObjectBuilder, Value};
use cdil_core::model::CanonicalMessage;
use cdil_core::{CertificateId, TenantId};
use chrono::{DateTime, Utc};

/// The exact, frozen set of fields `chain_hash` is derived from. Changing
/// this set — even adding a field — is a new chain-hash version and
/// invalidates every certificate issued under the old one.
pub fn chain_head_value(
    previous_hash: Option<&str>,
    certificate_id: &CertificateId,
    tenant_id: &TenantId,
    timestamp: DateTime<Utc>,
    note_hash: &str,
    model_version: &str,
    governance_policy_version: &str,
) -> Value {
    ObjectBuilder::new()
        .field("previous_hash", previous_hash.map(|s| s.to_string()))
        .field("certificate_id", certificate_id.as_str())
        .field("tenant_id", tenant_id.as_str())
        .field("timestamp", timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .field("note_hash", note_hash)
        .field("model_version", model_version)
        .field("governance_policy_version", governance_policy_version)
        .build()
}

#[allow(clippy::too_many_arguments)]
pub fn compute_chain_hash(
    previous_hash: Option<&str>,
    certificate_id: &CertificateId,
    tenant_id: &TenantId,
    timestamp: DateTime<Utc>,
    note_hash: &str,
    model_version: &str,
    governance_policy_version: &str,
) -> Result<String, CanonError> {
    let value = chain_head_value(
        previous_hash,
        certificate_id,
        tenant_id,
        timestamp,
        note_hash,
        model_version,
        governance_policy_version,
    );
    cdil_crypto::hash_canonical(&value)
}

/// The closed signed-field set, as a c14n value ready for `canon::encode`.
/// Field order here is irrelevant — `ObjectBuilder` sorts on encode — but
/// the *set* of fields is the contract.
pub fn canonical_message_value(msg: &CanonicalMessage) -> Value {
    ObjectBuilder::new()
        .field("certificate_id", msg.certificate_id.as_str())
        .field("chain_hash", msg.chain_hash.as_str())
        .field("governance_policy_hash", msg.governance_policy_hash.as_str())
        .field("governance_policy_version", msg.governance_policy_version.as_str())
        .field(
            "human_attested_at_utc",
            msg.human_attested_at_utc.map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
        )
        .field("human_reviewed", msg.human_reviewed)
        .field("human_reviewer_id_hash", msg.human_reviewer_id_hash.clone())
        .field("issued_at_utc", msg.issued_at_utc.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .field("key_id", msg.key_id.as_str())
        .field("model_name", msg.model_name.as_str())
        .field("model_version", msg.model_version.as_str())
        .field("note_hash", msg.note_hash.as_str())
        .field("nonce", msg.nonce.as_str())
        .field("prompt_version", msg.prompt_version.as_str())
        .field("server_timestamp", msg.server_timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .field("tenant_id", msg.tenant_id.as_str())
        .build()
}

pub fn canonical_message_bytes(msg: &CanonicalMessage) -> Result<Vec<u8>, CanonError> {
    canon::encode(&canonical_message_value(msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdil_core::{CertificateId, KeyId, TenantId};

    fn sample_timestamp() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-15T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    #[test]
    fn chain_hash_is_deterministic() {
        let cert_id = CertificateId::generate();
        let tenant_id = TenantId::from_string("acme".to_string());
        let a = compute_chain_hash(None, &cert_id, &tenant_id, sample_timestamp(), "nh", "v1", "gp1").unwrap();
        let b = compute_chain_hash(None, &cert_id, &tenant_id, sample_timestamp(), "nh", "v1", "gp1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn chain_hash_is_prefixed() {
        let cert_id = CertificateId::generate();
        let tenant_id = TenantId::from_string("acme".to_string());
        let hash = compute_chain_hash(None, &cert_id, &tenant_id, sample_timestamp(), "nh", "v1", "gp1").unwrap();
        assert!(hash.starts_with("sha256:"));
    }

    #[test]
    fn changing_previous_hash_changes_chain_hash() {
        let cert_id = CertificateId::generate();
        let tenant_id = TenantId::from_string("acme".to_string());
        let a = compute_chain_hash(None, &cert_id, &tenant_id, sample_timestamp(), "nh", "v1", "gp1").unwrap();
        let b = compute_chain_hash(
            Some("sha256:deadbeef"),
            &cert_id,
            &tenant_id,
            sample_timestamp(),
            "nh",
            "v1",
            "gp1",
        )
        .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn canonical_message_bytes_are_deterministic() {
        let msg = CanonicalMessage {
            certificate_id: CertificateId::generate(),
            chain_hash: "sha256:abc".to_string(),
            governance_policy_hash: "sha256:def".to_string(),
            governance_policy_version: "v1".to_string(),
            human_attested_at_utc: None,
            human_reviewed: true,
            human_reviewer_id_hash: None,
            issued_at_utc: sample_timestamp(),
            key_id: KeyId::generate(),
            model_name: "gpt".to_string(),
            model_version: "1.0".to_string(),
            note_hash: "sha256:111".to_string(),
            nonce: "n1".to_string(),
            prompt_version: "p1".to_string(),
            server_timestamp: sample_timestamp(),
            tenant_id: TenantId::from_string("acme".to_string()),
        };
        let a = canonical_message_bytes(&msg).unwrap();
        let b = canonical_message_bytes(&msg).unwrap();
        assert_eq!(a, b);
    }
}
