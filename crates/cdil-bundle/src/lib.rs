//! Packages a certificate into a self-contained, offline-verifiable
//! evidence/defense bundle. The archive *container* (zip, pdf, whatever a
//! caller wants) is out of scope here — this returns an in-memory
//! [`Bundle`] of named parts the caller serializes however it likes.

use std::sync::Arc;

use cdil_core::model::Certificate;
use cdil_core::{CdilResult, Identity};
use cdil_storage::Store;
use cdil_verifier::CertificateVerifier;
use chrono::Utc;
use p256::pkcs8::{EncodePublicKey, LineEnding};
use serde::Serialize;

/// The closed signed-field set, restated here only for the bundle's
/// `litigation_metadata.signed_fields` listing — never used to build or
/// check a signature.
const SIGNED_FIELD_NAMES: &[&str] = &[
    "certificate_id",
    "chain_hash",
    "governance_policy_hash",
    "governance_policy_version",
    "human_attested_at_utc",
    "human_reviewed",
    "human_reviewer_id_hash",
    "issued_at_utc",
    "key_id",
    "model_name",
    "model_version",
    "note_hash",
    "nonce",
    "prompt_version",
    "server_timestamp",
    "tenant_id",
];

#[derive(Debug, Clone, Serialize)]
pub struct ChainIntegrityProperties {
    pub prevents_insertion: bool,
    pub prevents_reordering: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LitigationMetadata {
    pub verification_status: String,
    pub verification_timestamp: chrono::DateTime<Utc>,
    pub key_id: String,
    pub algorithm: String,
    pub chain_hash: String,
    pub human_attestation_summary: String,
    pub signed_fields: Vec<String>,
    pub chain_integrity: ChainIntegrityProperties,
}

#[derive(Debug, Clone)]
pub struct Bundle {
    pub certificate_json: String,
    pub canonical_message_json: String,
    pub public_key_pem: String,
    pub verification_report_json: String,
    pub readme_txt: String,
    pub litigation_metadata_json: Option<String>,
}

pub struct BundlePackager {
    store: Arc<dyn Store>,
    keys: Arc<cdil_crypto::KeyRegistry>,
    verifier: Arc<CertificateVerifier>,
}

impl BundlePackager {
    pub fn new(store: Arc<dyn Store>, keys: Arc<cdil_crypto::KeyRegistry>, verifier: Arc<CertificateVerifier>) -> Self {
        Self { store, keys, verifier }
    }

    /// Produces a bundle for one certificate. Reproducible from the
    /// certificate alone, modulo `verification_timestamp`.
    pub fn package(&self, identity: &Identity, certificate_id: &str, with_litigation_metadata: bool) -> CdilResult<Bundle> {
        let cert = self
            .store
            .get_certificate(&identity.tenant_id, certificate_id)?
            .ok_or_else(|| cdil_core::CdilError::CertificateNotFound(certificate_id.to_string()))?;

        let report = self.verifier.verify_certificate(&cert)?;
        let key = self.keys.key_by_id(&cert.tenant_id, &cert.signature.key_id)?;
        let verifying_key = self.keys.verifying_key(&key)?;
        let public_key_pem = verifying_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| cdil_core::CdilError::Serialization(format!("pem encode: {e}")))?;

        let certificate_json = serde_json::to_string_pretty(&cert)
            .map_err(|e| cdil_core::CdilError::Serialization(e.to_string()))?;
        let canonical_message_json = serde_json::to_string_pretty(&cert.canonical_message)
            .map_err(|e| cdil_core::CdilError::Serialization(e.to_string()))?;
        let verification_report_json = serde_json::to_string_pretty(&report)
            .map_err(|e| cdil_core::CdilError::Serialization(e.to_string()))?;

        let litigation_metadata_json = if with_litigation_metadata {
            Some(
                serde_json::to_string_pretty(&litigation_metadata(&cert, &report))
                    .map_err(|e| cdil_core::CdilError::Serialization(e.to_string()))?,
            )
        } else {
            None
        };

        Ok(Bundle {
            certificate_json,
            canonical_message_json,
            public_key_pem,
            verification_report_json,
            readme_txt: readme_text(),
            litigation_metadata_json,
        })
    }
}

fn litigation_metadata(cert: &Certificate, report: &cdil_verifier::VerificationReport) -> LitigationMetadata {
    LitigationMetadata {
        verification_status: if report.valid { "valid".to_string() } else { "invalid".to_string() },
        verification_timestamp: Utc::now(),
        key_id: cert.signature.key_id.as_str().to_string(),
        algorithm: cert.signature.algorithm.clone(),
        chain_hash: cert.integrity_chain.chain_hash.clone(),
        human_attestation_summary: if cert.human_reviewed {
            "reviewed and attested by a named human reviewer".to_string()
        } else {
            "not human-reviewed".to_string()
        },
        signed_fields: SIGNED_FIELD_NAMES.iter().map(|s| s.to_string()).collect(),
        chain_integrity: ChainIntegrityProperties { prevents_insertion: true, prevents_reordering: true },
    }
}

fn readme_text() -> String {
    concat!(
        "CDIL Evidence Bundle — Offline Verification\n",
        "============================================\n\n",
        "1. Canonicalize canonical_message.json using c14n v1: sort object keys\n",
        "   code-point-ascending, no whitespace, minimal number forms.\n",
        "2. SHA-256 the canonicalized bytes.\n",
        "3. ECDSA-verify certificate.json's signature.signature_b64 against\n",
        "   public_key.pem over the canonicalized bytes from step 1.\n",
        "4. Re-derive chain_hash from certificate_id, tenant_id, timestamp,\n",
        "   note_hash, model_version, governance_policy_version, and\n",
        "   integrity_chain.previous_hash, canonicalized the same way, then\n",
        "   SHA-256'd and compared to integrity_chain.chain_hash.\n",
        "5. verification_report.json records this bundle's verification result\n",
        "   at generation time; re-running steps 1-4 independently is what makes\n",
        "   this bundle self-contained.\n",
    )
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdil_core::TenantId;
    use cdil_issuer::{CertificateIssuer, ClinicalDocumentationRequest};
    use cdil_ledger::AuditLedger;
    use cdil_storage::mem::InMemoryStore;

    fn setup() -> (CertificateIssuer, BundlePackager, Identity) {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let keys = Arc::new(cdil_crypto::KeyRegistry::new(store.clone()));
        let ledger = Arc::new(AuditLedger::new(store.clone()));
        let issuer = CertificateIssuer::new(store.clone(), keys.clone(), ledger);
        let verifier = Arc::new(CertificateVerifier::new(store.clone(), keys.clone()));
        let packager = BundlePackager::new(store, keys, verifier);
        let identity = Identity {
            subject: "svc".to_string(),
            tenant_id: TenantId::from_string("acme".to_string()),
            role: "writer".to_string(),
        };
        (issuer, packager, identity)
    }

    fn sample_request() -> ClinicalDocumentationRequest {
        ClinicalDocumentationRequest {
            note_body: "Patient tolerated procedure well.".to_string(),
            model_name: "clinical-writer".to_string(),
            model_version: "2.1.0".to_string(),
            prompt_version: "p3".to_string(),
            governance_policy_version: "gov-1".to_string(),
            governance_policy_hash: "sha256:policyhash".to_string(),
            finalized_at: Utc::now(),
            ehr_referenced_at: None,
            ehr_commit_id: None,
            patient_identifier: None,
            reviewer_identifier: None,
            human_reviewed: true,
            human_attested_at: Some(Utc::now()),
        }
    }

    #[test]
    fn bundle_contains_all_required_parts() {
        let (issuer, packager, identity) = setup();
        let cert = issuer.issue(&identity, sample_request()).unwrap();
        let bundle = packager.package(&identity, cert.certificate_id.as_str(), false).unwrap();
        assert!(bundle.certificate_json.contains(cert.certificate_id.as_str()));
        assert!(bundle.public_key_pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert!(bundle.verification_report_json.contains("\"valid\""));
        assert!(bundle.litigation_metadata_json.is_none());
    }

    #[test]
    fn litigation_metadata_is_included_when_requested() {
        let (issuer, packager, identity) = setup();
        let cert = issuer.issue(&identity, sample_request()).unwrap();
        let bundle = packager.package(&identity, cert.certificate_id.as_str(), true).unwrap();
        let metadata = bundle.litigation_metadata_json.unwrap();
        assert!(metadata.contains("\"signed_fields\""));
        assert!(metadata.contains("prevents_insertion"));
    }

    #[test]
    fn unknown_certificate_is_not_found() {
        let (_issuer, packager, identity) = setup();
        let err = packager.package(&identity, "does-not-exist", false).unwrap_err();
        assert!(matches!(err, cdil_core::CdilError::CertificateNotFound(_)));
    }
}
