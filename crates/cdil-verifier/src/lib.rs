//! Certificate verification: chain-hash recomputation, signature check,
//! timing-integrity check, and structural completeness — each
//! independently reported, never short-circuited by an earlier failure.
//!
//! Every check here is reproducible offline from a [`Certificate`] alone
//! plus the signer's public key; `cdil-bundle` packages exactly those two
//! things so a holder never needs to call back into this service.

use cdil_core::error::short_hash;
use cdil_core::model::Certificate;
use cdil_core::{CdilResult, Identity};
use cdil_storage::Store;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationFailure {
    pub check: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub valid: bool,
    pub failures: Vec<VerificationFailure>,
}

impl VerificationReport {
    fn from_failures(failures: Vec<VerificationFailure>) -> Self {
        Self { valid: failures.is_empty(), failures }
    }
}

pub struct CertificateVerifier {
    store: Arc<dyn Store>,
    keys: Arc<cdil_crypto::KeyRegistry>,
}

impl CertificateVerifier {
    pub fn new(store: Arc<dyn Store>, keys: Arc<cdil_crypto::KeyRegistry>) -> Self {
        Self { store, keys }
    }

    /// Tenant-gated lookup + verify. A certificate owned by a different
    /// tenant is reported exactly like one that does not exist, so a
    /// cross-tenant probe cannot distinguish "not mine" from "never
    /// existed".
    pub fn verify(&self, identity: &Identity, certificate_id: &str) -> CdilResult<VerificationReport> {
        let cert = self
            .store
            .get_certificate(&identity.tenant_id, certificate_id)?
            .ok_or_else(|| cdil_core::CdilError::CertificateNotFound(certificate_id.to_string()))?;
        self.verify_certificate(&cert)
    }

    /// Runs the four checks against an already-fetched certificate,
    /// without re-applying the tenant gate — used both by [`Self::verify`]
    /// and by offline bundle verification where the caller already holds
    /// the certificate and its signer's public key.
    pub fn verify_certificate(&self, cert: &Certificate) -> CdilResult<VerificationReport> {
        let mut failures = Vec::new();

        check_chain_hash(cert, &mut failures);
        self.check_signature(cert, &mut failures)?;
        check_timing_integrity(cert, &mut failures);
        check_structural_completeness(cert, &mut failures);

        let report = VerificationReport::from_failures(failures);
        tracing::info!(
            certificate_id = cert.certificate_id.as_str(),
            valid = report.valid,
            failure_count = report.failures.len(),
            "certificate verified"
        );
        Ok(report)
    }

    fn check_signature(&self, cert: &Certificate, failures: &mut Vec<VerificationFailure>) -> CdilResult<()> {
        let key = match self.keys.key_by_id(&cert.tenant_id, &cert.signature.key_id) {
            Ok(key) => key,
            Err(_) => {
                failures.push(VerificationFailure {
                    check: "signature".to_string(),
                    error: "key_not_found".to_string(),
                    debug: None,
                });
                return Ok(());
            }
        };
        let verifying_key = self.keys.verifying_key(&key)?;
        let message_bytes = cdil_chain::canonical_message_bytes(&cert.canonical_message)
            .map_err(cdil_core::CdilError::from)?;
        if cdil_crypto::signer::verify_bytes(&verifying_key, &message_bytes, &cert.signature.signature_b64).is_err()
        {
            failures.push(VerificationFailure {
                check: "signature".to_string(),
                error: "invalid_signature".to_string(),
                debug: None,
            });
        }
        Ok(())
    }
}

fn check_chain_hash(cert: &Certificate, failures: &mut Vec<VerificationFailure>) {
    let recomputed = match cdil_chain::compute_chain_hash(
        cert.integrity_chain.previous_hash.as_deref(),
        &cert.certificate_id,
        &cert.tenant_id,
        cert.timestamp,
        &cert.note_hash,
        &cert.model_version,
        &cert.governance_policy_version,
    ) {
        Ok(h) => h,
        Err(_) => {
            failures.push(VerificationFailure {
                check: "chain_hash".to_string(),
                error: "chain_hash_mismatch".to_string(),
                debug: None,
            });
            return;
        }
    };
    if recomputed != cert.integrity_chain.chain_hash {
        failures.push(VerificationFailure {
            check: "chain_hash".to_string(),
            error: "chain_hash_mismatch".to_string(),
            debug: Some(format!(
                "stored={} recomputed={}",
                short_hash(&cert.integrity_chain.chain_hash),
                short_hash(&recomputed)
            )),
        });
    }
}

fn check_timing_integrity(cert: &Certificate, failures: &mut Vec<VerificationFailure>) {
    if let Some(ehr_referenced_at) = cert.ehr_referenced_at {
        if cert.finalized_at > ehr_referenced_at {
            failures.push(VerificationFailure {
                check: "timing_integrity".to_string(),
                error: "finalized_after_ehr_reference".to_string(),
                debug: None,
            });
        }
    }
}

fn check_structural_completeness(cert: &Certificate, failures: &mut Vec<VerificationFailure>) {
    if cert.signature.signature_b64.is_empty() {
        failures.push(VerificationFailure {
            check: "structural".to_string(),
            error: "missing_signature".to_string(),
            debug: None,
        });
    }
    if cert.integrity_chain.chain_hash.is_empty() {
        failures.push(VerificationFailure {
            check: "structural".to_string(),
            error: "missing_chain".to_string(),
            debug: None,
        });
    }
    if cert.signature.key_id.as_str().is_empty() {
        failures.push(VerificationFailure {
            check: "structural".to_string(),
            error: "missing_key_id".to_string(),
            debug: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdil_core::{Identity, TenantId};
    use cdil_issuer::{CertificateIssuer, ClinicalDocumentationRequest};
    use cdil_ledger::AuditLedger;
    use cdil_storage::mem::InMemoryStore;
    use chrono::Utc;

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

    fn harness() -> (CertificateIssuer, CertificateVerifier, Identity) {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let keys = Arc::new(cdil_crypto::KeyRegistry::new(store.clone()));
        let ledger = Arc::new(AuditLedger::new(store.clone()));
        let issuer = CertificateIssuer::new(store.clone(), keys.clone(), ledger);
        let verifier = CertificateVerifier::new(store, keys);
        let identity = Identity { subject: "svc".to_string(), tenant_id: TenantId::from_string("acme".to_string()), role: "writer".to_string() };
        (issuer, verifier, identity)
    }

    #[test]
    fn freshly_issued_certificate_verifies_clean() {
        let (issuer, verifier, identity) = harness();
        let cert = issuer.issue(&identity, sample_request()).unwrap();
        let report = verifier.verify(&identity, cert.certificate_id.as_str()).unwrap();
        assert!(report.valid, "{:?}", report.failures);
    }

    #[test]
    fn tampered_chain_hash_fails_verification() {
        let (issuer, verifier, identity) = harness();
        let mut cert = issuer.issue(&identity, sample_request()).unwrap();
        cert.integrity_chain.chain_hash = "sha256:0000000000000000".to_string();
        let report = verifier.verify_certificate(&cert).unwrap();
        assert!(!report.valid);
        assert!(report.failures.iter().any(|f| f.error == "chain_hash_mismatch"));
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let (issuer, verifier, identity) = harness();
        let mut cert = issuer.issue(&identity, sample_request()).unwrap();
        cert.signature.signature_b64 = "AAAA".to_string();
        let report = verifier.verify_certificate(&cert).unwrap();
        assert!(!report.valid);
        assert!(report.failures.iter().any(|f| f.error == "invalid_signature"));
    }

    #[test]
    fn backdated_ehr_reference_fails_timing_check() {
        let (issuer, verifier, identity) = harness();
        let mut req = sample_request();
        let now = Utc::now();
        req.finalized_at = now;
        req.ehr_referenced_at = Some(now - chrono::Duration::hours(1));
        let cert = issuer.issue(&identity, req).unwrap();
        let report = verifier.verify_certificate(&cert).unwrap();
        assert!(report.failures.iter().any(|f| f.error == "finalized_after_ehr_reference"));
    }

    #[test]
    fn cross_tenant_lookup_reports_not_found() {
        let (issuer, verifier, identity) = harness();
        let cert = issuer.issue(&identity, sample_request()).unwrap();
        let other = Identity { subject: "svc".to_string(), tenant_id: TenantId::from_string("other-tenant".to_string()), role: "writer".to_string() };
        match verifier.verify(&other, cert.certificate_id.as_str()) {
            Err(cdil_core::CdilError::CertificateNotFound(_)) => {}
            other => panic!("expected CertificateNotFound, got {other:?}"),
        }
    }

    #[test]
    fn debug_field_is_truncated_to_16_chars_per_hash() {
        let (issuer, verifier, identity) = harness();
        let mut cert = issuer.issue(&identity, sample_request()).unwrap();
        cert.integrity_chain.chain_hash = "sha256:0000000000000000".to_string();
        let report = verifier.verify_certificate(&cert).unwrap();
        let failure = report.failures.iter().find(|f| f.error == "chain_hash_mismatch").unwrap();
        let debug = failure.debug.as_ref().unwrap();
        assert!(!debug.contains(&cert.integrity_chain.chain_hash));
        let stored_hex = &cert.integrity_chain.chain_hash["sha256:".len()..][..16];
        assert!(debug.contains(&format!("stored={stored_hex}")), "expected 16 real hex digits in {debug}");
        assert!(!debug.contains("stored=sha256:"), "debug field must not retain the sha256: prefix");
    }
}
