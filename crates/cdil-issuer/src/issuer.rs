//! The certificate issuer: binds a clinical documentation request and an
//! authenticated identity into exactly one signed, chained, persisted
//! `Certificate`, plus its genesis audit event.

use std::sync::Arc;

use cdil_core::model::{Certificate, CanonicalMessage, IntegrityChain, Signature};
use cdil_core::{CdilError, CdilResult, CertificateId, Identity, TenantId};
use cdil_crypto::KeyRegistry;
use cdil_ledger::AuditLedger;
use cdil_storage::Store;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::locks::TenantLocks;
use crate::phi::detect_phi_patterns;

/// What a caller submits to mint a certificate. Deliberately carries no
/// `tenant_id` field — the tenant is always taken from the authenticated
/// [`Identity`], never from request content.
#[derive(Debug, Clone)]
pub struct ClinicalDocumentationRequest {
    /// Consumed for hashing only; never logged, never retained.
    pub note_body: String,
    pub model_name: String,
    pub model_version: String,
    pub prompt_version: String,
    pub governance_policy_version: String,
    pub governance_policy_hash: String,
    pub finalized_at: DateTime<Utc>,
    pub ehr_referenced_at: Option<DateTime<Utc>>,
    pub ehr_commit_id: Option<String>,
    pub patient_identifier: Option<String>,
    pub reviewer_identifier: Option<String>,
    pub human_reviewed: bool,
    pub human_attested_at: Option<DateTime<Utc>>,
}

pub struct CertificateIssuer {
    store: Arc<dyn Store>,
    keys: Arc<KeyRegistry>,
    ledger: Arc<AuditLedger>,
    locks: TenantLocks,
}

impl CertificateIssuer {
    pub fn new(store: Arc<dyn Store>, keys: Arc<KeyRegistry>, ledger: Arc<AuditLedger>) -> Self {
        Self { store, keys, ledger, locks: TenantLocks::new() }
    }

    pub fn issue(
        &self,
        identity: &Identity,
        mut request: ClinicalDocumentationRequest,
    ) -> CdilResult<Certificate> {
        let tenant_id = identity.tenant_id.clone();

        let phi_hits = detect_phi_patterns(&request.note_body);
        if !phi_hits.is_empty() {
            return Err(CdilError::PhiDetected { patterns: phi_hits });
        }

        let note_hash = cdil_crypto::sha256_prefixed(request.note_body.as_bytes());
        let patient_hash = request.patient_identifier.as_ref().map(|s| cdil_crypto::sha256_prefixed(s.as_bytes()));
        let reviewer_hash = request.reviewer_identifier.as_ref().map(|s| cdil_crypto::sha256_prefixed(s.as_bytes()));

        // Note body served its only purpose; do not let it live on past this point.
        request.note_body.clear();
        request.note_body.shrink_to_fit();

        let certificate_id = CertificateId::generate();
        let lock = self.locks.lock_for(tenant_id.as_str());
        let _guard = lock.lock().unwrap();

        let previous_hash = self.store.chain_head(&tenant_id)?;
        let now = Utc::now();
        let chain_hash = cdil_chain::compute_chain_hash(
            previous_hash.as_deref(),
            &certificate_id,
            &tenant_id,
            now,
            &note_hash,
            &request.model_version,
            &request.governance_policy_version,
        )?;

        let key = self.keys.active_key(&tenant_id)?;
        let nonce = Uuid::now_v7().to_string();

        if !self.store.check_and_record_nonce(&tenant_id, &nonce, now)? {
            return Err(CdilError::NonceAlreadyUsed);
        }

        let canonical_message = CanonicalMessage {
            certificate_id: certificate_id.clone(),
            chain_hash: chain_hash.clone(),
            governance_policy_hash: request.governance_policy_hash.clone(),
            governance_policy_version: request.governance_policy_version.clone(),
            human_attested_at_utc: request.human_attested_at,
            human_reviewed: request.human_reviewed,
            human_reviewer_id_hash: reviewer_hash.clone(),
            issued_at_utc: now,
            key_id: key.key_id.clone(),
            model_name: request.model_name.clone(),
            model_version: request.model_version.clone(),
            note_hash: note_hash.clone(),
            nonce,
            prompt_version: request.prompt_version.clone(),
            server_timestamp: now,
            tenant_id: tenant_id.clone(),
        };

        let message_bytes = cdil_chain::canonical_message_bytes(&canonical_message)?;
        let signing_key = self.keys.signing_key(&key)?;
        let signature_b64 = cdil_crypto::signer::sign_bytes(&signing_key, &message_bytes);

        let certificate = Certificate {
            certificate_id: certificate_id.clone(),
            tenant_id: tenant_id.clone(),
            timestamp: now,
            finalized_at: request.finalized_at,
            ehr_referenced_at: request.ehr_referenced_at,
            ehr_commit_id: request.ehr_commit_id.clone(),
            model_name: request.model_name.clone(),
            model_version: request.model_version.clone(),
            prompt_version: request.prompt_version.clone(),
            governance_policy_version: request.governance_policy_version.clone(),
            policy_hash: request.governance_policy_hash.clone(),
            note_hash,
            patient_hash,
            reviewer_hash,
            human_reviewed: request.human_reviewed,
            human_attested_at: request.human_attested_at,
            integrity_chain: IntegrityChain { previous_hash, chain_hash },
            signature: Signature {
                key_id: key.key_id.clone(),
                algorithm: cdil_crypto::ALGORITHM.to_string(),
                signature_b64,
            },
            canonical_message,
        };

        // Append the genesis audit event before the certificate write so a
        // persisted certificate can never exist without one: if the write
        // below fails, at worst an audit event references a certificate
        // that was never stored, which no invariant forbids.
        self.ledger.append(
            &tenant_id,
            "certificate",
            certificate_id.as_str(),
            "issue",
            &serde_json::json!({
                "certificate_id": certificate_id.as_str(),
                "note_hash": certificate.note_hash,
            }),
            Some(identity.subject.clone()),
        )?;

        self.store.put_certificate(&certificate)?;

        tracing::info!(
            tenant_id = tenant_id.as_str(),
            certificate_id = certificate_id.as_str(),
            "certificate issued"
        );

        Ok(certificate)
    }
}
