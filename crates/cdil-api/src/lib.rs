//! The in-process contract the ambient HTTP shell (`cdil-gateway`) and the
//! offline CLI (`cdil-ledger-cli`) are both built on top of.
//!
//! `GatewayApi` sits in front of `GatewayService` the way a service trait
//! sits in front of its implementation, but HTTP transport, JSON framing,
//! and auth are explicitly out of this crate's scope — every method here
//! already takes an authenticated [`Identity`]. `cdil-gateway` is the thin
//! layer that turns HTTP requests into `Identity` + DTO and calls through.

pub mod dto;

use std::sync::Arc;

use cdil_core::model::{Certificate, Jwk};
use cdil_core::{CdilError, CdilResult, Identity, KeyId, TenantId};
use cdil_crypto::KeyRegistry;
use cdil_issuer::{CertificateIssuer, ClinicalDocumentationRequest};
use cdil_ledger::{AuditLedger, ChainVerification};
use cdil_storage::Store;
use cdil_verifier::{CertificateVerifier, VerificationReport};
use dto::{CommitTokenResponse, EvidenceBundleResponse};

/// The operations every CDIL-facing surface (HTTP gateway, offline tools,
/// future gRPC front end) is built from. Every method takes an
/// already-authenticated `Identity` — role checks and transport concerns
/// live entirely upstream of this trait.
pub trait GatewayApi {
    fn issue_certificate(&self, identity: &Identity, request: ClinicalDocumentationRequest) -> CdilResult<Certificate>;
    fn get_certificate(&self, identity: &Identity, certificate_id: &str) -> CdilResult<Certificate>;
    fn verify_certificate(&self, identity: &Identity, certificate_id: &str) -> CdilResult<VerificationReport>;
    fn get_evidence_bundle(
        &self,
        identity: &Identity,
        certificate_id: &str,
        with_litigation_metadata: bool,
    ) -> CdilResult<EvidenceBundleResponse>;
    fn verify_and_authorize(&self, identity: &Identity, certificate_id: &str) -> CdilResult<CommitTokenResponse>;
    fn redeem_commit_token(&self, identity: &Identity, token: &str) -> CdilResult<String>;
    fn get_public_key(&self, identity: &Identity, key_id: &str) -> CdilResult<Jwk>;
    fn rotate_key(&self, identity: &Identity) -> CdilResult<KeyId>;
    fn verify_audit_chain(&self, identity: &Identity) -> CdilResult<ChainVerification>;
}

/// Wires the component crates together behind one facade. This is the
/// struct `cdil-gateway`'s `main` constructs once at startup and clones
/// (cheaply — every field is an `Arc`) into each request handler.
#[derive(Clone)]
pub struct GatewayService {
    store: Arc<dyn Store>,
    keys: Arc<KeyRegistry>,
    issuer: Arc<CertificateIssuer>,
    verifier: Arc<CertificateVerifier>,
    bundler: Arc<cdil_bundle::BundlePackager>,
    ledger: Arc<AuditLedger>,
    commit_token_secret: String,
}

impl GatewayService {
    pub fn new(store: Arc<dyn Store>, commit_token_secret: String) -> Self {
        let keys = Arc::new(KeyRegistry::new(store.clone()));
        let ledger = Arc::new(AuditLedger::new(store.clone()));
        let issuer = Arc::new(CertificateIssuer::new(store.clone(), keys.clone(), ledger.clone()));
        let verifier = Arc::new(CertificateVerifier::new(store.clone(), keys.clone()));
        let bundler = Arc::new(cdil_bundle::BundlePackager::new(store.clone(), keys.clone(), verifier.clone()));
        Self { store, keys, issuer, verifier, bundler, ledger, commit_token_secret }
    }
}

impl GatewayApi for GatewayService {
    fn issue_certificate(&self, identity: &Identity, request: ClinicalDocumentationRequest) -> CdilResult<Certificate> {
        self.issuer.issue(identity, request)
    }

    fn get_certificate(&self, identity: &Identity, certificate_id: &str) -> CdilResult<Certificate> {
        self.store
            .get_certificate(&identity.tenant_id, certificate_id)?
            .ok_or_else(|| CdilError::CertificateNotFound(certificate_id.to_string()))
    }

    fn verify_certificate(&self, identity: &Identity, certificate_id: &str) -> CdilResult<VerificationReport> {
        self.verifier.verify(identity, certificate_id)
    }

    fn get_evidence_bundle(
        &self,
        identity: &Identity,
        certificate_id: &str,
        with_litigation_metadata: bool,
    ) -> CdilResult<EvidenceBundleResponse> {
        let bundle = self.bundler.package(identity, certificate_id, with_litigation_metadata)?;
        Ok(EvidenceBundleResponse::from(bundle))
    }

    fn verify_and_authorize(&self, identity: &Identity, certificate_id: &str) -> CdilResult<CommitTokenResponse> {
        let report = self.verifier.verify(identity, certificate_id)?;
        if !report.valid {
            return Err(CdilError::InvalidSignature);
        }
        let token = cdil_crypto::commit_token::mint(&self.commit_token_secret, &identity.tenant_id, certificate_id)?;
        Ok(CommitTokenResponse { token, ttl_seconds: cdil_crypto::COMMIT_TOKEN_TTL_SECONDS })
    }

    fn redeem_commit_token(&self, identity: &Identity, token: &str) -> CdilResult<String> {
        let claims = cdil_crypto::commit_token::verify(&self.commit_token_secret, token)?;
        if claims.sub != identity.tenant_id.as_str() {
            return Err(CdilError::TenantMismatch);
        }
        let now = chrono::Utc::now();
        if !self.store.check_and_record_nonce(&identity.tenant_id, &claims.nonce, now)? {
            return Err(CdilError::NonceAlreadyUsed);
        }
        Ok(claims.certificate_id)
    }

    fn get_public_key(&self, identity: &Identity, key_id: &str) -> CdilResult<Jwk> {
        let key = self.keys.key_by_id(&identity.tenant_id, &KeyId::from_string(key_id.to_string()))?;
        Ok(key.public_jwk)
    }

    fn rotate_key(&self, identity: &Identity) -> CdilResult<KeyId> {
        self.keys.rotate(&identity.tenant_id)
    }

    fn verify_audit_chain(&self, identity: &Identity) -> CdilResult<ChainVerification> {
        self.ledger.verify_chain(Some(&identity.tenant_id))
    }
}

/// Used by admin tooling that legitimately needs to address a tenant by
/// id rather than through an already-scoped `Identity` — e.g. a
/// provisioning script creating the tenant row in the first place.
pub fn tenant_id(raw: &str) -> TenantId {
    TenantId::from_string(raw.to_string())
}
