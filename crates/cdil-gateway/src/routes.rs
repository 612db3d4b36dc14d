//! Route table matching the HTTP contract collaborators are expected to
//! expose. Identity extraction is a placeholder for real JWT/session
//! middleware — see the module doc on `main`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cdil_api::{GatewayApi, GatewayService};
use cdil_core::{CdilError, Identity, TenantId};
use cdil_issuer::ClinicalDocumentationRequest;
use serde::{Deserialize, Serialize};

pub fn router(service: GatewayService) -> Router {
    Router::new()
        .route("/v1/clinical/documentation", post(issue_certificate))
        .route("/v1/certificates/:id", get(get_certificate))
        .route("/v1/certificates/:id/verify", post(verify_certificate))
        .route("/v1/certificates/:id/evidence-bundle.json", get(get_evidence_bundle))
        .route("/v1/gatekeeper/verify-and-authorize", post(verify_and_authorize))
        .route("/v1/gatekeeper/redeem", post(redeem_commit_token))
        .route("/v1/keys/:key_id", get(get_public_key))
        .route("/v1/keys/rotate", post(rotate_key))
        .route("/v1/audit/chain/verify", get(verify_audit_chain))
        .with_state(Arc::new(service))
}

fn identity_from_headers(headers: &HeaderMap) -> Result<Identity, ApiError> {
    let subject = header_str(headers, "x-cdil-subject").ok_or(ApiError::Unauthenticated)?;
    let tenant = header_str(headers, "x-cdil-tenant").ok_or(ApiError::Unauthenticated)?;
    let role = header_str(headers, "x-cdil-role").unwrap_or_else(|| "unknown".to_string());
    Ok(Identity { subject, tenant_id: TenantId::from_string(tenant), role })
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(|s| s.to_string())
}

enum ApiError {
    Unauthenticated,
    Core(CdilError),
}

impl From<CdilError> for ApiError {
    fn from(e: CdilError) -> Self {
        ApiError::Core(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ApiError::Core(e) => (status_for(e), e.code()),
        };
        (status, Json(serde_json::json!({ "error": code }))).into_response()
    }
}

fn status_for(e: &CdilError) -> StatusCode {
    match e {
        CdilError::CertificateNotFound(_) | CdilError::KeyNotFound { .. } => StatusCode::NOT_FOUND,
        CdilError::TenantIdRequired | CdilError::InvalidTenant(_) => StatusCode::UNAUTHORIZED,
        CdilError::TokenExpired
        | CdilError::InvalidToken
        | CdilError::NonceAlreadyUsed
        | CdilError::PhiDetected { .. } => StatusCode::BAD_REQUEST,
        CdilError::TenantMismatch => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Debug, Deserialize)]
struct IssueCertificateBody {
    note_body: String,
    model_name: String,
    model_version: String,
    prompt_version: String,
    governance_policy_version: String,
    governance_policy_hash: String,
    finalized_at: chrono::DateTime<chrono::Utc>,
    ehr_referenced_at: Option<chrono::DateTime<chrono::Utc>>,
    ehr_commit_id: Option<String>,
    patient_identifier: Option<String>,
    reviewer_identifier: Option<String>,
    human_reviewed: bool,
    human_attested_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<IssueCertificateBody> for ClinicalDocumentationRequest {
    fn from(body: IssueCertificateBody) -> Self {
        ClinicalDocumentationRequest {
            note_body: body.note_body,
            model_name: body.model_name,
            model_version: body.model_version,
            prompt_version: body.prompt_version,
            governance_policy_version: body.governance_policy_version,
            governance_policy_hash: body.governance_policy_hash,
            finalized_at: body.finalized_at,
            ehr_referenced_at: body.ehr_referenced_at,
            ehr_commit_id: body.ehr_commit_id,
            patient_identifier: body.patient_identifier,
            reviewer_identifier: body.reviewer_identifier,
            human_reviewed: body.human_reviewed,
            human_attested_at: body.human_attested_at,
        }
    }
}

async fn issue_certificate(
    State(service): State<Arc<GatewayService>>,
    headers: HeaderMap,
    Json(body): Json<IssueCertificateBody>,
) -> Result<Json<cdil_core::model::Certificate>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let cert = service.issue_certificate(&identity, body.into())?;
    Ok(Json(cert))
}

async fn get_certificate(
    State(service): State<Arc<GatewayService>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<cdil_core::model::Certificate>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let cert = service.get_certificate(&identity, &id)?;
    Ok(Json(cert))
}

async fn verify_certificate(
    State(service): State<Arc<GatewayService>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<cdil_verifier::VerificationReport>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let report = service.verify_certificate(&identity, &id)?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct BundleQuery {
    #[serde(default)]
    litigation_metadata: bool,
}

async fn get_evidence_bundle(
    State(service): State<Arc<GatewayService>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<BundleQuery>,
) -> Result<Json<cdil_api::dto::EvidenceBundleResponse>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let bundle = service.get_evidence_bundle(&identity, &id, query.litigation_metadata)?;
    Ok(Json(bundle))
}

#[derive(Debug, Deserialize)]
struct VerifyAndAuthorizeBody {
    certificate_id: String,
}

#[derive(Debug, Serialize)]
struct VerifyAndAuthorizeResponse {
    token: String,
    ttl_seconds: i64,
}

async fn verify_and_authorize(
    State(service): State<Arc<GatewayService>>,
    headers: HeaderMap,
    Json(body): Json<VerifyAndAuthorizeBody>,
) -> Result<Json<VerifyAndAuthorizeResponse>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let commit = service.verify_and_authorize(&identity, &body.certificate_id)?;
    Ok(Json(VerifyAndAuthorizeResponse { token: commit.token, ttl_seconds: commit.ttl_seconds }))
}

async fn get_public_key(
    State(service): State<Arc<GatewayService>>,
    headers: HeaderMap,
    Path(key_id): Path<String>,
) -> Result<Json<cdil_core::model::Jwk>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let jwk = service.get_public_key(&identity, &key_id)?;
    Ok(Json(jwk))
}

#[derive(Debug, Deserialize)]
struct RedeemCommitTokenBody {
    token: String,
}

#[derive(Debug, Serialize)]
struct RedeemCommitTokenResponse {
    certificate_id: String,
}

async fn redeem_commit_token(
    State(service): State<Arc<GatewayService>>,
    headers: HeaderMap,
    Json(body): Json<RedeemCommitTokenBody>,
) -> Result<Json<RedeemCommitTokenResponse>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let certificate_id = service.redeem_commit_token(&identity, &body.token)?;
    Ok(Json(RedeemCommitTokenResponse { certificate_id }))
}

#[derive(Debug, Serialize)]
struct RotateKeyResponse {
    key_id: String,
}

async fn rotate_key(
    State(service): State<Arc<GatewayService>>,
    headers: HeaderMap,
) -> Result<Json<RotateKeyResponse>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let key_id = service.rotate_key(&identity)?;
    Ok(Json(RotateKeyResponse { key_id: key_id.as_str().to_string() }))
}

async fn verify_audit_chain(
    State(service): State<Arc<GatewayService>>,
    headers: HeaderMap,
) -> Result<Json<cdil_ledger::ChainVerification>, ApiError> {
    let identity = identity_from_headers(&headers)?;
    let report = service.verify_audit_chain(&identity)?;
    Ok(Json(report))
}
