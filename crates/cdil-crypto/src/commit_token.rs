//! Short-lived HS256 "commit tokens" minted by the gatekeeper
//! verify-and-authorize flow.
//!
//! A commit token proves "this certificate was independently verified
//! valid, recently, by this tenant" to a downstream collaborator without
//! that collaborator re-running the verifier itself. Five-minute TTL,
//! single-use — the embedded `nonce` is checked against the same nonce
//! store certificates use, by the caller.

use cdil_core::{CdilError, CdilResult, TenantId};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const COMMIT_TOKEN_TTL_SECONDS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitTokenClaims {
    /// Tenant the token authorizes action on behalf of.
    pub sub: String,
    pub certificate_id: String,
    pub nonce: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn mint(secret: &str, tenant_id: &TenantId, certificate_id: &str) -> CdilResult<String> {
    let now = Utc::now();
    let claims = CommitTokenClaims {
        sub: tenant_id.as_str().to_string(),
        certificate_id: certificate_id.to_string(),
        nonce: Uuid::now_v7().to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::seconds(COMMIT_TOKEN_TTL_SECONDS)).timestamp(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| CdilError::Serialization(format!("jwt encode: {e}")))
}

/// Decode and validate expiry/signature. Does **not** check single-use —
/// that is the nonce store's job, against `claims.nonce`.
pub fn verify(secret: &str, token: &str) -> CdilResult<CommitTokenClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();
    validation.validate_exp = true;
    let data = decode::<CommitTokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => CdilError::TokenExpired,
        _ => CdilError::InvalidToken,
    })?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_then_verify_round_trips() {
        let tenant = TenantId::from_string("acme".to_string());
        let token = mint("secret", &tenant, "cert-1").unwrap();
        let claims = verify("secret", &token).unwrap();
        assert_eq!(claims.sub, "acme");
        assert_eq!(claims.certificate_id, "cert-1");
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let tenant = TenantId::from_string("acme".to_string());
        let token = mint("secret", &tenant, "cert-1").unwrap();
        match verify("different-secret", &token) {
            Err(CdilError::InvalidToken) => {}
            other => panic!("expected InvalidToken, got {other:?}"),
        }
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = CommitTokenClaims {
            sub: "acme".to_string(),
            certificate_id: "cert-1".to_string(),
            nonce: "n".to_string(),
            iat: 0,
            exp: 1,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        match verify("secret", &token) {
            Err(CdilError::TokenExpired) => {}
            other => panic!("expected TokenExpired, got {other:?}"),
        }
    }
}
