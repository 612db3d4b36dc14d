//! ECDSA P-256 signing and verification over already-canonicalized bytes.
//!
//! This module never canonicalizes anything itself — `cdil-chain` builds
//! the `canonical_message` and hands this module bytes, keeping the
//! signed-field contract entirely out of the crypto layer.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cdil_core::{model::Jwk, CdilError, CdilResult};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePrivateKey, EncodePrivateKey};

pub const ALGORITHM: &str = "ECDSA_SHA_256";

/// Generate a fresh P-256 keypair, returning its PKCS#8 DER private key
/// and its public JWK (`kid` left blank; callers set it to the minted
/// `key_id`).
pub fn generate_keypair() -> CdilResult<(Vec<u8>, Jwk)> {
    let signing_key = SigningKey::random(&mut rand_core::OsRng);
    let pkcs8 = signing_key
        .to_pkcs8_der()
        .map_err(|e| CdilError::Serialization(format!("pkcs8 encode: {e}")))?;
    let jwk = jwk_from_verifying_key(signing_key.verifying_key(), "");
    Ok((pkcs8.as_bytes().to_vec(), jwk))
}

pub fn jwk_from_verifying_key(key: &VerifyingKey, kid: &str) -> Jwk {
    let point = key.to_encoded_point(false);
    let x = point.x().expect("uncompressed point has x");
    let y = point.y().expect("uncompressed point has y");
    Jwk {
        kty: "EC".to_string(),
        crv: "P-256".to_string(),
        x: base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(x),
        y: base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(y),
        kid: kid.to_string(),
    }
}

pub fn signing_key_from_pkcs8(der: &[u8]) -> CdilResult<SigningKey> {
    SigningKey::from_pkcs8_der(der)
        .map_err(|e| CdilError::PrivateKeyUnavailable(format!("pkcs8 decode: {e}")))
}

pub fn verifying_key_from_jwk(jwk: &Jwk) -> CdilResult<VerifyingKey> {
    let x = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(&jwk.x)
        .map_err(|e| CdilError::Serialization(format!("jwk x: {e}")))?;
    let y = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(&jwk.y)
        .map_err(|e| CdilError::Serialization(format!("jwk y: {e}")))?;
    let mut sec1 = Vec::with_capacity(1 + x.len() + y.len());
    sec1.push(0x04);
    sec1.extend_from_slice(&x);
    sec1.extend_from_slice(&y);
    VerifyingKey::from_sec1_bytes(&sec1)
        .map_err(|e| CdilError::Serialization(format!("invalid point: {e}")))
}

/// Sign `message` (already-canonicalized bytes), returning a standard
/// base64-encoded DER-free fixed-size ECDSA signature.
pub fn sign_bytes(signing_key: &SigningKey, message: &[u8]) -> String {
    let signature: Signature = signing_key.sign(message);
    BASE64.encode(signature.to_bytes())
}

pub fn verify_bytes(verifying_key: &VerifyingKey, message: &[u8], signature_b64: &str) -> CdilResult<()> {
    let sig_bytes = BASE64.decode(signature_b64).map_err(|_| CdilError::InvalidSignature)?;
    let signature = Signature::from_slice(&sig_bytes).map_err(|_| CdilError::InvalidSignature)?;
    verifying_key.verify(message, &signature).map_err(|_| CdilError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let (der, jwk) = generate_keypair().unwrap();
        let signing_key = signing_key_from_pkcs8(&der).unwrap();
        let verifying_key = verifying_key_from_jwk(&jwk).unwrap();
        let msg = b"canonical payload";
        let sig = sign_bytes(&signing_key, msg);
        assert!(verify_bytes(&verifying_key, msg, &sig).is_ok());
    }

    #[test]
    fn tampered_message_fails_verification() {
        let (der, jwk) = generate_keypair().unwrap();
        let signing_key = signing_key_from_pkcs8(&der).unwrap();
        let verifying_key = verifying_key_from_jwk(&jwk).unwrap();
        let sig = sign_bytes(&signing_key, b"original");
        assert!(verify_bytes(&verifying_key, b"tampered", &sig).is_err());
    }

    #[test]
    fn jwk_round_trips_through_sec1() {
        let (der, _) = generate_keypair().unwrap();
        let signing_key = signing_key_from_pkcs8(&der).unwrap();
        let jwk = jwk_from_verifying_key(signing_key.verifying_key(), "k1");
        let recovered = verifying_key_from_jwk(&jwk).unwrap();
        assert_eq!(recovered, *signing_key.verifying_key());
    }
}
