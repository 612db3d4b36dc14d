//! Wire-facing response shapes. Kept separate from the domain model so a
//! transport-layer rename never forces a `cdil-core` migration.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommitTokenResponse {
    pub token: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceBundleResponse {
    pub certificate_json: String,
    pub canonical_message_json: String,
    pub public_key_pem: String,
    pub verification_report_json: String,
    pub readme_txt: String,
    pub litigation_metadata_json: Option<String>,
}

impl From<cdil_bundle::Bundle> for EvidenceBundleResponse {
    fn from(bundle: cdil_bundle::Bundle) -> Self {
        Self {
            certificate_json: bundle.certificate_json,
            canonical_message_json: bundle.canonical_message_json,
            public_key_pem: bundle.public_key_pem,
            verification_report_json: bundle.verification_report_json,
            readme_txt: bundle.readme_txt,
            litigation_metadata_json: bundle.litigation_metadata_json,
        }
    }
}
