//! Certificate issuance: PHI guard, per-tenant chain/lock bookkeeping,
//! signing, and the atomic certificate + genesis-audit-event write.

pub mod issuer;
pub mod locks;
pub mod phi;

pub use issuer::{CertificateIssuer, ClinicalDocumentationRequest};
