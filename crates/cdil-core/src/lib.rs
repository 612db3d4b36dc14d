//! Canonical encoding, data model, and error taxonomy shared by every CDIL
//! crate. Nothing in here touches storage, cryptography, or transport — it
//! is the vocabulary the rest of the workspace is built from.

pub mod canon;
pub mod config;
pub mod error;
pub mod ids;
pub mod model;

pub use canon::{CanonError, ObjectBuilder, Value};
pub use config::CdilConfig;
pub use error::{CdilError, CdilResult};
pub use ids::{CertificateId, EventId, KeyId, TenantId};
pub use model::{
    AuditEvent, CanonicalMessage, Certificate, ConsumedNonce, Identity, IntegrityChain, Jwk,
    KeyStatus, Signature, Tenant, TenantKey, TenantStatus,
};
