//! The narrow persistence boundary used by the rest of CDIL.
//!
//! `cdil-issuer`, `cdil-ledger`, and `cdil-crypto` never touch a database
//! handle directly — they hold a `Arc<dyn Store>` and call one of the
//! methods below, so the backend can be swapped at assembly time instead
//! of via a global. Expressed as a trait object rather than a concrete
//! struct so tests can run against [`mem::InMemoryStore`] without a sled
//! handle.

#[cfg(any(test, feature = "test-util"))]
pub mod mem;
pub mod sled_store;

pub use sled_store::SledStore;

use cdil_core::{AuditEvent, Certificate, CdilResult, KeyId, Tenant, TenantId, TenantKey};

/// Every persisted-state operation the core needs, engine-agnostic.
///
/// Implementors must make `check_and_record_nonce` and
/// `append_audit_event` atomic with respect to concurrent callers on the
/// same tenant; everything else may be eventually-consistent across
/// tenants but must be linearizable within one.
pub trait Store: Send + Sync {
    fn get_tenant(&self, tenant_id: &TenantId) -> CdilResult<Option<Tenant>>;
    fn put_tenant(&self, tenant: &Tenant) -> CdilResult<()>;

    fn get_active_key(&self, tenant_id: &TenantId) -> CdilResult<Option<TenantKey>>;
    fn get_key_by_id(&self, tenant_id: &TenantId, key_id: &KeyId) -> CdilResult<Option<TenantKey>>;
    /// Insert a new key row. Callers are responsible for demoting any
    /// prior active key first — `put_key` does not enforce the
    /// at-most-one-active invariant itself.
    fn put_key(&self, key: &TenantKey) -> CdilResult<()>;
    fn mark_key_rotated(&self, tenant_id: &TenantId, key_id: &KeyId) -> CdilResult<()>;

    /// `chain_hash` of the tenant's most recently issued certificate,
    /// ordered by `(timestamp, certificate_id)`; `None` if the tenant has
    /// issued nothing yet.
    fn chain_head(&self, tenant_id: &TenantId) -> CdilResult<Option<String>>;
    fn get_certificate(
        &self,
        tenant_id: &TenantId,
        certificate_id: &str,
    ) -> CdilResult<Option<Certificate>>;
    fn put_certificate(&self, certificate: &Certificate) -> CdilResult<()>;

    /// Atomic check-and-insert on `(tenant_id, nonce)`. Returns `true` if
    /// the pair was new, `false` if it already existed.
    fn check_and_record_nonce(
        &self,
        tenant_id: &TenantId,
        nonce: &str,
        consumed_at: chrono::DateTime<chrono::Utc>,
    ) -> CdilResult<bool>;

    /// `event_hash` of the tenant's most recent audit event; `None` if
    /// none exists yet. Must be read under the same critical section as
    /// the subsequent `append_audit_event` call.
    fn latest_event_hash(&self, tenant_id: &TenantId) -> CdilResult<Option<String>>;
    fn append_audit_event(&self, event: &AuditEvent) -> CdilResult<()>;
    /// Events for one tenant (or all tenants if `tenant_id` is `None`),
    /// ordered by `(occurred_at asc, event_id asc)` — the canonical order
    /// the chain is verified in.
    fn list_audit_events(&self, tenant_id: Option<&TenantId>) -> CdilResult<Vec<AuditEvent>>;
}
