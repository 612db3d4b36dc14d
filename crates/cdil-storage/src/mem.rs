//! An in-memory [`Store`] used by every other crate's unit tests.
//!
//! Mirrors the production [`crate::SledStore`]'s semantics exactly — same
//! atomicity guarantees, same ordering — so a test written against one
//! behaves identically against the other.

use std::collections::BTreeMap;
use std::sync::Mutex;

use cdil_core::{AuditEvent, CdilResult, Certificate, KeyId, KeyStatus, Tenant, TenantId, TenantKey};
use chrono::{DateTime, Utc};

use crate::Store;

#[derive(Default)]
struct State {
    tenants: BTreeMap<String, Tenant>,
    keys: BTreeMap<(String, String), TenantKey>,
    certificates: BTreeMap<(String, String), Certificate>,
    nonces: BTreeMap<(String, String), DateTime<Utc>>,
    events: Vec<AuditEvent>,
}

/// A process-local store backed by a single [`Mutex`]. Not for production
/// use — lock granularity is whole-store, not per-tenant — but adequate
/// and deterministic for tests.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for InMemoryStore {
    fn get_tenant(&self, tenant_id: &TenantId) -> CdilResult<Option<Tenant>> {
        Ok(self.state.lock().unwrap().tenants.get(tenant_id.as_str()).cloned())
    }

    fn put_tenant(&self, tenant: &Tenant) -> CdilResult<()> {
        self.state
            .lock()
            .unwrap()
            .tenants
            .insert(tenant.tenant_id.as_str().to_string(), tenant.clone());
        Ok(())
    }

    fn get_active_key(&self, tenant_id: &TenantId) -> CdilResult<Option<TenantKey>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .keys
            .values()
            .find(|k| k.tenant_id == *tenant_id && k.status == KeyStatus::Active)
            .cloned())
    }

    fn get_key_by_id(&self, tenant_id: &TenantId, key_id: &KeyId) -> CdilResult<Option<TenantKey>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .keys
            .get(&(tenant_id.as_str().to_string(), key_id.as_str().to_string()))
            .cloned())
    }

    fn put_key(&self, key: &TenantKey) -> CdilResult<()> {
        self.state.lock().unwrap().keys.insert(
            (key.tenant_id.as_str().to_string(), key.key_id.as_str().to_string()),
            key.clone(),
        );
        Ok(())
    }

    fn mark_key_rotated(&self, tenant_id: &TenantId, key_id: &KeyId) -> CdilResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(key) = state
            .keys
            .get_mut(&(tenant_id.as_str().to_string(), key_id.as_str().to_string()))
        {
            key.status = KeyStatus::Rotated;
        }
        Ok(())
    }

    fn chain_head(&self, tenant_id: &TenantId) -> CdilResult<Option<String>> {
        let state = self.state.lock().unwrap();
        let mut certs: Vec<&Certificate> =
            state.certificates.values().filter(|c| c.tenant_id == *tenant_id).collect();
        certs.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.certificate_id.as_str().cmp(b.certificate_id.as_str()))
        });
        Ok(certs.last().map(|c| c.integrity_chain.chain_hash.clone()))
    }

    fn get_certificate(
        &self,
        tenant_id: &TenantId,
        certificate_id: &str,
    ) -> CdilResult<Option<Certificate>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .certificates
            .get(&(tenant_id.as_str().to_string(), certificate_id.to_string()))
            .cloned())
    }

    fn put_certificate(&self, certificate: &Certificate) -> CdilResult<()> {
        self.state.lock().unwrap().certificates.insert(
            (
                certificate.tenant_id.as_str().to_string(),
                certificate.certificate_id.as_str().to_string(),
            ),
            certificate.clone(),
        );
        Ok(())
    }

    fn check_and_record_nonce(
        &self,
        tenant_id: &TenantId,
        nonce: &str,
        consumed_at: DateTime<Utc>,
    ) -> CdilResult<bool> {
        let mut state = self.state.lock().unwrap();
        let key = (tenant_id.as_str().to_string(), nonce.to_string());
        if state.nonces.contains_key(&key) {
            return Ok(false);
        }
        state.nonces.insert(key, consumed_at);
        Ok(true)
    }

    fn latest_event_hash(&self, tenant_id: &TenantId) -> CdilResult<Option<String>> {
        let state = self.state.lock().unwrap();
        let mut events: Vec<&AuditEvent> =
            state.events.iter().filter(|e| e.tenant_id == *tenant_id).collect();
        events.sort_by(|a, b| {
            a.occurred_at.cmp(&b.occurred_at).then_with(|| a.event_id.as_str().cmp(b.event_id.as_str()))
        });
        Ok(events.last().map(|e| e.event_hash.clone()))
    }

    fn append_audit_event(&self, event: &AuditEvent) -> CdilResult<()> {
        self.state.lock().unwrap().events.push(event.clone());
        Ok(())
    }

    fn list_audit_events(&self, tenant_id: Option<&TenantId>) -> CdilResult<Vec<AuditEvent>> {
        let state = self.state.lock().unwrap();
        let mut events: Vec<AuditEvent> = state
            .events
            .iter()
            .filter(|e| tenant_id.map_or(true, |t| e.tenant_id == *t))
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            a.occurred_at.cmp(&b.occurred_at).then_with(|| a.event_id.as_str().cmp(b.event_id.as_str()))
        });
        Ok(events)
    }
}
