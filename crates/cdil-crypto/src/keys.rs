//! Per-tenant key lifecycle: lazy generation, lookup, atomic rotation.
//!
//! A small in-process cache sits in front of the store so repeated signing
//! doesn't round-trip through it; rotation invalidates the cache entry for
//! the affected tenant so the next lookup always observes the new key.

use std::sync::{Arc, Mutex};

use cdil_core::{CdilError, CdilResult, KeyId, KeyStatus, TenantId, TenantKey};
use cdil_storage::Store;
use chrono::Utc;
use dashmap::DashMap;
use p256::ecdsa::{SigningKey, VerifyingKey};

use crate::signer;

/// Per-tenant keypair lifecycle, backed by a [`Store`] and fronted by an
/// in-process cache. Rotation invalidates the cached entry for that
/// tenant so the next lookup reads the freshly-written active key.
pub struct KeyRegistry {
    store: Arc<dyn Store>,
    active_cache: DashMap<String, TenantKey>,
    rotation_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, active_cache: DashMap::new(), rotation_locks: DashMap::new() }
    }

    fn rotation_lock(&self, tenant_id: &str) -> Arc<Mutex<()>> {
        self.rotation_locks.entry(tenant_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Returns the tenant's active key, generating one on first use. Never
    /// falls back to a shared or "dev" key — a generation failure is
    /// surfaced to the caller, not swallowed.
    pub fn active_key(&self, tenant_id: &TenantId) -> CdilResult<TenantKey> {
        if let Some(cached) = self.active_cache.get(tenant_id.as_str()) {
            return Ok(cached.clone());
        }
        if let Some(key) = self.store.get_active_key(tenant_id)? {
            self.active_cache.insert(tenant_id.as_str().to_string(), key.clone());
            return Ok(key);
        }
        let key = self.generate_and_store(tenant_id)?;
        self.active_cache.insert(tenant_id.as_str().to_string(), key.clone());
        Ok(key)
    }

    pub fn key_by_id(&self, tenant_id: &TenantId, key_id: &KeyId) -> CdilResult<TenantKey> {
        self.store.get_key_by_id(tenant_id, key_id)?.ok_or_else(|| CdilError::KeyNotFound {
            tenant_id: tenant_id.as_str().to_string(),
            key_id: key_id.as_str().to_string(),
        })
    }

    /// Idempotent: returns the active key's id, generating one if needed.
    pub fn ensure_key(&self, tenant_id: &TenantId) -> CdilResult<KeyId> {
        Ok(self.active_key(tenant_id)?.key_id)
    }

    /// Atomically demotes the current active key (if any) to `Rotated` and
    /// mints a new active key. Serializes concurrent rotations for the same
    /// tenant behind an in-process per-tenant lock so two racing callers can
    /// never both observe the same active key and each mint a replacement,
    /// which would leave two rows `Active` for one tenant. Different tenants
    /// never block each other.
    pub fn rotate(&self, tenant_id: &TenantId) -> CdilResult<KeyId> {
        let lock = self.rotation_lock(tenant_id.as_str());
        let _guard = lock.lock().unwrap();

        if let Some(current) = self.store.get_active_key(tenant_id)? {
            self.store.mark_key_rotated(tenant_id, &current.key_id)?;
            tracing::info!(tenant_id = tenant_id.as_str(), rotated_key_id = current.key_id.as_str(), "key rotated");
        }
        let key = self.generate_and_store(tenant_id)?;
        self.active_cache.insert(tenant_id.as_str().to_string(), key.clone());
        tracing::info!(tenant_id = tenant_id.as_str(), key_id = key.key_id.as_str(), "new active key installed");
        Ok(key.key_id)
    }

    pub fn signing_key(&self, key: &TenantKey) -> CdilResult<SigningKey> {
        let der = key
            .private_key_pkcs8
            .as_ref()
            .ok_or_else(|| CdilError::PrivateKeyUnavailable(key.key_id.as_str().to_string()))?;
        signer::signing_key_from_pkcs8(der)
    }

    pub fn verifying_key(&self, key: &TenantKey) -> CdilResult<VerifyingKey> {
        signer::verifying_key_from_jwk(&key.public_jwk)
    }

    fn generate_and_store(&self, tenant_id: &TenantId) -> CdilResult<TenantKey> {
        let key_id = KeyId::generate();
        let (der, mut jwk) = signer::generate_keypair()?;
        jwk.kid = key_id.as_str().to_string();
        let key = TenantKey {
            key_id,
            tenant_id: tenant_id.clone(),
            private_key_pkcs8: Some(der),
            public_jwk: jwk,
            status: KeyStatus::Active,
            created_at: Utc::now(),
        };
        self.store.put_key(&key)?;
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdil_storage::mem::InMemoryStore;

    fn registry() -> KeyRegistry {
        KeyRegistry::new(Arc::new(InMemoryStore::new()))
    }

    #[test]
    fn lazily_generates_a_key_on_first_use() {
        let reg = registry();
        let tenant = TenantId::from_string("acme".to_string());
        let key = reg.active_key(&tenant).unwrap();
        assert_eq!(key.status, KeyStatus::Active);
    }

    #[test]
    fn rotation_demotes_old_key_and_activates_a_new_one() {
        let reg = registry();
        let tenant = TenantId::from_string("acme".to_string());
        let first = reg.active_key(&tenant).unwrap();
        let new_id = reg.rotate(&tenant).unwrap();
        assert_ne!(new_id, first.key_id);

        let old = reg.key_by_id(&tenant, &first.key_id).unwrap();
        assert_eq!(old.status, KeyStatus::Rotated);

        let active = reg.active_key(&tenant).unwrap();
        assert_eq!(active.key_id, new_id);
    }

    #[test]
    fn rotated_keys_remain_resolvable_by_id() {
        let reg = registry();
        let tenant = TenantId::from_string("acme".to_string());
        let first = reg.active_key(&tenant).unwrap();
        reg.rotate(&tenant).unwrap();
        assert!(reg.key_by_id(&tenant, &first.key_id).is_ok());
    }

    #[test]
    fn unknown_key_id_is_key_not_found() {
        let reg = registry();
        let tenant = TenantId::from_string("acme".to_string());
        let bogus = KeyId::generate();
        match reg.key_by_id(&tenant, &bogus) {
            Err(CdilError::KeyNotFound { .. }) => {}
            other => panic!("expected KeyNotFound, got {other:?}"),
        }
    }

    #[test]
    fn ensure_key_is_idempotent() {
        let reg = registry();
        let tenant = TenantId::from_string("acme".to_string());
        let a = reg.ensure_key(&tenant).unwrap();
        let b = reg.ensure_key(&tenant).unwrap();
        assert_eq!(a, b);
    }
}
