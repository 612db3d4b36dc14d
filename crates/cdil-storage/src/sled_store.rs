//! Production `Store` implementation backed by `sled`, a pure-Rust
//! embedded database — no C or LLVM toolchain dependency.
//!
//! Non-text columns are `bincode`-encoded rows; `certificate_json` and
//! `event_payload_json` are stored as raw UTF-8 bytes so the store can
//! never re-serialize (and therefore never perturb) a hashed payload.

use std::path::Path;
use std::sync::{Arc, Mutex};

use cdil_core::{AuditEvent, CdilError, CdilResult, Certificate, KeyId, KeyStatus, Tenant, TenantId, TenantKey};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sled::{Db, Tree};

use crate::Store;

fn storage_err(e: sled::Error) -> CdilError {
    CdilError::Storage(e.to_string())
}

fn ser_err(e: bincode::Error) -> CdilError {
    CdilError::Serialization(e.to_string())
}

fn json_err(e: serde_json::Error) -> CdilError {
    CdilError::Serialization(e.to_string())
}

pub struct SledStore {
    _db: Db,
    tenants: Tree,
    tenant_keys: Tree,
    certificates: Tree,
    chain_heads: Tree,
    used_nonces: Tree,
    audit_events: Tree,
    event_chain_tips: Tree,
    /// Serializes append operations per tenant within one process; `sled`
    /// itself is thread-safe, but `check_and_record_nonce` and
    /// `append_audit_event` need a read-then-write critical section wider
    /// than any single tree operation. Keyed by tenant so one tenant's
    /// critical section never blocks another's.
    append_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> CdilResult<Self> {
        let db = sled::open(path).map_err(storage_err)?;
        Ok(Self {
            tenants: db.open_tree("tenants").map_err(storage_err)?,
            tenant_keys: db.open_tree("tenant_keys").map_err(storage_err)?,
            certificates: db.open_tree("certificates").map_err(storage_err)?,
            chain_heads: db.open_tree("chain_heads").map_err(storage_err)?,
            used_nonces: db.open_tree("used_nonces").map_err(storage_err)?,
            audit_events: db.open_tree("audit_events").map_err(storage_err)?,
            event_chain_tips: db.open_tree("event_chain_tips").map_err(storage_err)?,
            append_locks: DashMap::new(),
            _db: db,
        })
    }

    fn append_lock(&self, tenant_id: &TenantId) -> Arc<Mutex<()>> {
        self.append_locks.entry(tenant_id.as_str().to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    fn key_row_key(tenant_id: &TenantId, key_id: &KeyId) -> Vec<u8> {
        format!("{}\0{}", tenant_id.as_str(), key_id.as_str()).into_bytes()
    }

    fn cert_row_key(tenant_id: &TenantId, certificate_id: &str) -> Vec<u8> {
        format!("{}\0{}", tenant_id.as_str(), certificate_id).into_bytes()
    }

    fn nonce_row_key(tenant_id: &TenantId, nonce: &str) -> Vec<u8> {
        format!("{}\0{}", tenant_id.as_str(), nonce).into_bytes()
    }

    /// `audit_events` keys are `tenant_id \0 occurred_at_rfc3339 \0 event_id`
    /// so a prefix scan on `tenant_id` yields rows in canonical order for
    /// free.
    fn event_row_key(event: &AuditEvent) -> Vec<u8> {
        format!(
            "{}\0{}\0{}",
            event.tenant_id.as_str(),
            event.occurred_at.to_rfc3339(),
            event.event_id.as_str()
        )
        .into_bytes()
    }
}

impl Store for SledStore {
    fn get_tenant(&self, tenant_id: &TenantId) -> CdilResult<Option<Tenant>> {
        match self.tenants.get(tenant_id.as_str()).map_err(storage_err)? {
            // `Tenant::retention_policy` is a `serde_json::Value`, whose
            // `Deserialize` impl requires `deserialize_any`; bincode's
            // deserializer doesn't support that, so this row uses JSON.
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(json_err)?)),
            None => Ok(None),
        }
    }

    fn put_tenant(&self, tenant: &Tenant) -> CdilResult<()> {
        let bytes = serde_json::to_vec(tenant).map_err(json_err)?;
        self.tenants.insert(tenant.tenant_id.as_str(), bytes).map_err(storage_err)?;
        Ok(())
    }

    fn get_active_key(&self, tenant_id: &TenantId) -> CdilResult<Option<TenantKey>> {
        let prefix = format!("{}\0", tenant_id.as_str());
        for row in self.tenant_keys.scan_prefix(prefix.as_bytes()) {
            let (_, bytes) = row.map_err(storage_err)?;
            let key: TenantKey = bincode::deserialize(&bytes).map_err(ser_err)?;
            if key.status == KeyStatus::Active {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    fn get_key_by_id(&self, tenant_id: &TenantId, key_id: &KeyId) -> CdilResult<Option<TenantKey>> {
        let row_key = Self::key_row_key(tenant_id, key_id);
        match self.tenant_keys.get(row_key).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(ser_err)?)),
            None => Ok(None),
        }
    }

    fn put_key(&self, key: &TenantKey) -> CdilResult<()> {
        let row_key = Self::key_row_key(&key.tenant_id, &key.key_id);
        let bytes = bincode::serialize(key).map_err(ser_err)?;
        self.tenant_keys.insert(row_key, bytes).map_err(storage_err)?;
        Ok(())
    }

    fn mark_key_rotated(&self, tenant_id: &TenantId, key_id: &KeyId) -> CdilResult<()> {
        if let Some(mut key) = self.get_key_by_id(tenant_id, key_id)? {
            key.status = KeyStatus::Rotated;
            self.put_key(&key)?;
        }
        Ok(())
    }

    fn chain_head(&self, tenant_id: &TenantId) -> CdilResult<Option<String>> {
        match self.chain_heads.get(tenant_id.as_str()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    fn get_certificate(
        &self,
        tenant_id: &TenantId,
        certificate_id: &str,
    ) -> CdilResult<Option<Certificate>> {
        let row_key = Self::cert_row_key(tenant_id, certificate_id);
        match self.certificates.get(row_key).map_err(storage_err)? {
            Some(bytes) => {
                let cert: Certificate =
                    serde_json::from_slice(&bytes).map_err(|e| CdilError::Serialization(e.to_string()))?;
                Ok(Some(cert))
            }
            None => Ok(None),
        }
    }

    fn put_certificate(&self, certificate: &Certificate) -> CdilResult<()> {
        let row_key = Self::cert_row_key(&certificate.tenant_id, certificate.certificate_id.as_str());
        let json = serde_json::to_vec(certificate).map_err(|e| CdilError::Serialization(e.to_string()))?;
        self.certificates.insert(row_key, json).map_err(storage_err)?;
        self.chain_heads
            .insert(certificate.tenant_id.as_str(), certificate.integrity_chain.chain_hash.as_bytes())
            .map_err(storage_err)?;
        Ok(())
    }

    fn check_and_record_nonce(
        &self,
        tenant_id: &TenantId,
        nonce: &str,
        consumed_at: DateTime<Utc>,
    ) -> CdilResult<bool> {
        let lock = self.append_lock(tenant_id);
        let _guard = lock.lock().unwrap();
        let row_key = Self::nonce_row_key(tenant_id, nonce);
        if self.used_nonces.contains_key(&row_key).map_err(storage_err)? {
            return Ok(false);
        }
        self.used_nonces
            .insert(row_key, consumed_at.to_rfc3339().into_bytes())
            .map_err(storage_err)?;
        Ok(true)
    }

    fn latest_event_hash(&self, tenant_id: &TenantId) -> CdilResult<Option<String>> {
        match self.event_chain_tips.get(tenant_id.as_str()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    fn append_audit_event(&self, event: &AuditEvent) -> CdilResult<()> {
        let lock = self.append_lock(&event.tenant_id);
        let _guard = lock.lock().unwrap();
        let row_key = Self::event_row_key(event);
        let json = serde_json::to_vec(event).map_err(|e| CdilError::Serialization(e.to_string()))?;
        self.audit_events.insert(row_key, json).map_err(storage_err)?;
        self.event_chain_tips
            .insert(event.tenant_id.as_str(), event.event_hash.as_bytes())
            .map_err(storage_err)?;
        Ok(())
    }

    fn list_audit_events(&self, tenant_id: Option<&TenantId>) -> CdilResult<Vec<AuditEvent>> {
        let mut out = Vec::new();
        let iter: Box<dyn Iterator<Item = sled::Result<(sled::IVec, sled::IVec)>>> = match tenant_id {
            Some(t) => Box::new(self.audit_events.scan_prefix(format!("{}\0", t.as_str()).into_bytes())),
            None => Box::new(self.audit_events.iter()),
        };
        for row in iter {
            let (_, bytes) = row.map_err(storage_err)?;
            let event: AuditEvent =
                serde_json::from_slice(&bytes).map_err(|e| CdilError::Serialization(e.to_string()))?;
            out.push(event);
        }
        // Row keys already sort lexicographically by (tenant_id,
        // occurred_at rfc3339, event_id) within a tenant; across tenants
        // (the `tenant_id: None` case) re-sort into the canonical order.
        if tenant_id.is_none() {
            out.sort_by(|a, b| {
                a.occurred_at
                    .cmp(&b.occurred_at)
                    .then_with(|| a.event_id.as_str().cmp(b.event_id.as_str()))
            });
        }
        Ok(out)
    }
}
