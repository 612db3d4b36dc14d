//! Append-only, per-tenant hash-chained audit ledger.
//!
//! `append` is the only write path the rest of CDIL uses; `verify_chain`
//! is built to run standalone — the offline CLI in `cdil-ledger-cli` calls
//! the exact same [`event_hash::compute_event_hash`] this module appends
//! with, and nothing else from this crate.

pub mod event_hash;

use std::sync::{Arc, Mutex};

use cdil_core::model::AuditEvent;
use cdil_core::{CdilResult, EventId, TenantId};
use cdil_storage::Store;
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;

pub use event_hash::compute_event_hash;

pub struct AuditLedger {
    store: Arc<dyn Store>,
    tenant_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AuditLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, tenant_locks: DashMap::new() }
    }

    fn lock_for(&self, tenant_id: &TenantId) -> Arc<Mutex<()>> {
        self.tenant_locks.entry(tenant_id.as_str().to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Canonicalize `payload`, read the tenant's chain tip, compute
    /// `event_hash`, and insert — all under one per-tenant lock, so two
    /// concurrent appends for the same tenant always observe a consistent
    /// tip and two different tenants never block each other.
    pub fn append(
        &self,
        tenant_id: &TenantId,
        object_type: &str,
        object_id: &str,
        action: &str,
        payload: &impl Serialize,
        actor_id: Option<String>,
    ) -> CdilResult<EventId> {
        let lock = self.lock_for(tenant_id);
        let _guard = lock.lock().unwrap();

        let event_payload_json =
            serde_json::to_string(payload).map_err(|e| cdil_core::CdilError::Serialization(e.to_string()))?;
        let occurred_at = Utc::now();
        let prev_event_hash = self.store.latest_event_hash(tenant_id)?;
        let event_hash = compute_event_hash(
            prev_event_hash.as_deref(),
            occurred_at,
            object_type,
            object_id,
            action,
            &event_payload_json,
        );
        let event_id = EventId::generate();
        let event = AuditEvent {
            event_id: event_id.clone(),
            tenant_id: tenant_id.clone(),
            occurred_at,
            actor_id,
            object_type: object_type.to_string(),
            object_id: object_id.to_string(),
            action: action.to_string(),
            event_payload_json,
            prev_event_hash,
            event_hash,
        };
        self.store.append_audit_event(&event)?;
        tracing::info!(
            tenant_id = tenant_id.as_str(),
            event_id = event_id.as_str(),
            object_type,
            action,
            "audit event appended"
        );
        Ok(event_id)
    }

    pub fn verify_chain(&self, tenant_id: Option<&TenantId>) -> CdilResult<ChainVerification> {
        let events = self.store.list_audit_events(tenant_id)?;
        Ok(verify_events(&events))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainFailure {
    pub event_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    pub total: usize,
    pub verified: usize,
    pub failures: Vec<ChainFailure>,
}

impl ChainVerification {
    pub fn valid(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Pure function over an already-ordered event list, reused by both the
/// in-process ledger and the offline CLI so "verify" always means the
/// same thing.
pub fn verify_events(events: &[AuditEvent]) -> ChainVerification {
    let mut failures = Vec::new();
    let mut verified = 0usize;
    let mut tips: std::collections::HashMap<&str, Option<&str>> = std::collections::HashMap::new();

    for event in events {
        let tenant = event.tenant_id.as_str();
        let expected_prev = *tips.get(tenant).unwrap_or(&None);
        if event.prev_event_hash.as_deref() != expected_prev {
            failures.push(ChainFailure {
                event_id: event.event_id.as_str().to_string(),
                error: "chain_break".to_string(),
            });
            tips.insert(tenant, Some(event.event_hash.as_str()));
            continue;
        }
        let recomputed = compute_event_hash(
            expected_prev,
            event.occurred_at,
            &event.object_type,
            &event.object_id,
            &event.action,
            &event.event_payload_json,
        );
        if recomputed != event.event_hash {
            failures.push(ChainFailure {
                event_id: event.event_id.as_str().to_string(),
                error: "event_hash_mismatch".to_string(),
            });
        } else {
            verified += 1;
        }
        tips.insert(tenant, Some(event.event_hash.as_str()));
    }

    ChainVerification { total: events.len(), verified, failures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdil_storage::mem::InMemoryStore;

    fn ledger() -> AuditLedger {
        AuditLedger::new(Arc::new(InMemoryStore::new()))
    }

    #[test]
    fn first_event_has_no_previous_hash() {
        let ledger = ledger();
        let tenant = TenantId::from_string("acme".to_string());
        ledger.append(&tenant, "certificate", "c1", "issue", &serde_json::json!({}), None).unwrap();
        let report = ledger.verify_chain(Some(&tenant)).unwrap();
        assert!(report.valid());
        assert_eq!(report.total, 1);
    }

    #[test]
    fn chain_links_successive_events() {
        let ledger = ledger();
        let tenant = TenantId::from_string("acme".to_string());
        for i in 0..5 {
            ledger
                .append(&tenant, "certificate", &format!("c{i}"), "issue", &serde_json::json!({"i": i}), None)
                .unwrap();
        }
        let report = ledger.verify_chain(Some(&tenant)).unwrap();
        assert!(report.valid());
        assert_eq!(report.total, 5);
        assert_eq!(report.verified, 5);
    }

    #[test]
    fn tampered_payload_is_detected() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = AuditLedger::new(store.clone());
        let tenant = TenantId::from_string("acme".to_string());
        ledger.append(&tenant, "certificate", "c1", "issue", &serde_json::json!({"x": 1}), None).unwrap();

        let mut events = store.list_audit_events(Some(&tenant)).unwrap();
        events[0].event_payload_json = "{\"x\":999}".to_string();
        let report = verify_events(&events);
        assert!(!report.valid());
        assert_eq!(report.failures[0].error, "event_hash_mismatch");
    }

    #[test]
    fn independent_tenants_do_not_share_a_chain() {
        let ledger = ledger();
        let a = TenantId::from_string("a".to_string());
        let b = TenantId::from_string("b".to_string());
        ledger.append(&a, "certificate", "c1", "issue", &serde_json::json!({}), None).unwrap();
        ledger.append(&b, "certificate", "c1", "issue", &serde_json::json!({}), None).unwrap();
        let report = ledger.verify_chain(None).unwrap();
        assert!(report.valid());
        assert_eq!(report.total, 2);
    }
}
