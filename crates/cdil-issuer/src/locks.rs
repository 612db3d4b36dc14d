//! Per-tenant mutual exclusion for the issuance critical section.
//!
//! Two concurrent issuances for the same tenant must serialize at
//! chain-head-read through audit-append; two different tenants must never
//! block each other. A `DashMap` gives lock-free tenant lookup; each
//! tenant gets its own `Mutex` the first time it is touched.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

#[derive(Default)]
pub struct TenantLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TenantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, tenant_id: &str) -> Arc<Mutex<()>> {
        self.locks.entry(tenant_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}
