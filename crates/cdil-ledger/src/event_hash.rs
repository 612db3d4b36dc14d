//! The single event-hash formula shared by the writer ([`crate::AuditLedger`])
//! and the standalone offline verifier CLI. Neither may reimplement this —
//! drift here is exactly the tamper the ledger exists to catch.

use chrono::{DateTime, SecondsFormat, Utc};

pub fn compute_event_hash(
    prev_event_hash: Option<&str>,
    occurred_at: DateTime<Utc>,
    object_type: &str,
    object_id: &str,
    action: &str,
    event_payload_json: &str,
) -> String {
    let mut buf = String::new();
    buf.push_str(prev_event_hash.unwrap_or(""));
    buf.push_str(&occurred_at.to_rfc3339_opts(SecondsFormat::Secs, true));
    buf.push_str(object_type);
    buf.push_str(object_id);
    buf.push_str(action);
    buf.push_str(event_payload_json);
    cdil_crypto::sha256_prefixed(buf.as_bytes())
}
