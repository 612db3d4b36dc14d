//! cdil-ledger-cli
//!
//! Offline verifier for the audit event ledger. Reads events for a tenant
//! (or every tenant) straight out of the sled database, recomputes each
//! `event_hash` with the exact function the writer uses
//! (`cdil_ledger::verify_events`), and reports whether the chain is intact.
//!
//! Usage:
//!   cdil-ledger-cli verify [--tenant <id>] [--storage-path <path>]
//!
//! Exit codes: 0 pass, 1 tamper/chain break, 2 configuration or query error.

use std::path::PathBuf;
use std::process::ExitCode;

use cdil_core::TenantId;
use cdil_ledger::{verify_events, ChainVerification};
use cdil_storage::{SledStore, Store};
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "cdil-ledger-cli", about = "Offline CDIL audit-ledger verifier")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recompute the event-hash chain and report whether it is intact.
    Verify {
        /// Restrict verification to one tenant. Omit to verify every tenant.
        #[arg(long)]
        tenant: Option<String>,

        /// Path to the sled database directory.
        #[arg(long, env = "CDIL_STORAGE_PATH", default_value = "./cdil-data")]
        storage_path: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct VerificationReportOutput {
    status: &'static str,
    engine: &'static str,
    ordering: &'static str,
    hash_policy: &'static str,
    total_events: usize,
    verified_events: usize,
    failure: Option<cdil_ledger::ChainFailure>,
    errors: Vec<String>,
    valid: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter("warn,cdil_ledger_cli=info").init();

    let args = Args::parse();
    match args.command {
        Command::Verify { tenant, storage_path } => run_verify(tenant, storage_path),
    }
}

fn run_verify(tenant: Option<String>, storage_path: PathBuf) -> ExitCode {
    let store = match SledStore::open(&storage_path) {
        Ok(store) => store,
        Err(e) => return fail_config(&format!("failed to open storage at {}: {e}", storage_path.display())),
    };

    let tenant_id = tenant.map(TenantId::from_string);
    let events = match store.list_audit_events(tenant_id.as_ref()) {
        Ok(events) => events,
        Err(e) => return fail_config(&format!("failed to query audit events: {e}")),
    };

    let report = verify_events(&events);
    print_report(&report);

    if report.valid() {
        ExitCode::from(0)
    } else {
        ExitCode::from(1)
    }
}

fn print_report(report: &ChainVerification) {
    let output = VerificationReportOutput {
        status: if report.valid() { "pass" } else { "fail" },
        engine: "cdil-ledger",
        ordering: "occurred_at_rfc3339",
        hash_policy: "sha256:-prefixed event_hash chained on prev_event_hash",
        total_events: report.total,
        verified_events: report.verified,
        failure: report.failures.first().cloned(),
        errors: report.failures.iter().map(|f| format!("{}: {}", f.event_id, f.error)).collect(),
        valid: report.valid(),
    };
    println!("{}", serde_json::to_string_pretty(&output).expect("serialize report"));
}

fn fail_config(message: &str) -> ExitCode {
    eprintln!("{}", serde_json::json!({ "status": "error", "error": message }));
    ExitCode::from(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdil_core::model::AuditEvent;
    use cdil_core::EventId;
    use chrono::Utc;

    fn event(tenant: &str, id: &str, prev: Option<&str>) -> AuditEvent {
        let occurred_at = Utc::now();
        let event_hash = cdil_ledger::compute_event_hash(
            prev,
            occurred_at,
            "certificate",
            id,
            "issue",
            "{}",
        );
        AuditEvent {
            event_id: EventId::from_string(id.to_string()),
            tenant_id: TenantId::from_string(tenant.to_string()),
            occurred_at,
            actor_id: None,
            object_type: "certificate".to_string(),
            object_id: id.to_string(),
            action: "issue".to_string(),
            event_payload_json: "{}".to_string(),
            prev_event_hash: prev.map(|p| p.to_string()),
            event_hash,
        }
    }

    #[test]
    fn intact_chain_verifies() {
        let e1 = event("acme", "e1", None);
        let e2 = event("acme", "e2", Some(&e1.event_hash));
        let report = verify_events(&[e1, e2]);
        assert!(report.valid());
        assert_eq!(report.total, 2);
        assert_eq!(report.verified, 2);
    }

    #[test]
    fn broken_chain_is_reported_as_a_failure() {
        let e1 = event("acme", "e1", None);
        let mut e2 = event("acme", "e2", Some(&e1.event_hash));
        e2.event_hash = "sha256:tampered".to_string();
        let report = verify_events(&[e1, e2]);
        assert!(!report.valid());
        assert_eq!(report.failures[0].error, "event_hash_mismatch");
    }
}
