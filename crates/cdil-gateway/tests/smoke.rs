//! End-to-end smoke test for cdil-gateway.
//!
//! Starts a real gateway process against a fresh sled database, issues a
//! certificate, verifies it, mints a commit token, and redeems it — all
//! over real HTTP.
//!
//! Run with:
//!   cargo test -p cdil-gateway --test smoke

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

struct GatewayGuard {
    child: Child,
    data_dir: PathBuf,
}

impl Drop for GatewayGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

async fn wait_for_ready(client: &reqwest::Client, base: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(resp) = client
            .get(format!("{base}/v1/certificates/does-not-exist"))
            .header("x-cdil-subject", "probe")
            .header("x-cdil-tenant", "probe-tenant")
            .send()
            .await
        {
            if resp.status().as_u16() == 404 {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    false
}

#[tokio::test]
async fn smoke_issue_verify_authorize_redeem() {
    let data_dir = std::env::temp_dir().join(format!("cdil_e2e_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_dir);
    std::fs::create_dir_all(&data_dir).unwrap();

    let port = free_port();
    let base = format!("http://127.0.0.1:{port}");

    let gateway_bin = env!("CARGO_BIN_EXE_cdil-gateway");
    let child = Command::new(gateway_bin)
        .args([
            "--storage-path",
            data_dir.join("db").to_str().unwrap(),
            "--bind-addr",
            &format!("127.0.0.1:{port}"),
            "--dev",
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn cdil-gateway");

    let _guard = GatewayGuard { child, data_dir };

    let http = reqwest::Client::new();
    assert!(
        wait_for_ready(&http, &base, Duration::from_secs(10)).await,
        "cdil-gateway did not become ready within 10 seconds"
    );

    let identity_headers = |req: reqwest::RequestBuilder| {
        req.header("x-cdil-subject", "test-writer")
            .header("x-cdil-tenant", "acme-clinic")
            .header("x-cdil-role", "writer")
    };

    let issue_body = serde_json::json!({
        "note_body": "Patient tolerated the procedure well and was discharged in stable condition.",
        "model_name": "clinical-writer",
        "model_version": "3.0.0",
        "prompt_version": "p7",
        "governance_policy_version": "gov-2026-01",
        "governance_policy_hash": "sha256:0000000000000000000000000000000000000000000000000000000000aa",
        "finalized_at": chrono::Utc::now().to_rfc3339(),
        "ehr_referenced_at": null,
        "ehr_commit_id": null,
        "patient_identifier": null,
        "reviewer_identifier": null,
        "human_reviewed": true,
        "human_attested_at": chrono::Utc::now().to_rfc3339(),
    });

    let resp = identity_headers(http.post(format!("{base}/v1/clinical/documentation")))
        .json(&issue_body)
        .send()
        .await
        .expect("issue request");
    assert!(resp.status().is_success(), "issue failed: {}", resp.status());
    let cert: serde_json::Value = resp.json().await.expect("parse certificate");
    let certificate_id = cert["certificate_id"].as_str().expect("certificate_id").to_string();

    let resp = identity_headers(http.post(format!(
        "{base}/v1/certificates/{certificate_id}/verify"
    )))
    .send()
    .await
    .expect("verify request");
    assert!(resp.status().is_success());
    let report: serde_json::Value = resp.json().await.expect("parse verification report");
    assert_eq!(report["valid"], serde_json::json!(true));

    let resp = identity_headers(http.post(format!("{base}/v1/gatekeeper/verify-and-authorize")))
        .json(&serde_json::json!({ "certificate_id": certificate_id }))
        .send()
        .await
        .expect("authorize request");
    assert!(resp.status().is_success());
    let commit: serde_json::Value = resp.json().await.expect("parse commit token");
    let token = commit["token"].as_str().expect("token").to_string();

    let resp = identity_headers(http.post(format!("{base}/v1/gatekeeper/redeem")))
        .json(&serde_json::json!({ "token": token }))
        .send()
        .await
        .expect("redeem request");
    assert!(resp.status().is_success());
    let redeemed: serde_json::Value = resp.json().await.expect("parse redeem response");
    assert_eq!(redeemed["certificate_id"], serde_json::json!(certificate_id));

    // the commit token's embedded nonce is single-use
    let resp = identity_headers(http.post(format!("{base}/v1/gatekeeper/redeem")))
        .json(&serde_json::json!({ "token": token }))
        .send()
        .await
        .expect("replay redeem request");
    assert_eq!(resp.status().as_u16(), 400, "replayed commit token should be rejected");

    let resp = identity_headers(http.get(format!(
        "{base}/v1/certificates/{certificate_id}/evidence-bundle.json"
    )))
    .send()
    .await
    .expect("evidence bundle request");
    assert!(resp.status().is_success());
    let bundle: serde_json::Value = resp.json().await.expect("parse bundle");
    assert!(bundle["certificate_json"].as_str().unwrap().contains(&certificate_id));
}
