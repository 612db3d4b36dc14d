//! Runtime configuration, shared by every CDIL binary.
//!
//! A `clap`-derived `Args` struct with environment-variable fallbacks for
//! secrets — never a hard-coded default for anything security-sensitive.

use clap::Parser;

/// Configuration common to `cdil-gateway` and `cdil-ledger-cli`.
#[derive(Debug, Clone, Parser)]
#[command(name = "cdil", about = "Clinical Documentation Integrity Ledger")]
pub struct CdilConfig {
    /// Path to the sled database directory.
    #[arg(long, env = "CDIL_STORAGE_PATH", default_value = "./cdil-data")]
    pub storage_path: String,

    /// HMAC secret used to sign and verify commit tokens. Required unless
    /// `--dev` is set.
    #[arg(long, env = "CDIL_COMMIT_TOKEN_SECRET")]
    pub commit_token_secret: Option<String>,

    /// Run with a deterministic in-memory commit-token secret. Never set
    /// this outside local development — certificates issued under it are
    /// not distinguishable on disk from production ones.
    #[arg(long)]
    pub dev: bool,

    /// Address `cdil-gateway` binds its HTTP listener to.
    #[arg(long, env = "CDIL_BIND_ADDR", default_value = "0.0.0.0:8787")]
    pub bind_addr: String,
}

impl CdilConfig {
    /// Resolve the commit-token secret, enforcing the "no silent dev-key
    /// fallback" rule: an absent secret outside `--dev` is a startup error,
    /// never a quiet default.
    pub fn resolve_commit_token_secret(&self) -> Result<String, String> {
        match (&self.commit_token_secret, self.dev) {
            (Some(secret), _) => Ok(secret.clone()),
            (None, true) => Ok("dev-only-insecure-commit-token-secret".to_string()),
            (None, false) => Err(
                "CDIL_COMMIT_TOKEN_SECRET is not set; pass --dev for local development only"
                    .to_string(),
            ),
        }
    }
}
