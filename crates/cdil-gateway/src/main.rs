//! Ambient HTTP shell. Everything security-sensitive — JWT parsing, role
//! checks, rate limiting — belongs upstream of this binary in a real
//! deployment; this wiring exists to give `GatewayService` a transport and
//! is not itself an authorization boundary. Identity extraction here is a
//! stand-in (`x-cdil-subject` / `x-cdil-tenant` / `x-cdil-role` headers)
//! for whatever the real collaborator middleware supplies.

mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use cdil_api::GatewayService;
use cdil_core::CdilConfig;
use cdil_storage::SledStore;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = CdilConfig::parse();
    let commit_token_secret = config
        .resolve_commit_token_secret()
        .map_err(|e| anyhow::anyhow!(e))?;

    let storage_path = expand_tilde(&config.storage_path);
    let store: Arc<dyn cdil_storage::Store> = Arc::new(SledStore::open(&storage_path)?);
    let service = GatewayService::new(store, commit_token_secret);

    let app = routes::router(service).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, storage_path = %storage_path.display(), "cdil-gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}
