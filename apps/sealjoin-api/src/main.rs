//! SealJoin Server
//!
//! Serves the contract merge and seal stamping workflow over HTTP:
//!
//! - Sessions: upload a primary PDF and attachments, merge, place seals, stamp
//! - Documents: download merged and stamped artifacts
//! - Seals: read-only seal catalog
//!
//! Each session is driven by a [`sealjoin_core::Workflow`]; requests for the
//! same session are serialized, different sessions proceed in parallel.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use clap::Parser;
use sealjoin_core::{
    FsObjectStore, MemoryObjectStore, MemorySealCatalog, ObjectStore, SealCatalog, SealId,
    SignatureCornerSuggester,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod config;
mod error;
mod models;
mod state;
#[cfg(test)]
mod tests;

use api::{
    handle_add_attachment, handle_close_session, handle_create_session, handle_get_document,
    handle_get_seal, handle_health, handle_list_seals, handle_merge, handle_remove_attachment,
    handle_reset, handle_set_placements, handle_stamp, handle_status, handle_submit_placements,
    handle_suggest_placements, handle_upload_primary,
};
use config::{Args, ServerConfig, StorageConfig};
use state::AppState;

/// Build the router over shared state
pub fn app(state: Arc<AppState>) -> Router {
    // JSON bodies carry base64, which is a third larger than the PDF
    let body_limit = state.max_upload_bytes / 3 * 4 + 64 * 1024;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // Sessions
        .route("/api/sessions", post(handle_create_session))
        .route("/api/sessions/:id", delete(handle_close_session))
        .route("/api/sessions/:id/status", get(handle_status))
        .route("/api/sessions/:id/primary", post(handle_upload_primary))
        .route("/api/sessions/:id/attachments", post(handle_add_attachment))
        .route(
            "/api/sessions/:id/attachments/:index",
            delete(handle_remove_attachment),
        )
        .route("/api/sessions/:id/merge", post(handle_merge))
        .route(
            "/api/sessions/:id/placements",
            post(handle_submit_placements).put(handle_set_placements),
        )
        .route(
            "/api/sessions/:id/placements/suggest",
            post(handle_suggest_placements),
        )
        .route("/api/sessions/:id/stamp", post(handle_stamp))
        .route("/api/sessions/:id/reset", post(handle_reset))
        // Artifacts and catalog
        .route("/api/documents/:id", get(handle_get_document))
        .route("/api/seals", get(handle_list_seals))
        .route("/api/seals/:id", get(handle_get_seal))
        // Apply middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn ObjectStore> = match &config.storage {
        StorageConfig::Memory => Arc::new(MemoryObjectStore::new()),
        StorageConfig::Filesystem { root } => Arc::new(
            FsObjectStore::open(root)
                .with_context(|| format!("Failed to open storage at {}", root.display()))?,
        ),
    };

    let catalog = match &config.seals {
        Some(path) => MemorySealCatalog::from_json_file(path)
            .with_context(|| format!("Failed to load seal catalog {}", path.display()))?,
        None => MemorySealCatalog::builtin(),
    };

    // Suggest with the first active seal; without one suggestions fail at request time
    let default_seal = catalog
        .list()
        .into_iter()
        .find(|seal| seal.is_active())
        .map(|seal| seal.id)
        .unwrap_or(SealId(0));
    let catalog: Arc<dyn SealCatalog> = Arc::new(catalog);

    Ok(AppState::new(
        store,
        catalog,
        Arc::new(SignatureCornerSuggester::new(default_seal)),
        config.max_upload_bytes,
    )
    .with_session_ttl(Duration::from_secs(config.session_ttl_secs)))
}

/// Periodically drop sessions nobody has touched within their TTL
fn spawn_session_sweeper(state: Arc<AppState>) {
    let period = (state.session_ttl() / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = state.evict_expired().await;
            if evicted > 0 {
                info!(evicted, "expired idle sessions");
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_filter = if args.verbose {
        "sealjoin_api=debug,sealjoin_core=debug,tower_http=debug"
    } else {
        "sealjoin_api=info,tower_http=debug"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load(&args)?;
    info!("Starting SealJoin server on {}:{}", config.host, config.port);

    let state = Arc::new(build_state(&config)?);
    spawn_session_sweeper(Arc::clone(&state));
    let app = app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Storage: {:?}", config.storage);
    info!("Upload limit: {} bytes", config.max_upload_bytes);
    info!("Session TTL: {}s", config.session_ttl_secs);

    axum::serve(listener, app).await?;

    Ok(())
}
