//! bo-daemon entry point.
//!
//! Thin: loads config and secrets, picks the backend, builds the shared
//! state, wires middleware and starts the HTTP server. All route handlers
//! live in `routes.rs`; all shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use axum::http::{HeaderValue, Method};
use bo_backend::{BackendSettings, RestBackend};
use bo_config::secrets::resolve_secrets_for_mode;
use bo_config::{report_unused_keys, ConfigMode, UnusedKeyPolicy};
use bo_daemon::{routes, state};
use bo_db::PgBackend;
use bo_modules::ModulePolicy;
use bo_runtime::{ModuleSync, SyncSettings};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const DEFAULT_ADDR: &str = "127.0.0.1:8899";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience).
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = bo_config::load_from_env().context("config load failed")?;
    let unused = report_unused_keys(ConfigMode::Serve, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "unused config keys");
    }
    let secrets = resolve_secrets_for_mode(&loaded.config_json, ConfigMode::Serve)?;

    let policy = ModulePolicy::from_config_json(&loaded.config_json);
    let sync_settings = SyncSettings::from_config_json(&loaded.config_json);
    let backend_settings = BackendSettings::from_config_json(&loaded.config_json);

    let sync = match (&secrets.database_url, &secrets.backend_api_key) {
        (Some(url), _) => {
            info!("backend: postgres");
            let pool = bo_db::connect(url).await?;
            let backend = PgBackend::new(pool, backend_settings.rpc.clone())?;
            ModuleSync::with_backend(policy, Arc::new(backend), sync_settings)
        }
        (None, Some(key)) => {
            info!(base_url = ?backend_settings.base_url, "backend: rest");
            let backend = RestBackend::new(&backend_settings, key.clone())?;
            ModuleSync::with_backend(policy, Arc::new(backend), sync_settings)
        }
        (None, None) => return Err(anyhow!("no backend credentials resolved")),
    };

    info!(config_hash = %loaded.config_hash, write_back = sync_settings.write_back, "config loaded");

    let shared = Arc::new(state::AppState::new(sync, Some(loaded.config_hash.clone())));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr(&loaded)?;
    info!("bo-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// BO_DAEMON_ADDR, then `/daemon/addr`, then the default.
fn bind_addr(loaded: &bo_config::LoadedConfig) -> anyhow::Result<SocketAddr> {
    let raw = std::env::var("BO_DAEMON_ADDR")
        .ok()
        .or_else(|| loaded.str_at("/daemon/addr").map(str::to_string))
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());
    raw.parse()
        .with_context(|| format!("invalid daemon bind address '{raw}'"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed");
    }
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
