//! Axum router and all HTTP handlers for bo-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use bo_modules::{migrate_legacy_keys, reconcile_with_report, FeatureSet, ModuleActivationMap};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    api_types::{
        ClientModulesResponse, ErrorResponse, HealthResponse, MigrateRequest, ModulesQuery,
        PreviewRequest,
    },
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/clients/:client_id/modules", get(client_modules))
        .route("/v1/modules/preview", post(modules_preview))
        .route("/v1/modules/migrate", post(modules_migrate))
        .with_state(state)
}

fn error(status: StatusCode, code: &str, msg: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
            code: code.to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.clone(),
            version: st.build.version.clone(),
            uptime_secs: uptime_secs(),
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/clients/:client_id/modules
// ---------------------------------------------------------------------------

/// Run one reconciliation pass for the client.
///
/// Default: the write-back is awaited and the re-merged persisted map is
/// returned. With `?detach=true` the in-memory result is returned at once and
/// the write-back finishes on a background task, reporting through the bus.
pub(crate) async fn client_modules(
    State(st): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
    Query(q): Query<ModulesQuery>,
) -> Response {
    let Ok(client_id) = Uuid::parse_str(raw_id.trim()) else {
        return error(
            StatusCode::BAD_REQUEST,
            "BAD_CLIENT_ID",
            format!("client id '{raw_id}' is not a uuid"),
        );
    };

    let outcome = if q.detach {
        match st.sync.load_detached(client_id).await {
            Ok((outcome, handle)) => {
                if let Some(handle) = handle {
                    let bg = Arc::clone(&st);
                    let plan_id = outcome.plan_id;
                    let derived = outcome.report.derived.clone();
                    tokio::spawn(async move {
                        match handle.await {
                            Ok(wb) => bg.publish_write_back(client_id, plan_id, &wb, &derived),
                            Err(e) => warn!(%client_id, error = %e, "write-back task aborted"),
                        }
                    });
                }
                Ok(outcome)
            }
            Err(e) => Err(e),
        }
    } else {
        st.sync.load(client_id).await
    };

    let outcome = match outcome {
        Ok(o) => o,
        Err(err) => {
            warn!(%client_id, error = %format!("{err:#}"), "reconciliation pass failed");
            return error(StatusCode::BAD_GATEWAY, "STORE_UNAVAILABLE", format!("{err:#}"));
        }
    };

    info!(%client_id, changes = outcome.report.changes.len(), detach = q.detach, "clients/modules");
    let _ = st.bus.send(BusMsg::reconciled(&outcome));
    st.publish_write_back(
        client_id,
        outcome.plan_id,
        &outcome.write_back,
        &outcome.report.derived,
    );

    let enabled = outcome.modules.enabled();
    (StatusCode::OK, Json(ClientModulesResponse { outcome, enabled })).into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/modules/preview
// ---------------------------------------------------------------------------

/// Pure reconciliation, no backend access.
pub(crate) async fn modules_preview(
    State(st): State<Arc<AppState>>,
    Json(req): Json<PreviewRequest>,
) -> impl IntoResponse {
    let features = req.features.as_ref().and_then(FeatureSet::from_plan_column);
    let prior = req
        .prior
        .as_ref()
        .map(ModuleActivationMap::from_json)
        .unwrap_or_default();

    let report = reconcile_with_report(
        st.sync.policy(),
        features.as_ref(),
        &prior,
        req.plan_name.as_deref(),
    );
    (StatusCode::OK, Json(report))
}

// ---------------------------------------------------------------------------
// POST /v1/modules/migrate
// ---------------------------------------------------------------------------

pub(crate) async fn modules_migrate(
    State(st): State<Arc<AppState>>,
    Json(req): Json<MigrateRequest>,
) -> impl IntoResponse {
    let map = ModuleActivationMap::from_json(&req.modules);
    let migration = migrate_legacy_keys(st.sync.policy(), &map);
    (StatusCode::OK, Json(migration))
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
