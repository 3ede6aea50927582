//! In-process scenario tests for bo-daemon HTTP endpoints.
//!
//! These tests spin up the Axum router **without** binding a TCP socket.
//! Each test calls `routes::build_router` over an in-memory backend and
//! drives it via `tower::ServiceExt::oneshot`; no network I/O required.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Request, StatusCode};
use bo_backend::MemoryBackend;
use bo_daemon::{routes, state};
use bo_modules::{FeatureSet, ModuleActivationMap, ModulePolicy};
use bo_runtime::{ModuleSync, SyncSettings};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt; // oneshot
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_state(backend: Arc<MemoryBackend>) -> Arc<state::AppState> {
    let sync = ModuleSync::with_backend(ModulePolicy::default(), backend, SyncSettings::default());
    Arc::new(state::AppState::new(sync, Some("cafebabe".to_string())))
}

fn make_router() -> axum::Router {
    routes::build_router(make_state(Arc::new(MemoryBackend::default())))
}

/// Drive the router with a single request and return (status, body_bytes).
async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

/// Parse body bytes as a `serde_json::Value`.
fn parse_json(b: bytes::Bytes) -> serde_json::Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

/// Client on an enterprise plan with one stale `false`.
fn enterprise_client(backend: &MemoryBackend) -> Uuid {
    let client = Uuid::new_v4();
    let plan = Uuid::new_v4();
    backend.insert_plan(plan, Some("Entreprise"), Some(FeatureSet::new()));
    backend.subscribe(client, plan);
    backend.set_modules(client, ModuleActivationMap::new().with("finance", false));
    client
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let (status, body) = call(make_router(), get("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "bo-daemon");
    assert_eq!(json["config_hash"], "cafebabe");
}

// ---------------------------------------------------------------------------
// GET /v1/clients/:client_id/modules
// ---------------------------------------------------------------------------

#[tokio::test]
async fn client_modules_runs_a_full_pass() {
    let backend = Arc::new(MemoryBackend::default());
    let client = enterprise_client(&backend);
    let st = make_state(Arc::clone(&backend));
    let mut rx = st.bus.subscribe();

    let (status, body) = call(
        routes::build_router(Arc::clone(&st)),
        get(&format!("/v1/clients/{client}/modules")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["client_id"], client.to_string());
    assert_eq!(json["plan_name"], "Entreprise");
    assert_eq!(json["modules"]["finance"], true);
    assert!(json["modules"].get("settings").is_none());
    assert_eq!(json["enabled"].as_array().unwrap().len(), 10);
    assert_eq!(json["write_back"]["status"], "persisted");
    assert_eq!(json["report"]["outcome"], "changed");

    match rx.try_recv().expect("reconciled event published") {
        state::BusMsg::ModulesReconciled {
            client_id, enabled, ..
        } => {
            assert_eq!(client_id, client);
            assert_eq!(enabled.len(), 10);
        }
        other => panic!("unexpected bus message: {other:?}"),
    }
    assert_eq!(backend.sync_calls(), 1);
}

#[tokio::test]
async fn bad_client_id_is_400() {
    let (status, body) = call(make_router(), get("/v1/clients/not-a-uuid/modules")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse_json(body)["code"], "BAD_CLIENT_ID");
}

#[tokio::test]
async fn store_read_failure_is_502() {
    let backend = Arc::new(MemoryBackend::default());
    backend.set_fail_read(true);
    let router = routes::build_router(make_state(backend));

    let (status, body) = call(router, get(&format!("/v1/clients/{}/modules", Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json = parse_json(body);
    assert_eq!(json["code"], "STORE_UNAVAILABLE");
    assert!(json["error"].as_str().unwrap().contains("read module map failed"));
}

#[tokio::test]
async fn write_back_failure_is_200_with_event() {
    let backend = Arc::new(MemoryBackend::default());
    let client = enterprise_client(&backend);
    backend.set_fail_sync(true);
    let st = make_state(Arc::clone(&backend));
    let mut rx = st.bus.subscribe();

    let (status, body) = call(
        routes::build_router(Arc::clone(&st)),
        get(&format!("/v1/clients/{client}/modules")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["write_back"]["status"], "failed");
    assert_eq!(json["modules"]["finance"], true);

    let mut saw_failure = false;
    while let Ok(msg) = rx.try_recv() {
        if let state::BusMsg::WriteBackFailed { client_id, .. } = msg {
            assert_eq!(client_id, client);
            saw_failure = true;
        }
    }
    assert!(saw_failure, "write_back_failed event expected");
}

#[tokio::test]
async fn detached_pass_returns_pending_then_persists() {
    let backend = Arc::new(MemoryBackend::default());
    let client = enterprise_client(&backend);
    let router = routes::build_router(make_state(Arc::clone(&backend)));

    let (status, body) = call(router, get(&format!("/v1/clients/{client}/modules?detach=true"))).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["write_back"]["status"], "pending");
    assert_eq!(json["modules"]["finance"], true);

    // The spawned write-back lands shortly after.
    for _ in 0..50 {
        if backend.sync_calls() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(backend.sync_calls(), 1);
}

#[tokio::test]
async fn detached_write_back_publishes_persisted_map() {
    let backend = Arc::new(MemoryBackend::default());
    let client = enterprise_client(&backend);
    let st = make_state(Arc::clone(&backend));
    let mut rx = st.bus.subscribe();

    let (status, body) = call(
        routes::build_router(Arc::clone(&st)),
        get(&format!("/v1/clients/{client}/modules?detach=true")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse_json(body)["write_back"]["status"], "pending");

    let persisted = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(state::BusMsg::WriteBackPersisted {
                    client_id, enabled, ..
                }) => return (client_id, enabled),
                Ok(_) => continue,
                Err(e) => panic!("bus closed: {e}"),
            }
        }
    })
    .await
    .expect("write_back_persisted event within 2s");

    assert_eq!(persisted.0, client);
    assert_eq!(persisted.1.len(), 10);
    assert!(persisted.1.iter().any(|m| m == "finance"));
    assert!(!persisted.1.iter().any(|m| m == "settings"));
    assert_eq!(backend.sync_calls(), 1);
}

// ---------------------------------------------------------------------------
// POST /v1/modules/preview
// ---------------------------------------------------------------------------

#[tokio::test]
async fn preview_reports_changes_without_backend() {
    let req = post_json(
        "/v1/modules/preview",
        json!({
            "features": { "accounting": true, "administration": true },
            "prior": { "finance": false, "clients": true },
            "plan_name": "Pro"
        }),
    );
    let (status, body) = call(make_router(), req).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["outcome"], "changed");
    assert_eq!(json["result"]["finance"], true);
    assert_eq!(json["result"]["clients"], true);
    assert!(json["result"].get("settings").is_none());
    assert_eq!(json["suppressed"][0]["code"], "settings");
}

#[tokio::test]
async fn preview_without_features_is_no_plan() {
    let req = post_json(
        "/v1/modules/preview",
        json!({ "features": null, "prior": { "finance": false }, "plan_name": "Enterprise" }),
    );
    let (status, body) = call(make_router(), req).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["outcome"], "no_plan");
    assert_eq!(json["result"], json!({ "finance": false }));
}

#[tokio::test]
async fn preview_with_non_object_features_is_no_plan() {
    for bad in [json!("corrupted"), json!(["finance"]), json!(3)] {
        let req = post_json(
            "/v1/modules/preview",
            json!({ "features": bad, "prior": { "finance": false }, "plan_name": "Enterprise" }),
        );
        let (status, body) = call(make_router(), req).await;
        assert_eq!(status, StatusCode::OK);
        let json = parse_json(body);
        assert_eq!(json["outcome"], "no_plan", "features {bad}");
        assert_eq!(json["result"], json!({ "finance": false }));
        assert_eq!(json["changes"], json!([]));
    }
}

// ---------------------------------------------------------------------------
// POST /v1/modules/migrate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn migrate_folds_legacy_keys() {
    let req = post_json(
        "/v1/modules/migrate",
        json!({ "modules": { "collaborateurs": true, "factures": false, "custom_x": true } }),
    );
    let (status, body) = call(make_router(), req).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["modules"]["collaborators"], true);
    assert_eq!(json["modules"]["invoicing"], false);
    assert!(json["modules"].get("collaborateurs").is_none());
    assert_eq!(json["renamed"].as_array().unwrap().len(), 2);
    assert_eq!(json["unrecognised"], json!(["custom_x"]));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (status, _) = call(make_router(), get("/v1/run/start")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
