#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use tug_audit::RetirementLedger;
use tug_config::CleanupConfig;
use tug_daemon::state::AppState;
use tug_testkit::{MemHistoryStore, MemRequestStore, ScriptedOracle};

pub struct Fixture {
    pub oracle: Arc<ScriptedOracle>,
    pub requests: Arc<MemRequestStore>,
    pub history: Arc<MemHistoryStore>,
    pub state: Arc<AppState>,
}

pub fn cleanup_config() -> CleanupConfig {
    CleanupConfig {
        interval: Duration::from_secs(60),
        bootstrap_delay: Duration::from_secs(300),
        safety_ceiling: 10,
        lookup_pace: Duration::ZERO,
        retention_days: 30,
        retention_sweep_hour: 2,
    }
}

/// State wired against the in-memory fakes.
pub fn fixture() -> Fixture {
    fixture_with(cleanup_config())
}

pub fn fixture_with(cleanup: CleanupConfig) -> Fixture {
    let oracle = Arc::new(ScriptedOracle::new());
    let requests = Arc::new(MemRequestStore::new());
    let history = Arc::new(MemHistoryStore::new());
    let state = Arc::new(AppState::new(
        requests.clone(),
        RetirementLedger::new(history.clone()),
        oracle.clone(),
        cleanup,
    ));
    Fixture {
        oracle,
        requests,
        history,
        state,
    }
}

// ---------------------------------------------------------------------------
// In-process request helpers (tower oneshot)
// ---------------------------------------------------------------------------

pub async fn send(router: axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
