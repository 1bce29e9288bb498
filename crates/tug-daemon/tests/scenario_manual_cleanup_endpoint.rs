//! Scenario: the manual cleanup trigger and the status endpoint.
//!
//! # Invariants under test
//! - POST /v1/cleanup/manual runs one pass and returns the structured
//!   outcome; the pass is audited as manual_cleanup.
//! - The trigger is refused with 409 while another pass holds the guard.
//! - GET /v1/cleanup/status reflects the guard and the last pass outcome.

mod common;

use axum::http::StatusCode;
use tug_daemon::routes::build_router;
use tug_schemas::FulfillmentType;
use tug_testkit::pickup;

#[tokio::test]
async fn manual_trigger_runs_a_pass_and_reports() {
    let f = common::fixture();
    f.oracle.set_production_locations(&["PROD-A"]);
    f.requests.seed(pickup("S1001"));
    f.oracle.set_location("S1001", "PROD-A");
    let router = build_router(f.state.clone());

    let (status, body) =
        common::send(router.clone(), common::post_empty("/v1/cleanup/manual")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["checked_requests"], 1);
    assert_eq!(body["removed_containers"], 1);
    assert_eq!(body["containers_removed"][0]["serial_no"], "S1001");

    let rec = f.history.record_for_serial("S1001").unwrap();
    assert_eq!(rec.fulfillment_type, FulfillmentType::ManualCleanup);

    // The outcome is visible on the status endpoint.
    let (status, body) = common::send(router, common::get("/v1/cleanup/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["running"], false);
    assert_eq!(body["last_pass"]["status"], "success");
    assert_eq!(body["last_pass"]["removed_containers"], 1);
}

#[tokio::test]
async fn trigger_refused_while_a_pass_is_running() {
    let f = common::fixture();
    let router = build_router(f.state.clone());

    let _held = f.state.cleanup_guard.try_acquire().unwrap();

    let (status, body) =
        common::send(router.clone(), common::post_empty("/v1/cleanup/manual")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already running"));

    let (_, body) = common::send(router, common::get("/v1/cleanup/status")).await;
    assert_eq!(body["running"], true);
}

#[tokio::test]
async fn status_echoes_the_configured_policy() {
    let f = common::fixture();
    let router = build_router(f.state.clone());

    let (status, body) = common::send(router, common::get("/v1/cleanup/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["interval_secs"], 60);
    assert_eq!(body["safety_ceiling"], 10);
    assert_eq!(body["retention_days"], 30);
    assert_eq!(body["active_requests"], 0);
    assert_eq!(body["last_pass"], serde_json::Value::Null);
}

#[tokio::test]
async fn failed_manual_pass_reports_error_outcome() {
    let f = common::fixture();
    // No production locations scripted: the pass aborts.
    f.requests.seed(pickup("S2001"));
    let router = build_router(f.state.clone());

    let (status, body) = common::send(router, common::post_empty("/v1/cleanup/manual")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["removed_containers"], 0);
    assert!(f.requests.contains_serial("S2001"));
}
