//! Axum router and all HTTP handlers for tug-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use tug_audit::MANUAL_DELETE_LOCATION;
use tug_db::StoreError;
use tug_schemas::{ActiveRequest, CleanupEvent, FulfillmentType, NewActiveRequest, PassStatus};

use crate::{
    api_types::{
        CleanupStatusResponse, DeleteResponse, ErrorResponse, HealthResponse, SubmitRequest,
    },
    state::{AppState, PassSummary},
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
        .route("/v1/requests", get(list_requests).post(submit_request))
        .route("/v1/requests/:serial_no", delete(delete_request))
        .route("/v1/cleanup/manual", post(manual_cleanup))
        .route("/v1/cleanup/status", get(cleanup_status))
        .route("/v1/stream", get(stream))
        .with_state(state)
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response()
}

fn storage_error(e: StoreError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
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
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/requests
// ---------------------------------------------------------------------------

pub(crate) async fn list_requests(State(st): State<Arc<AppState>>) -> Response {
    match st.requests.list_active().await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => storage_error(e),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/requests
// ---------------------------------------------------------------------------

pub(crate) async fn submit_request(
    State(st): State<Arc<AppState>>,
    Json(body): Json<SubmitRequest>,
) -> Response {
    if body.serial_no.trim().is_empty() {
        return bad_request("serial_no must be non-empty".to_string());
    }
    if !body.quantity.is_finite() || body.quantity < 0.0 {
        return bad_request("quantity must be non-negative".to_string());
    }

    let req_time = match &body.req_time {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => t.with_timezone(&Utc),
            Err(e) => return bad_request(format!("invalid req_time {raw:?}: {e}")),
        },
        None => Utc::now(),
    };

    let new = NewActiveRequest {
        serial_no: body.serial_no,
        part_no: body.part_no,
        revision: body.revision,
        quantity: body.quantity,
        stored_location: body.stored_location,
        deliver_to: body.deliver_to,
        req_time,
        master_unit_no: body.master_unit_no,
        request_type: body.request_type,
    };

    match st.requests.insert(&new).await {
        Ok(req_id) => {
            info!(req_id, serial_no = %new.serial_no, "request submitted");
            let row = ActiveRequest {
                req_id,
                serial_no: new.serial_no,
                part_no: new.part_no,
                revision: new.revision,
                quantity: new.quantity,
                stored_location: new.stored_location,
                deliver_to: new.deliver_to,
                req_time: new.req_time,
                master_unit_no: new.master_unit_no,
                request_type: new.request_type,
            };
            (StatusCode::CREATED, Json(row)).into_response()
        }
        Err(e) => storage_error(e),
    }
}

// ---------------------------------------------------------------------------
// DELETE /v1/requests/{serial_no}
// ---------------------------------------------------------------------------

/// Manual deletion. Audited with the manual-delete location sentinel, since
/// the container's real whereabouts are unknown here. History first: when
/// the append fails the request stays active and the caller gets a 500.
pub(crate) async fn delete_request(
    State(st): State<Arc<AppState>>,
    Path(serial_no): Path<String>,
) -> Response {
    let found = match st.requests.find_by_serial(&serial_no).await {
        Ok(found) => found,
        Err(e) => return storage_error(e),
    };
    let Some(req) = found else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("no active request for serial {serial_no}"),
            }),
        )
            .into_response();
    };

    if let Err(e) = st
        .ledger
        .record_retirement(&req, MANUAL_DELETE_LOCATION, FulfillmentType::ManualDelete)
        .await
    {
        return storage_error(e);
    }
    if let Err(e) = st.requests.delete_by_id(req.req_id).await {
        return storage_error(e);
    }

    info!(serial_no = %serial_no, "request manually deleted");
    (
        StatusCode::OK,
        Json(DeleteResponse {
            status: "deleted".to_string(),
            serial_no,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/cleanup/manual
// ---------------------------------------------------------------------------

/// Operator-triggered pass. Refused with 409 while another pass (scheduled
/// or manual) holds the guard.
pub(crate) async fn manual_cleanup(State(st): State<Arc<AppState>>) -> Response {
    let Some(_guard) = st.cleanup_guard.try_acquire() else {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "a cleanup pass is already running".to_string(),
            }),
        )
            .into_response();
    };

    info!("manual cleanup triggered");
    let outcome = st.engine.run_pass_manual().await;
    st.record_pass(PassSummary::from_manual(&outcome)).await;

    let code = match outcome.status {
        PassStatus::Success => StatusCode::OK,
        PassStatus::Error => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(outcome)).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/cleanup/status
// ---------------------------------------------------------------------------

pub(crate) async fn cleanup_status(State(st): State<Arc<AppState>>) -> Response {
    let active_requests = match st.requests.list_active().await {
        Ok(rows) => rows.len(),
        Err(e) => return storage_error(e),
    };
    let last_pass = st.last_pass.read().await.clone();
    (
        StatusCode::OK,
        Json(CleanupStatusResponse {
            running: st.cleanup_guard.is_held(),
            interval_secs: st.cleanup.interval.as_secs(),
            safety_ceiling: st.cleanup.safety_ceiling,
            retention_days: st.cleanup.retention_days,
            active_requests,
            last_pass,
        }),
    )
        .into_response()
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

pub(crate) fn event_name(ev: &CleanupEvent) -> &'static str {
    match ev {
        CleanupEvent::AutoCleanupComplete { .. } => "auto_cleanup_complete",
        CleanupEvent::AutoCleanupError { .. } => "auto_cleanup_error",
        CleanupEvent::AutoCleanupAlert { .. } => "auto_cleanup_alert",
    }
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<CleanupEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(ev) => {
                let data = serde_json::to_string(&ev).ok()?;
                Some(Ok(Event::default().event(event_name(&ev)).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
