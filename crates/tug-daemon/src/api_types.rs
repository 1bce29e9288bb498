//! Request and response types for all tug-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use serde::{Deserialize, Serialize};
use tug_schemas::RequestType;

use crate::state::PassSummary;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Error body
// ---------------------------------------------------------------------------

/// Uniform error body for 4xx/5xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// POST /v1/requests
// ---------------------------------------------------------------------------

/// Submission payload. `req_time` is an optional RFC 3339 timestamp; when
/// absent the submission instant is used. A present but malformed value is
/// rejected, never silently replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub serial_no: String,
    pub part_no: String,
    pub revision: String,
    pub quantity: f64,
    pub stored_location: String,
    pub deliver_to: String,
    #[serde(default)]
    pub req_time: Option<String>,
    #[serde(default)]
    pub master_unit_no: Option<String>,
    pub request_type: RequestType,
}

// ---------------------------------------------------------------------------
// DELETE /v1/requests/{serial_no}
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: String,
    pub serial_no: String,
}

// ---------------------------------------------------------------------------
// GET /v1/cleanup/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupStatusResponse {
    /// Whether a cleanup pass is executing right now.
    pub running: bool,
    pub interval_secs: u64,
    pub safety_ceiling: usize,
    pub retention_days: i64,
    /// Current size of the active-request table.
    pub active_requests: usize,
    /// Outcome of the most recent pass, if any has completed yet.
    pub last_pass: Option<PassSummary>,
}
