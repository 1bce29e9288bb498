//! tug-schemas
//!
//! Shared domain types for the container tracking system. No I/O lives here;
//! every other crate depends on these definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RequestType
// ---------------------------------------------------------------------------

/// Whether a request pulls material out of warehouse storage or returns it.
///
/// PUT_BACK requests are permanently exempt from automatic retirement: the
/// reconciliation engine never deletes them, whatever location the oracle
/// reports. Manual deletion is their only exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    #[serde(rename = "PICK_UP")]
    PickUp,
    #[serde(rename = "PUT_BACK")]
    PutBack,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::PickUp => "PICK_UP",
            RequestType::PutBack => "PUT_BACK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PICK_UP" => Some(RequestType::PickUp),
            "PUT_BACK" => Some(RequestType::PutBack),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// FulfillmentType
// ---------------------------------------------------------------------------

/// How an active request left the active store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentType {
    AutoCleanup,
    ManualCleanup,
    ManualDelete,
}

impl FulfillmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentType::AutoCleanup => "auto_cleanup",
            FulfillmentType::ManualCleanup => "manual_cleanup",
            FulfillmentType::ManualDelete => "manual_delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto_cleanup" => Some(FulfillmentType::AutoCleanup),
            "manual_cleanup" => Some(FulfillmentType::ManualCleanup),
            "manual_delete" => Some(FulfillmentType::ManualDelete),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ActiveRequest
// ---------------------------------------------------------------------------

/// One outstanding tracking entry: a container checked out from warehouse
/// storage and awaiting delivery to a production work-center.
///
/// Exists from submission until exactly one of auto-retirement, manual
/// retirement, or manual deletion; never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRequest {
    /// Store-assigned identity; unique, monotonic, never reused.
    pub req_id: i64,
    pub serial_no: String,
    pub part_no: String,
    pub revision: String,
    /// Non-negative; validated at submission.
    pub quantity: f64,
    /// Warehouse location the container was stored at when requested.
    pub stored_location: String,
    /// Destination work-center.
    pub deliver_to: String,
    /// Submission instant, normalized to UTC regardless of origin zone.
    pub req_time: DateTime<Utc>,
    /// Optional group tag when the request covers a whole master unit.
    pub master_unit_no: Option<String>,
    pub request_type: RequestType,
}

/// Submission payload: everything but the id, which the store assigns from
/// its identity sequence. A bare process-wide counter is deliberately absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActiveRequest {
    pub serial_no: String,
    pub part_no: String,
    pub revision: String,
    pub quantity: f64,
    pub stored_location: String,
    pub deliver_to: String,
    pub req_time: DateTime<Utc>,
    pub master_unit_no: Option<String>,
    pub request_type: RequestType,
}

// ---------------------------------------------------------------------------
// HistoryRecord
// ---------------------------------------------------------------------------

/// Immutable audit of a retired ActiveRequest. Append-only; never mutated;
/// purged only by age via the retention sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub req_id: i64,
    pub serial_no: String,
    pub part_no: String,
    pub revision: String,
    pub quantity: f64,
    pub stored_location: String,
    pub deliver_to: String,
    pub req_time: DateTime<Utc>,
    /// UTC instant of retirement.
    pub fulfilled_time: DateTime<Utc>,
    /// floor((fulfilled_time − req_time) in minutes).
    pub duration_minutes: i64,
    pub fulfillment_type: FulfillmentType,
    /// Observed location at retirement, or a sentinel for manual deletions.
    pub current_location: String,
    pub master_unit_no: Option<String>,
    pub request_type: RequestType,
}

// ---------------------------------------------------------------------------
// Pass aggregates
// ---------------------------------------------------------------------------

/// Per-removed-item summary carried in events and manual-trigger results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedContainer {
    pub serial_no: String,
    pub current_location: String,
    pub deliver_to: String,
}

/// Ephemeral aggregate of one reconciliation pass. Not persisted; emitted
/// through events and the manual-trigger result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    /// Requests examined this pass (put-backs included in the count).
    pub checked_requests: usize,
    /// Requests whose observed location was in the production set.
    pub candidate_count: usize,
    pub removed: Vec<RemovedContainer>,
    /// Per-item errors absorbed during the pass (item left untouched).
    pub errors: Vec<String>,
}

/// Structured result of the operator-triggered manual pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualCleanupOutcome {
    pub status: PassStatus,
    pub checked_requests: usize,
    pub removed_containers: usize,
    pub containers_removed: Vec<RemovedContainer>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassStatus {
    Success,
    Error,
}

// ---------------------------------------------------------------------------
// CleanupEvent — notification fan-out payload
// ---------------------------------------------------------------------------

/// Events broadcast after each pass and surfaced to subscribers as SSE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CleanupEvent {
    AutoCleanupComplete {
        checked_requests: usize,
        removed_containers: usize,
        containers_removed: Vec<RemovedContainer>,
        timestamp: DateTime<Utc>,
    },
    AutoCleanupError {
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// Safety-gate alert: the candidate count exceeded the ceiling and the
    /// retirement phase was aborted with zero deletions.
    AutoCleanupAlert {
        candidate_count: usize,
        candidates: Vec<RemovedContainer>,
        timestamp: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn request_type_round_trip() {
        assert_eq!(RequestType::parse("PICK_UP"), Some(RequestType::PickUp));
        assert_eq!(RequestType::parse("PUT_BACK"), Some(RequestType::PutBack));
        assert_eq!(RequestType::parse("RETURN"), None);
        assert_eq!(RequestType::PutBack.as_str(), "PUT_BACK");
    }

    #[test]
    fn fulfillment_type_round_trip() {
        for t in [
            FulfillmentType::AutoCleanup,
            FulfillmentType::ManualCleanup,
            FulfillmentType::ManualDelete,
        ] {
            assert_eq!(FulfillmentType::parse(t.as_str()), Some(t));
        }
        assert_eq!(FulfillmentType::parse("other"), None);
    }

    #[test]
    fn cleanup_event_serializes_with_type_tag() {
        let ev = CleanupEvent::AutoCleanupComplete {
            checked_requests: 3,
            removed_containers: 1,
            containers_removed: vec![RemovedContainer {
                serial_no: "S1001".to_string(),
                current_location: "PROD-A".to_string(),
                deliver_to: "WC-7".to_string(),
            }],
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        };
        let v: serde_json::Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "auto_cleanup_complete");
        assert_eq!(v["checked_requests"], 3);
        assert_eq!(v["containers_removed"][0]["serial_no"], "S1001");
    }

    #[test]
    fn pass_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PassStatus::Success).unwrap(),
            "\"success\""
        );
        assert_eq!(
            serde_json::to_string(&PassStatus::Error).unwrap(),
            "\"error\""
        );
    }
}
