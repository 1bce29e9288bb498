//! tug-audit
//!
//! Retirement ledger: the single writer through which every active-request
//! removal must pass. A retirement is audited first and deleted second;
//! callers must not delete when [`RetirementLedger::record_retirement`]
//! fails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use tug_db::{HistoryStore, StoreError};
use tug_schemas::{ActiveRequest, FulfillmentType, HistoryRecord};

/// `current_location` sentinel for manual deletions, where the container's
/// real whereabouts are unknown at deletion time.
pub const MANUAL_DELETE_LOCATION: &str = "Unknown (Manual Delete)";

/// Append-only audit writer over a [`HistoryStore`].
#[derive(Clone)]
pub struct RetirementLedger {
    history: Arc<dyn HistoryStore>,
}

impl RetirementLedger {
    pub fn new(history: Arc<dyn HistoryStore>) -> Self {
        Self { history }
    }

    /// Write the audit record for a retirement at the current UTC instant.
    ///
    /// All-or-nothing: on error nothing was appended and the paired delete
    /// must not happen.
    pub async fn record_retirement(
        &self,
        request: &ActiveRequest,
        current_location: &str,
        fulfillment_type: FulfillmentType,
    ) -> Result<HistoryRecord, StoreError> {
        self.record_retirement_at(request, current_location, fulfillment_type, Utc::now())
            .await
    }

    /// Same as [`record_retirement`](Self::record_retirement) with an
    /// explicit retirement instant, for deterministic tests.
    pub async fn record_retirement_at(
        &self,
        request: &ActiveRequest,
        current_location: &str,
        fulfillment_type: FulfillmentType,
        fulfilled_time: DateTime<Utc>,
    ) -> Result<HistoryRecord, StoreError> {
        let record = build_record(request, current_location, fulfillment_type, fulfilled_time);
        self.history.append(&record).await?;
        info!(
            serial_no = %record.serial_no,
            duration_minutes = record.duration_minutes,
            fulfillment_type = fulfillment_type.as_str(),
            "retirement recorded"
        );
        Ok(record)
    }

    /// Retention sweep: delete history older than `retention_days` by
    /// `fulfilled_time`. Returns the count purged.
    pub async fn purge_older_than(&self, retention_days: i64) -> Result<u64, StoreError> {
        let purged = self.history.purge_older_than(retention_days).await?;
        if purged > 0 {
            info!(purged, retention_days, "history retention sweep");
        }
        Ok(purged)
    }
}

/// `duration_minutes` is floor((fulfilled_time − req_time) in minutes).
/// `req_time` was normalized to UTC at submission, so the subtraction is
/// zone-free.
fn build_record(
    request: &ActiveRequest,
    current_location: &str,
    fulfillment_type: FulfillmentType,
    fulfilled_time: DateTime<Utc>,
) -> HistoryRecord {
    let duration_minutes = (fulfilled_time - request.req_time).num_minutes();
    HistoryRecord {
        req_id: request.req_id,
        serial_no: request.serial_no.clone(),
        part_no: request.part_no.clone(),
        revision: request.revision.clone(),
        quantity: request.quantity,
        stored_location: request.stored_location.clone(),
        deliver_to: request.deliver_to.clone(),
        req_time: request.req_time,
        fulfilled_time,
        duration_minutes,
        fulfillment_type,
        current_location: current_location.to_string(),
        master_unit_no: request.master_unit_no.clone(),
        request_type: request.request_type,
    }
}
