use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tug_audit::RetirementLedger;
use tug_db::RequestStore;
use tug_oracle::{LocationOracle, OracleError};
use tug_schemas::{
    ActiveRequest, CleanupEvent, FulfillmentType, ManualCleanupOutcome, PassReport, PassStatus,
    RemovedContainer, RequestType,
};

use crate::{EngineConfig, PassError};

/// Orchestrates one reconciliation pass: oracle query, per-item evaluation,
/// safety gating, audited retirement, event fan-out.
pub struct ReconcileEngine {
    oracle: Arc<dyn LocationOracle>,
    requests: Arc<dyn RequestStore>,
    ledger: RetirementLedger,
    bus: broadcast::Sender<CleanupEvent>,
    cfg: EngineConfig,
}

impl ReconcileEngine {
    pub fn new(
        oracle: Arc<dyn LocationOracle>,
        requests: Arc<dyn RequestStore>,
        ledger: RetirementLedger,
        bus: broadcast::Sender<CleanupEvent>,
        cfg: EngineConfig,
    ) -> Self {
        Self {
            oracle,
            requests,
            ledger,
            bus,
            cfg,
        }
    }

    /// Subscribe to the engine's event fan-out.
    pub fn subscribe(&self) -> broadcast::Receiver<CleanupEvent> {
        self.bus.subscribe()
    }

    /// One scheduled reconciliation pass.
    ///
    /// Pass-level failures (production-set fetch, safety gate) abort with no
    /// mutation and are surfaced both as the returned error and as an
    /// error/alert event. Per-item failures leave the item untouched and are
    /// accumulated into the report.
    pub async fn run_pass(&self) -> Result<PassReport, PassError> {
        info!("starting reconciliation pass");

        match self.execute_pass(FulfillmentType::AutoCleanup).await {
            Ok(report) => {
                info!(
                    checked = report.checked_requests,
                    removed = report.removed.len(),
                    errors = report.errors.len(),
                    "reconciliation pass complete"
                );
                self.emit(CleanupEvent::AutoCleanupComplete {
                    checked_requests: report.checked_requests,
                    removed_containers: report.removed.len(),
                    containers_removed: report.removed.clone(),
                    timestamp: Utc::now(),
                });
                Ok(report)
            }
            Err(err) => {
                match &err {
                    PassError::SafetyAbort {
                        candidate_count,
                        candidates,
                    } => {
                        error!(
                            candidate_count,
                            ceiling = self.cfg.safety_ceiling,
                            "safety abort: too many containers flagged for deletion"
                        );
                        self.emit(CleanupEvent::AutoCleanupAlert {
                            candidate_count: *candidate_count,
                            candidates: candidates.clone(),
                            timestamp: Utc::now(),
                        });
                    }
                    other => {
                        error!(error = %other, "reconciliation pass aborted");
                        self.emit(CleanupEvent::AutoCleanupError {
                            error: other.to_string(),
                            timestamp: Utc::now(),
                        });
                    }
                }
                Err(err)
            }
        }
    }

    /// Operator-triggered variant: same evaluation, `manual_cleanup`
    /// fulfillment type, structured result instead of events. Mutual
    /// exclusion against the scheduled job is the caller's responsibility.
    pub async fn run_pass_manual(&self) -> ManualCleanupOutcome {
        match self.execute_pass(FulfillmentType::ManualCleanup).await {
            Ok(report) => ManualCleanupOutcome {
                status: PassStatus::Success,
                checked_requests: report.checked_requests,
                removed_containers: report.removed.len(),
                containers_removed: report.removed,
                errors: report.errors,
            },
            Err(err) => ManualCleanupOutcome {
                status: PassStatus::Error,
                checked_requests: 0,
                removed_containers: 0,
                containers_removed: Vec::new(),
                errors: vec![err.to_string()],
            },
        }
    }

    // -----------------------------------------------------------------------
    // Pass algorithm
    // -----------------------------------------------------------------------

    async fn execute_pass(
        &self,
        fulfillment_type: FulfillmentType,
    ) -> Result<PassReport, PassError> {
        // 1. Authoritative production set, re-fetched every pass. Its failure
        //    is the one fail-fast point: when the truth is unknown, touch
        //    nothing.
        let production = self.fetch_production_set().await?;

        // 2. All active requests, req_time descending.
        let active = self
            .requests
            .list_active()
            .await
            .map_err(|e| PassError::StorageUnavailable(e.to_string()))?;

        let mut report = PassReport {
            checked_requests: active.len(),
            ..PassReport::default()
        };
        let mut candidates: Vec<(ActiveRequest, String)> = Vec::new();
        let mut first_lookup = true;

        for request in active {
            // 3. Put-backs are exempt from automatic retirement regardless of
            //    observed location; manual deletion is their only exit.
            if request.request_type == RequestType::PutBack {
                info!(serial_no = %request.serial_no, "skipping put-back request");
                continue;
            }

            // 4d. Pacing between successive oracle queries.
            if !first_lookup && !self.cfg.lookup_pace.is_zero() {
                tokio::time::sleep(self.cfg.lookup_pace).await;
            }
            first_lookup = false;

            // 4a-c. Absence of information must never cause a deletion.
            match self.oracle.locate(&request.serial_no).await {
                Ok(Some(location)) => {
                    if production.contains(&location) {
                        info!(
                            serial_no = %request.serial_no,
                            location = %location,
                            "flagged for retirement"
                        );
                        candidates.push((request, location));
                    }
                }
                Ok(None) => {
                    warn!(serial_no = %request.serial_no, "location unknown, keeping");
                }
                Err(e) => {
                    warn!(serial_no = %request.serial_no, error = %e, "lookup failed, keeping");
                    report
                        .errors
                        .push(format!("lookup {}: {e}", request.serial_no));
                }
            }
        }

        report.candidate_count = candidates.len();

        // 5. Safety gate: zero deletions when over the ceiling.
        if candidates.len() > self.cfg.safety_ceiling {
            return Err(PassError::SafetyAbort {
                candidate_count: candidates.len(),
                candidates: candidates
                    .into_iter()
                    .map(|(req, loc)| summary(&req, &loc))
                    .collect(),
            });
        }

        // 6. Sequential retirement: audit write happens-before the delete,
        //    for every candidate. A failed write leaves the request intact;
        //    it is retried on the next pass, not within this one.
        for (request, location) in candidates {
            match self
                .ledger
                .record_retirement(&request, &location, fulfillment_type)
                .await
            {
                Ok(_) => {
                    if let Err(e) = self.requests.delete_by_id(request.req_id).await {
                        error!(serial_no = %request.serial_no, error = %e, "delete failed");
                        report
                            .errors
                            .push(format!("delete {}: {e}", request.serial_no));
                        continue;
                    }
                    info!(
                        serial_no = %request.serial_no,
                        location = %location,
                        "container retired"
                    );
                    report.removed.push(summary(&request, &location));
                }
                Err(e) => {
                    error!(
                        serial_no = %request.serial_no,
                        error = %e,
                        "history write failed, skipping deletion"
                    );
                    report
                        .errors
                        .push(format!("history {}: {e}", request.serial_no));
                }
            }
        }

        Ok(report)
    }

    async fn fetch_production_set(&self) -> Result<HashSet<String>, PassError> {
        let locations = self.oracle.production_locations().await.map_err(|e| match e {
            OracleError::Decode(msg) => PassError::MalformedOracleResponse(msg),
            other => PassError::OracleUnavailable(other.to_string()),
        })?;

        if locations.is_empty() {
            return Err(PassError::EmptyProductionSet);
        }
        Ok(locations.into_iter().collect())
    }

    fn emit(&self, event: CleanupEvent) {
        // No subscribers is fine; fan-out membership is self-healing.
        let _ = self.bus.send(event);
    }
}

fn summary(request: &ActiveRequest, location: &str) -> RemovedContainer {
    RemovedContainer {
        serial_no: request.serial_no.clone(),
        current_location: location.to_string(),
        deliver_to: request.deliver_to.clone(),
    }
}
