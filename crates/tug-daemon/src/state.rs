//! Shared runtime state for tug-daemon.
//!
//! All types here are `Clone`-able (via `Arc` or copy). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, OwnedMutexGuard, RwLock};
use tug_audit::RetirementLedger;
use tug_config::CleanupConfig;
use tug_db::RequestStore;
use tug_engine::{EngineConfig, PassError, ReconcileEngine};
use tug_oracle::LocationOracle;
use tug_schemas::{CleanupEvent, ManualCleanupOutcome, PassReport, PassStatus};

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in the health response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// JobGuard — cleanup single-flight
// ---------------------------------------------------------------------------

/// Mutual-exclusion guard shared by every cleanup trigger (scheduled,
/// bootstrap, manual). At most one pass runs at a time; a trigger that
/// finds the guard held skips instead of queueing.
#[derive(Clone, Default)]
pub struct JobGuard {
    inner: Arc<tokio::sync::Mutex<()>>,
}

impl JobGuard {
    /// Non-blocking acquire. The pass runs for as long as the returned
    /// guard is held.
    pub fn try_acquire(&self) -> Option<OwnedMutexGuard<()>> {
        self.inner.clone().try_lock_owned().ok()
    }

    pub fn is_held(&self) -> bool {
        // A successful probe is released immediately.
        self.inner.try_lock().is_err()
    }
}

// ---------------------------------------------------------------------------
// PassSummary
// ---------------------------------------------------------------------------

/// Outcome of the most recent cleanup pass, surfaced by
/// GET /v1/cleanup/status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PassSummary {
    pub finished_at: DateTime<Utc>,
    pub status: PassStatus,
    pub checked_requests: usize,
    pub removed_containers: usize,
    pub errors: Vec<String>,
}

impl PassSummary {
    pub fn from_report(report: &PassReport) -> Self {
        Self {
            finished_at: Utc::now(),
            status: PassStatus::Success,
            checked_requests: report.checked_requests,
            removed_containers: report.removed.len(),
            errors: report.errors.clone(),
        }
    }

    pub fn from_error(err: &PassError) -> Self {
        Self {
            finished_at: Utc::now(),
            status: PassStatus::Error,
            checked_requests: 0,
            removed_containers: 0,
            errors: vec![err.to_string()],
        }
    }

    pub fn from_manual(outcome: &ManualCleanupOutcome) -> Self {
        Self {
            finished_at: Utc::now(),
            status: outcome.status,
            checked_requests: outcome.checked_requests,
            removed_containers: outcome.removed_containers,
            errors: outcome.errors.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers and the scheduler.
pub struct AppState {
    pub engine: Arc<ReconcileEngine>,
    pub requests: Arc<dyn RequestStore>,
    pub ledger: RetirementLedger,
    /// Broadcast bus for SSE; the engine publishes, /v1/stream subscribes.
    pub bus: broadcast::Sender<CleanupEvent>,
    pub cleanup_guard: JobGuard,
    pub last_pass: RwLock<Option<PassSummary>>,
    pub cleanup: CleanupConfig,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        ledger: RetirementLedger,
        oracle: Arc<dyn LocationOracle>,
        cleanup: CleanupConfig,
    ) -> Self {
        let (bus, _rx) = broadcast::channel::<CleanupEvent>(1024);

        let engine = Arc::new(ReconcileEngine::new(
            oracle,
            requests.clone(),
            ledger.clone(),
            bus.clone(),
            EngineConfig {
                safety_ceiling: cleanup.safety_ceiling,
                lookup_pace: cleanup.lookup_pace,
            },
        ));

        Self {
            engine,
            requests,
            ledger,
            bus,
            cleanup_guard: JobGuard::default(),
            last_pass: RwLock::new(None),
            cleanup,
            build: BuildInfo {
                service: "tug-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }

    pub async fn record_pass(&self, summary: PassSummary) {
        *self.last_pass.write().await = Some(summary);
    }
}
