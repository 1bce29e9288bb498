//! tug-engine
//!
//! The reconciliation engine: one pass cross-references the oracle's
//! authoritative location feed against the active-request store, applies
//! exemption and safety policy, and retires arrived containers through the
//! audit ledger. The scheduler in tug-daemon drives [`ReconcileEngine::run_pass`]
//! on a fixed interval; operators can invoke
//! [`ReconcileEngine::run_pass_manual`] on demand.

use std::time::Duration;

mod engine;
mod error;

pub use engine::ReconcileEngine;
pub use error::PassError;

/// Reconciliation policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Maximum candidates permitted in one pass before the retirement phase
    /// aborts with zero deletions. Guards against systemic misclassification
    /// (e.g. an oracle outage returning a degenerate location for
    /// everything) causing mass data loss.
    pub safety_ceiling: usize,
    /// Pacing delay between successive oracle lookups within a pass,
    /// bounding the outbound call rate to the external system.
    pub lookup_pace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            safety_ceiling: 10,
            lookup_pace: Duration::from_millis(500),
        }
    }
}
