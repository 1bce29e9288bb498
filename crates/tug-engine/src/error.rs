use std::fmt;

use tug_schemas::RemovedContainer;

/// Pass-level failures. Every variant aborts the scheduled pass with no
/// mutation; per-item failures are absorbed into the pass report instead
/// and never surface here.
#[derive(Debug)]
pub enum PassError {
    /// The production-set fetch failed at the transport or API level.
    OracleUnavailable(String),
    /// The production-set payload had an unexpected shape.
    MalformedOracleResponse(String),
    /// The oracle answered but reported zero production locations. Treated
    /// as unknown truth: the pass aborts with no mutation.
    EmptyProductionSet,
    /// The active-request listing could not be loaded.
    StorageUnavailable(String),
    /// Candidate count exceeded the configured ceiling; the retirement
    /// phase was aborted with zero deletions.
    SafetyAbort {
        candidate_count: usize,
        candidates: Vec<RemovedContainer>,
    },
}

impl fmt::Display for PassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassError::OracleUnavailable(msg) => {
                write!(f, "production location fetch failed: {msg}")
            }
            PassError::MalformedOracleResponse(msg) => {
                write!(f, "malformed production location response: {msg}")
            }
            PassError::EmptyProductionSet => {
                write!(f, "no production locations reported; aborting pass")
            }
            PassError::StorageUnavailable(msg) => {
                write!(f, "active request listing failed: {msg}")
            }
            PassError::SafetyAbort { candidate_count, .. } => {
                write!(
                    f,
                    "safety abort: {candidate_count} containers flagged for deletion \
                     exceeds the ceiling"
                )
            }
        }
    }
}

impl std::error::Error for PassError {}
