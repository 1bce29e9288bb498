#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tug_audit::RetirementLedger;
use tug_engine::{EngineConfig, ReconcileEngine};
use tug_schemas::CleanupEvent;
use tug_testkit::{MemHistoryStore, MemRequestStore, ScriptedOracle};

pub struct Harness {
    pub oracle: Arc<ScriptedOracle>,
    pub requests: Arc<MemRequestStore>,
    pub history: Arc<MemHistoryStore>,
    pub engine: ReconcileEngine,
    pub events: broadcast::Receiver<CleanupEvent>,
}

/// Engine wired against the in-memory fakes with pacing disabled.
pub fn harness() -> Harness {
    harness_with(EngineConfig {
        safety_ceiling: 10,
        lookup_pace: Duration::ZERO,
    })
}

pub fn harness_with(cfg: EngineConfig) -> Harness {
    let oracle = Arc::new(ScriptedOracle::new());
    let requests = Arc::new(MemRequestStore::new());
    let history = Arc::new(MemHistoryStore::new());
    let (bus, events) = broadcast::channel(32);
    let engine = ReconcileEngine::new(
        oracle.clone(),
        requests.clone(),
        RetirementLedger::new(history.clone()),
        bus,
        cfg,
    );
    Harness {
        oracle,
        requests,
        history,
        engine,
        events,
    }
}
