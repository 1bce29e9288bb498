//! Background jobs: the interval reconciliation pass, the one-time
//! bootstrap pass, and the daily history retention sweep.
//!
//! All three tasks share the [`JobGuard`] with the manual-trigger endpoint,
//! so at most one cleanup pass runs at a time across every trigger. Shutdown
//! is cooperative: tasks observe the watch channel only between passes, so
//! an in-flight pass always drains before [`Scheduler::stop`] returns.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::state::{AppState, PassSummary};

pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the three background jobs.
    pub fn start(state: Arc<AppState>) -> Self {
        let (shutdown, _) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(interval_job(state.clone(), shutdown.subscribe())),
            tokio::spawn(bootstrap_job(state.clone(), shutdown.subscribe())),
            tokio::spawn(retention_job(state, shutdown.subscribe())),
        ];
        Self { shutdown, tasks }
    }

    /// Signal shutdown and wait for all jobs, draining any in-flight pass.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("scheduler stopped");
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

async fn interval_job(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(state.cleanup.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The interval fires immediately; consume that tick so the first
    // scheduled pass lands one full interval after startup. The bootstrap
    // job covers the early run.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        run_guarded_pass(&state, "scheduled").await;
    }
}

async fn bootstrap_job(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    tokio::select! {
        _ = tokio::time::sleep(state.cleanup.bootstrap_delay) => {}
        _ = shutdown.changed() => return,
    }
    info!("bootstrap reconciliation pass");
    run_guarded_pass(&state, "bootstrap").await;
}

async fn retention_job(state: Arc<AppState>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let wait = until_next_utc_hour(Utc::now(), state.cleanup.retention_sweep_hour);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => return,
        }
        match state.ledger.purge_older_than(state.cleanup.retention_days).await {
            Ok(purged) => info!(purged, "retention sweep complete"),
            Err(e) => error!(error = %e, "retention sweep failed"),
        }
    }
}

/// Run one pass under the shared guard. A held guard means another trigger
/// is mid-pass; this tick is skipped, not queued.
async fn run_guarded_pass(state: &AppState, trigger: &str) {
    let Some(_guard) = state.cleanup_guard.try_acquire() else {
        warn!(trigger, "cleanup pass already running, skipping");
        return;
    };

    let summary = match state.engine.run_pass().await {
        Ok(report) => PassSummary::from_report(&report),
        Err(e) => PassSummary::from_error(&e),
    };
    state.record_pass(summary).await;
}

/// Wall-clock delay until the next occurrence of `hour:00:00` UTC. When the
/// current time is already past today's occurrence, the next day's is used.
fn until_next_utc_hour(now: DateTime<Utc>, hour: u32) -> Duration {
    let Some(today) = now.date_naive().and_hms_opt(hour, 0, 0) else {
        // Hour is validated at config load; fall back to a day if not.
        return Duration::from_secs(24 * 3600);
    };
    let mut next = today.and_utc();
    if next <= now {
        next += chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or_default()
}
