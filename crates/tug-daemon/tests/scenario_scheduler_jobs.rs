//! Scenario: the background jobs under virtual time.
//!
//! # Invariants under test
//! - The bootstrap pass runs once, after its delay, not at startup.
//! - The interval job runs one full interval after startup and repeats.
//! - A held guard makes a scheduled tick skip, never queue.
//! - The daily retention sweep purges history past the age cutoff.
//! - stop() drains and joins all jobs.

mod common;

use std::time::Duration;

use chrono::Utc;
use tug_daemon::scheduler::Scheduler;
use tug_schemas::{FulfillmentType, HistoryRecord, RequestType};
use tug_testkit::pickup;

fn no_retention_config(interval: Duration, bootstrap: Duration) -> tug_config::CleanupConfig {
    tug_config::CleanupConfig {
        interval,
        bootstrap_delay: bootstrap,
        // Keep the sweep far away so only the job under test fires.
        ..common::cleanup_config()
    }
}

#[tokio::test(start_paused = true)]
async fn bootstrap_pass_runs_after_its_delay() {
    let f = common::fixture_with(no_retention_config(
        Duration::from_secs(3600),
        Duration::from_secs(300),
    ));
    f.oracle.set_production_locations(&["PROD-A"]);
    f.requests.seed(pickup("S1001"));
    f.oracle.set_location("S1001", "PROD-A");

    let scheduler = Scheduler::start(f.state.clone());

    tokio::time::sleep(Duration::from_secs(299)).await;
    assert!(f.requests.contains_serial("S1001"));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!f.requests.contains_serial("S1001"));
    assert!(f.history.record_for_serial("S1001").is_some());

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn interval_job_fires_one_interval_after_startup_and_repeats() {
    let f = common::fixture_with(no_retention_config(
        Duration::from_secs(60),
        Duration::from_secs(86_400),
    ));
    f.oracle.set_production_locations(&["PROD-A"]);
    f.requests.seed(pickup("S2001"));
    f.oracle.set_location("S2001", "PROD-A");

    let scheduler = Scheduler::start(f.state.clone());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(f.requests.contains_serial("S2001"));

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(!f.requests.contains_serial("S2001"));

    // Later arrivals are caught by subsequent ticks.
    f.requests.seed(pickup("S2002"));
    f.oracle.set_location("S2002", "PROD-A");
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(!f.requests.contains_serial("S2002"));

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn held_guard_skips_the_tick_without_queueing() {
    let f = common::fixture_with(no_retention_config(
        Duration::from_secs(60),
        Duration::from_secs(86_400),
    ));
    f.oracle.set_production_locations(&["PROD-A"]);
    f.requests.seed(pickup("S3001"));
    f.oracle.set_location("S3001", "PROD-A");

    let scheduler = Scheduler::start(f.state.clone());

    let held = f.state.cleanup_guard.try_acquire().unwrap();
    tokio::time::sleep(Duration::from_secs(130)).await;
    // Two ticks elapsed under the held guard; neither ran.
    assert!(f.requests.contains_serial("S3001"));

    drop(held);
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(!f.requests.contains_serial("S3001"));

    scheduler.stop().await;
}

#[tokio::test(start_paused = true)]
async fn retention_sweep_purges_only_expired_history() {
    let f = common::fixture_with(tug_config::CleanupConfig {
        interval: Duration::from_secs(864_000),
        bootstrap_delay: Duration::from_secs(864_000),
        ..common::cleanup_config()
    });

    let old = history_record("S-OLD", Utc::now() - chrono::Duration::days(40));
    let recent = history_record("S-NEW", Utc::now() - chrono::Duration::days(10));
    f.history.append_directly(old);
    f.history.append_directly(recent);

    let scheduler = Scheduler::start(f.state.clone());

    // One virtual day covers whichever side of the sweep hour we started on.
    tokio::time::sleep(Duration::from_secs(25 * 3600)).await;

    assert!(f.history.record_for_serial("S-OLD").is_none());
    assert!(f.history.record_for_serial("S-NEW").is_some());

    scheduler.stop().await;
}

fn history_record(serial_no: &str, fulfilled_time: chrono::DateTime<Utc>) -> HistoryRecord {
    HistoryRecord {
        req_id: 1,
        serial_no: serial_no.to_string(),
        part_no: "P-100".to_string(),
        revision: "A".to_string(),
        quantity: 8.0,
        stored_location: "WH-1".to_string(),
        deliver_to: "WC-7".to_string(),
        req_time: fulfilled_time - chrono::Duration::minutes(30),
        fulfilled_time,
        duration_minutes: 30,
        fulfillment_type: FulfillmentType::AutoCleanup,
        current_location: "PROD-A".to_string(),
        master_unit_no: None,
        request_type: RequestType::PickUp,
    }
}
