//! Scenario: the happy path of one reconciliation pass.
//!
//! # Invariants under test
//! - A container observed in a production location is retired: history row
//!   first, then deleted from the active store, then reported.
//! - Containers elsewhere, or with no reported location, are untouched.
//! - A failed per-item lookup keeps the item and is reported as an error.
//! - A second pass over the already-reconciled state is a no-op.

mod common;

use tug_schemas::{CleanupEvent, FulfillmentType};
use tug_testkit::pickup;

#[tokio::test]
async fn arrived_container_is_retired_and_reported() {
    let mut h = common::harness();
    h.oracle.set_production_locations(&["PROD-A", "PROD-B"]);

    h.requests.seed(pickup("S1001"));
    h.oracle.set_location("S1001", "PROD-A");

    let report = h.engine.run_pass().await.unwrap();

    assert_eq!(report.checked_requests, 1);
    assert_eq!(report.candidate_count, 1);
    assert_eq!(report.removed.len(), 1);
    assert_eq!(report.removed[0].serial_no, "S1001");
    assert_eq!(report.removed[0].current_location, "PROD-A");
    assert!(report.errors.is_empty());

    assert!(!h.requests.contains_serial("S1001"));
    let rec = h.history.record_for_serial("S1001").unwrap();
    assert_eq!(rec.fulfillment_type, FulfillmentType::AutoCleanup);
    assert_eq!(rec.current_location, "PROD-A");

    match h.events.try_recv().unwrap() {
        CleanupEvent::AutoCleanupComplete {
            checked_requests,
            removed_containers,
            containers_removed,
            ..
        } => {
            assert_eq!(checked_requests, 1);
            assert_eq!(removed_containers, 1);
            assert_eq!(containers_removed[0].serial_no, "S1001");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn container_still_in_warehouse_is_kept() {
    let mut h = common::harness();
    h.oracle.set_production_locations(&["PROD-A"]);

    h.requests.seed(pickup("S2001"));
    h.oracle.set_location("S2001", "WH-1");

    let report = h.engine.run_pass().await.unwrap();

    assert_eq!(report.candidate_count, 0);
    assert!(report.removed.is_empty());
    assert!(h.requests.contains_serial("S2001"));
    assert!(h.history.records().is_empty());

    // A clean pass still completes and notifies.
    assert!(matches!(
        h.events.try_recv().unwrap(),
        CleanupEvent::AutoCleanupComplete { .. }
    ));
}

#[tokio::test]
async fn unknown_location_never_causes_deletion() {
    let h = common::harness();
    h.oracle.set_production_locations(&["PROD-A"]);

    // No scripted location for this serial: the oracle answers None.
    h.requests.seed(pickup("S3001"));

    let report = h.engine.run_pass().await.unwrap();

    assert_eq!(report.checked_requests, 1);
    assert!(report.removed.is_empty());
    assert!(report.errors.is_empty());
    assert!(h.requests.contains_serial("S3001"));
}

#[tokio::test]
async fn lookup_fault_keeps_item_and_surfaces_error() {
    let h = common::harness();
    h.oracle.set_production_locations(&["PROD-A"]);

    h.requests.seed(pickup("S4001"));
    h.requests.seed(pickup("S4002"));
    h.oracle.fail_serial("S4001");
    h.oracle.set_location("S4002", "PROD-A");

    let report = h.engine.run_pass().await.unwrap();

    // The fault is scoped to its item; the rest of the pass proceeds.
    assert!(h.requests.contains_serial("S4001"));
    assert!(!h.requests.contains_serial("S4002"));
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].contains("S4001"));
}

#[tokio::test]
async fn second_pass_over_reconciled_state_is_a_no_op() {
    let h = common::harness();
    h.oracle.set_production_locations(&["PROD-A"]);

    h.requests.seed(pickup("S5001"));
    h.oracle.set_location("S5001", "PROD-A");

    let first = h.engine.run_pass().await.unwrap();
    assert_eq!(first.removed.len(), 1);

    let second = h.engine.run_pass().await.unwrap();
    assert_eq!(second.checked_requests, 0);
    assert!(second.removed.is_empty());
    assert_eq!(h.history.records().len(), 1);
}
