//! tug-testkit
//!
//! In-process fakes for the engine's collaborator seams: a scripted oracle
//! and in-memory request/history stores with fault injection. Scenario
//! tests across the workspace compose these instead of touching Postgres or
//! the network.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tug_db::{HistoryStore, RequestStore, StoreError};
use tug_oracle::{LocationOracle, OracleError};
use tug_schemas::{ActiveRequest, HistoryRecord, NewActiveRequest, RequestType};

// ---------------------------------------------------------------------------
// ScriptedOracle
// ---------------------------------------------------------------------------

/// Oracle fake with per-serial scripted locations and fault injection.
#[derive(Default)]
pub struct ScriptedOracle {
    locations: Mutex<HashMap<String, String>>,
    production: Mutex<Vec<String>>,
    failing_serials: Mutex<HashSet<String>>,
    fail_production_fetch: AtomicBool,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_location(&self, serial_no: &str, location: &str) {
        self.locations
            .lock()
            .unwrap()
            .insert(serial_no.to_string(), location.to_string());
    }

    pub fn clear_location(&self, serial_no: &str) {
        self.locations.lock().unwrap().remove(serial_no);
    }

    pub fn set_production_locations(&self, locations: &[&str]) {
        *self.production.lock().unwrap() =
            locations.iter().map(|s| s.to_string()).collect();
    }

    /// Make `locate` fail with a transport error for one serial.
    pub fn fail_serial(&self, serial_no: &str) {
        self.failing_serials
            .lock()
            .unwrap()
            .insert(serial_no.to_string());
    }

    /// Make the production-set fetch fail with a transport error.
    pub fn fail_production_fetch(&self, fail: bool) {
        self.fail_production_fetch.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocationOracle for ScriptedOracle {
    async fn locate(&self, serial_no: &str) -> Result<Option<String>, OracleError> {
        if self.failing_serials.lock().unwrap().contains(serial_no) {
            return Err(OracleError::Transport(format!(
                "injected fault for {serial_no}"
            )));
        }
        Ok(self.locations.lock().unwrap().get(serial_no).cloned())
    }

    async fn production_locations(&self) -> Result<Vec<String>, OracleError> {
        if self.fail_production_fetch.load(Ordering::SeqCst) {
            return Err(OracleError::Transport(
                "injected production-set fault".to_string(),
            ));
        }
        Ok(self.production.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// MemRequestStore
// ---------------------------------------------------------------------------

/// In-memory active-request table with identity-style id assignment.
#[derive(Default)]
pub struct MemRequestStore {
    rows: Mutex<Vec<ActiveRequest>>,
    next_id: AtomicI64,
}

impl MemRequestStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Seed one request directly, returning its assigned id.
    pub fn seed(&self, req: NewActiveRequest) -> i64 {
        let req_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().push(ActiveRequest {
            req_id,
            serial_no: req.serial_no,
            part_no: req.part_no,
            revision: req.revision,
            quantity: req.quantity,
            stored_location: req.stored_location,
            deliver_to: req.deliver_to,
            req_time: req.req_time,
            master_unit_no: req.master_unit_no,
            request_type: req.request_type,
        });
        req_id
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_serial(&self, serial_no: &str) -> bool {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.serial_no == serial_no)
    }
}

#[async_trait]
impl RequestStore for MemRequestStore {
    async fn list_active(&self) -> Result<Vec<ActiveRequest>, StoreError> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| b.req_time.cmp(&a.req_time));
        Ok(rows)
    }

    async fn insert(&self, req: &NewActiveRequest) -> Result<i64, StoreError> {
        Ok(self.seed(req.clone()))
    }

    async fn find_by_serial(&self, serial_no: &str) -> Result<Option<ActiveRequest>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.serial_no == serial_no)
            .cloned())
    }

    async fn delete_by_id(&self, req_id: i64) -> Result<(), StoreError> {
        self.rows.lock().unwrap().retain(|r| r.req_id != req_id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemHistoryStore
// ---------------------------------------------------------------------------

/// In-memory append-only history with per-serial append fault injection.
#[derive(Default)]
pub struct MemHistoryStore {
    records: Mutex<Vec<HistoryRecord>>,
    failing_serials: Mutex<HashSet<String>>,
    fail_all_appends: AtomicBool,
}

impl MemHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make appends for one serial fail (simulated storage fault).
    pub fn fail_appends_for(&self, serial_no: &str) {
        self.failing_serials
            .lock()
            .unwrap()
            .insert(serial_no.to_string());
    }

    pub fn fail_all_appends(&self, fail: bool) {
        self.fail_all_appends.store(fail, Ordering::SeqCst);
    }

    /// Seed one record directly, bypassing fault injection.
    pub fn append_directly(&self, record: HistoryRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn records(&self) -> Vec<HistoryRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn record_for_serial(&self, serial_no: &str) -> Option<HistoryRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.serial_no == serial_no)
            .cloned()
    }
}

#[async_trait]
impl HistoryStore for MemHistoryStore {
    async fn append(&self, record: &HistoryRecord) -> Result<(), StoreError> {
        if self.fail_all_appends.load(Ordering::SeqCst)
            || self
                .failing_serials
                .lock()
                .unwrap()
                .contains(&record.serial_no)
        {
            return Err(StoreError::Unavailable(format!(
                "injected append fault for {}",
                record.serial_no
            )));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn purge_older_than(&self, retention_days: i64) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - Duration::days(retention_days);
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.fulfilled_time >= cutoff);
        Ok((before - records.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A pickup submission with sensible defaults for scenario tests.
pub fn pickup(serial_no: &str) -> NewActiveRequest {
    NewActiveRequest {
        serial_no: serial_no.to_string(),
        part_no: "P-100".to_string(),
        revision: "A".to_string(),
        quantity: 8.0,
        stored_location: "WH-1".to_string(),
        deliver_to: "WC-7".to_string(),
        req_time: Utc::now() - Duration::minutes(30),
        master_unit_no: None,
        request_type: RequestType::PickUp,
    }
}

/// A put-back submission (exempt from automatic retirement).
pub fn put_back(serial_no: &str) -> NewActiveRequest {
    NewActiveRequest {
        request_type: RequestType::PutBack,
        ..pickup(serial_no)
    }
}
