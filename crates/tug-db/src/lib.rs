//! tug-db
//!
//! Store traits and their Postgres implementations.
//!
//! The traits are the seams the engine is tested against (tug-testkit holds
//! in-memory fakes); the `Pg*` types are the production path. Schema lives
//! in `./migrations` and is applied with [`migrate`] at daemon startup.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::{info, warn};
use tug_config::DbConfig;
use tug_schemas::{ActiveRequest, HistoryRecord, NewActiveRequest, RequestType};

mod error;
pub use error::StoreError;

// ---------------------------------------------------------------------------
// Store traits
// ---------------------------------------------------------------------------

/// Mutable table of outstanding pickup/put-back records.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// All active requests, ordered by `req_time` descending. Ordering
    /// affects only reporting, not engine correctness.
    async fn list_active(&self) -> Result<Vec<ActiveRequest>, StoreError>;

    /// Insert a submission; the store assigns and returns the id from its
    /// identity sequence (ids are never reused).
    async fn insert(&self, req: &NewActiveRequest) -> Result<i64, StoreError>;

    async fn find_by_serial(&self, serial_no: &str) -> Result<Option<ActiveRequest>, StoreError>;

    /// Idempotent: deleting an already-absent id is not an error.
    async fn delete_by_id(&self, req_id: i64) -> Result<(), StoreError>;
}

/// Append-only log of retired records plus the retention sweep.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// All-or-nothing append; failure must not partially apply.
    async fn append(&self, record: &HistoryRecord) -> Result<(), StoreError>;

    /// Delete records with `fulfilled_time` older than the cutoff; returns
    /// the count purged.
    async fn purge_older_than(&self, retention_days: i64) -> Result<u64, StoreError>;
}

// ---------------------------------------------------------------------------
// Pool setup
// ---------------------------------------------------------------------------

/// Connect to Postgres with bounded pool size and capped-backoff retry.
///
/// Store initialization is the one fatal point of the process: callers
/// propagate this error and exit rather than serving without storage.
pub async fn connect(cfg: &DbConfig) -> Result<PgPool, StoreError> {
    const MAX_ATTEMPTS: u32 = 3;

    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = PgPoolOptions::new()
            .min_connections(cfg.pool_min_size)
            .max_connections(cfg.pool_max_size)
            .acquire_timeout(cfg.acquire_timeout)
            .connect(&cfg.url)
            .await;

        match result {
            Ok(pool) => {
                info!(attempt, "database pool created");
                return Ok(pool);
            }
            Err(e) if attempt < MAX_ATTEMPTS => {
                // Capped exponential backoff: 100ms, 200ms.
                let backoff = Duration::from_millis(100 * u64::from(attempt));
                warn!(attempt, error = %e, "database connect failed, retrying");
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(StoreError::Unavailable(e.to_string())),
        }
    }
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Unavailable(format!("db migrate failed: {e}")))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// PgRequestStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const REQUEST_COLUMNS: &str = "req_id, serial_no, part_no, revision, quantity, \
     stored_location, deliver_to, req_time, master_unit_no, request_type";

fn request_from_row(row: &sqlx::postgres::PgRow) -> Result<ActiveRequest, StoreError> {
    let type_raw: String = row.try_get("request_type")?;
    let request_type = RequestType::parse(&type_raw)
        .ok_or_else(|| StoreError::Query(format!("invalid request_type in row: {type_raw:?}")))?;

    Ok(ActiveRequest {
        req_id: row.try_get("req_id")?,
        serial_no: row.try_get("serial_no")?,
        part_no: row.try_get("part_no")?,
        revision: row.try_get("revision")?,
        quantity: row.try_get("quantity")?,
        stored_location: row.try_get("stored_location")?,
        deliver_to: row.try_get("deliver_to")?,
        req_time: row.try_get("req_time")?,
        master_unit_no: row.try_get("master_unit_no")?,
        request_type,
    })
}

#[async_trait]
impl RequestStore for PgRequestStore {
    async fn list_active(&self) -> Result<Vec<ActiveRequest>, StoreError> {
        let rows = sqlx::query(&format!(
            "select {REQUEST_COLUMNS} from requests order by req_time desc"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(request_from_row).collect()
    }

    async fn insert(&self, req: &NewActiveRequest) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            insert into requests (
              serial_no, part_no, revision, quantity, stored_location,
              deliver_to, req_time, master_unit_no, request_type
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            returning req_id
            "#,
        )
        .bind(&req.serial_no)
        .bind(&req.part_no)
        .bind(&req.revision)
        .bind(req.quantity)
        .bind(&req.stored_location)
        .bind(&req.deliver_to)
        .bind(req.req_time)
        .bind(&req.master_unit_no)
        .bind(req.request_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("req_id")?)
    }

    async fn find_by_serial(&self, serial_no: &str) -> Result<Option<ActiveRequest>, StoreError> {
        let row = sqlx::query(&format!(
            "select {REQUEST_COLUMNS} from requests where serial_no = $1"
        ))
        .bind(serial_no)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(request_from_row).transpose()
    }

    async fn delete_by_id(&self, req_id: i64) -> Result<(), StoreError> {
        sqlx::query("delete from requests where req_id = $1")
            .bind(req_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PgHistoryStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(&self, record: &HistoryRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            insert into requests_history (
              req_id, serial_no, part_no, revision, quantity, stored_location,
              deliver_to, req_time, fulfilled_time, duration_minutes,
              fulfillment_type, current_location, master_unit_no, request_type
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.req_id)
        .bind(&record.serial_no)
        .bind(&record.part_no)
        .bind(&record.revision)
        .bind(record.quantity)
        .bind(&record.stored_location)
        .bind(&record.deliver_to)
        .bind(record.req_time)
        .bind(record.fulfilled_time)
        .bind(record.duration_minutes)
        .bind(record.fulfillment_type.as_str())
        .bind(&record.current_location)
        .bind(&record.master_unit_no)
        .bind(record.request_type.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn purge_older_than(&self, retention_days: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "delete from requests_history \
             where fulfilled_time < now() - make_interval(days => $1::int)",
        )
        .bind(retention_days)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
