//! tug-oracle
//!
//! Boundary to the external system of record for container locations.
//!
//! This crate owns the oracle trait and the concrete ERP datasource client.
//! It does **not** touch storage; the engine consumes the trait and decides
//! what an unknown location means.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;
use tug_config::OracleConfig;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`LocationOracle`] implementation may return.
///
/// The engine treats every variant identically to "unknown" for per-item
/// lookups; only the production-set fetch propagates them as a pass abort.
#[derive(Debug)]
pub enum OracleError {
    /// Network or transport failure (includes timeouts).
    Transport(String),
    /// The upstream returned a non-success HTTP status.
    Api { status: u16, message: String },
    /// A response payload could not be decoded into the expected shape.
    Decode(String),
    /// A required configuration value is missing or invalid.
    Config(String),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::Transport(msg) => write!(f, "oracle transport error: {msg}"),
            OracleError::Api { status, message } => {
                write!(f, "oracle api error status={status}: {message}")
            }
            OracleError::Decode(msg) => write!(f, "oracle decode error: {msg}"),
            OracleError::Config(msg) => write!(f, "oracle config error: {msg}"),
        }
    }
}

impl std::error::Error for OracleError {}

// ---------------------------------------------------------------------------
// Oracle trait
// ---------------------------------------------------------------------------

/// External authoritative source for container locations.
///
/// Both operations are idempotent, side-effect-free reads with bounded
/// latency. Implementations must be object-safe (`Arc<dyn LocationOracle>`)
/// and `Send + Sync` for use across task boundaries.
#[async_trait]
pub trait LocationOracle: Send + Sync {
    /// Current location of the container with the given serial number, or
    /// `None` when the oracle does not know the container.
    async fn locate(&self, serial_no: &str) -> Result<Option<String>, OracleError>;

    /// The authoritative set of "in production" locations. Callers must
    /// re-fetch at the start of every pass; this set is never cached here.
    async fn production_locations(&self) -> Result<Vec<String>, OracleError>;
}

// ---------------------------------------------------------------------------
// ERP datasource client
// ---------------------------------------------------------------------------

/// Datasource id for the container-by-serial lookup.
const DS_CONTAINER_BY_SERIAL: u32 = 4619;
/// Datasource id for the production-location listing.
const DS_PROD_LOCATIONS: u32 = 18120;
/// Location-type filter the production-location datasource expects.
const PROD_LOCATION_TYPE: &str = "Production Storage_IN";

/// ERP-backed oracle speaking the datasource "execute" protocol: POST
/// `{base}/{datasource_id}/execute` with an `inputs` object, tabular reply.
///
/// Credentials are passed in by the caller and never logged.
#[derive(Clone)]
pub struct DatasourceOracle {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl DatasourceOracle {
    pub fn new(cfg: &OracleConfig) -> Result<Self, OracleError> {
        Self::new_with_base_url(cfg, cfg.api_base.clone())
    }

    /// Base-URL override seam for tests (httpmock).
    pub fn new_with_base_url(cfg: &OracleConfig, base_url: String) -> Result<Self, OracleError> {
        if cfg.username.is_empty() || cfg.password.is_empty() {
            return Err(OracleError::Config(
                "oracle credentials must be non-empty".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.read_timeout)
            .build()
            .map_err(|e| OracleError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url,
            username: cfg.username.clone(),
            password: cfg.password.clone(),
        })
    }

    fn execute_url(&self, datasource_id: u32) -> String {
        format!(
            "{}/{}/execute",
            self.base_url.trim_end_matches('/'),
            datasource_id
        )
    }

    async fn execute(
        &self,
        datasource_id: u32,
        inputs: serde_json::Value,
    ) -> Result<DatasourceTable, OracleError> {
        let resp = self
            .http
            .post(self.execute_url(datasource_id))
            .basic_auth(&self.username, Some(&self.password))
            .json(&serde_json::json!({ "inputs": inputs }))
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OracleError::Api {
                status: status.as_u16(),
                message: truncate(&body, 200),
            });
        }

        let body: DatasourceResponse = resp
            .json()
            .await
            .map_err(|e| OracleError::Decode(e.to_string()))?;

        body.tables
            .into_iter()
            .next()
            .ok_or_else(|| OracleError::Decode("response contains no tables".to_string()))
    }
}

#[async_trait]
impl LocationOracle for DatasourceOracle {
    async fn locate(&self, serial_no: &str) -> Result<Option<String>, OracleError> {
        let table = self
            .execute(
                DS_CONTAINER_BY_SERIAL,
                serde_json::json!({ "Serial_No": serial_no }),
            )
            .await?;

        match table.column_values("Location")?.into_iter().next() {
            Some(loc) if !loc.is_empty() => Ok(Some(loc)),
            _ => {
                warn!(serial_no, "container unknown to oracle");
                Ok(None)
            }
        }
    }

    async fn production_locations(&self) -> Result<Vec<String>, OracleError> {
        let table = self
            .execute(
                DS_PROD_LOCATIONS,
                serde_json::json!({ "Location_Type": PROD_LOCATION_TYPE }),
            )
            .await?;
        table.column_values("Location")
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DatasourceResponse {
    #[serde(default)]
    tables: Vec<DatasourceTable>,
}

/// One tabular result: parallel `columns` / `rows` arrays.
#[derive(Debug, Deserialize)]
struct DatasourceTable {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<serde_json::Value>>,
}

impl DatasourceTable {
    /// Extract one named column as strings, in row order. Non-string cells
    /// are stringified; nulls become empty strings.
    fn column_values(&self, name: &str) -> Result<Vec<String>, OracleError> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| OracleError::Decode(format!("missing column {name:?}")))?;

        Ok(self
            .rows
            .iter()
            .map(|row| match row.get(idx) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect()
    }
}
