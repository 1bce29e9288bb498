use std::fmt;

/// Storage failure classification.
///
/// `Unavailable` means the store itself could not be reached (pool
/// exhaustion, connect/acquire failure); `Query` means the store answered
/// but the statement failed. Callers decide retryability — the engine
/// leaves state untouched on either variant.
#[derive(Debug)]
pub enum StoreError {
    Unavailable(String),
    Query(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "store unavailable: {msg}"),
            StoreError::Query(msg) => write!(f, "store query failed: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Unavailable(e.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}
