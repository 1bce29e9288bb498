//! tug-config
//!
//! Environment-driven configuration for the tugline daemon. All knobs are
//! read once at startup; nothing here performs I/O beyond `std::env`.
//!
//! Secrets (ERP password, database URL) are held as plain strings but must
//! never be logged; `Config` intentionally does not derive `Debug`.

use anyhow::{anyhow, bail, Context, Result};
use std::time::Duration;

pub const ENV_DB_URL: &str = "TUG_DATABASE_URL";
pub const ENV_ERP_API_BASE: &str = "TUG_ERP_API_BASE";
pub const ENV_ERP_USERNAME: &str = "TUG_ERP_USERNAME";
pub const ENV_ERP_PASSWORD: &str = "TUG_ERP_PASSWORD";

/// Database pool and timeout settings.
#[derive(Clone)]
#[cfg_attr(test, derive(Debug))]
pub struct DbConfig {
    pub url: String,
    pub pool_min_size: u32,
    pub pool_max_size: u32,
    pub acquire_timeout: Duration,
}

/// Location-oracle client settings.
#[derive(Clone)]
#[cfg_attr(test, derive(Debug))]
pub struct OracleConfig {
    pub api_base: String,
    pub username: String,
    pub password: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

/// Reconciliation and retention scheduling settings.
#[derive(Clone, Copy)]
#[cfg_attr(test, derive(Debug))]
pub struct CleanupConfig {
    /// Fixed interval between scheduled reconciliation passes.
    pub interval: Duration,
    /// Delay before the one-time bootstrap pass after process start.
    pub bootstrap_delay: Duration,
    /// Maximum candidates per pass before the retirement phase aborts.
    pub safety_ceiling: usize,
    /// Pacing delay between successive oracle lookups within a pass.
    pub lookup_pace: Duration,
    /// Age cutoff for the history retention sweep.
    pub retention_days: i64,
    /// UTC wall-clock hour at which the daily retention sweep runs.
    pub retention_sweep_hour: u32,
}

#[derive(Clone)]
#[cfg_attr(test, derive(Debug))]
pub struct Config {
    pub db: DbConfig,
    pub oracle: OracleConfig,
    pub cleanup: CleanupConfig,
    /// Daemon bind address, e.g. "127.0.0.1:8090".
    pub bind_addr: String,
}

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup. Tests pass a
    /// closure over a map instead of mutating the process environment.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            get(key).ok_or_else(|| anyhow!("missing required env var {key}"))
        };

        let db = DbConfig {
            url: required(ENV_DB_URL)?,
            pool_min_size: parse_or(&get, "TUG_DB_POOL_MIN_SIZE", 5)?,
            pool_max_size: parse_or(&get, "TUG_DB_POOL_MAX_SIZE", 25)?,
            acquire_timeout: Duration::from_secs(parse_or(
                &get,
                "TUG_DB_ACQUIRE_TIMEOUT_SECS",
                30,
            )?),
        };

        let oracle = OracleConfig {
            api_base: required(ENV_ERP_API_BASE)?,
            username: required(ENV_ERP_USERNAME)?,
            password: required(ENV_ERP_PASSWORD)?,
            connect_timeout: Duration::from_secs(parse_or(
                &get,
                "TUG_HTTP_CONNECT_TIMEOUT_SECS",
                10,
            )?),
            read_timeout: Duration::from_secs(parse_or(&get, "TUG_HTTP_READ_TIMEOUT_SECS", 60)?),
        };

        let cleanup = CleanupConfig {
            interval: Duration::from_secs(parse_or(&get, "TUG_CLEANUP_INTERVAL_SECS", 60)?),
            bootstrap_delay: Duration::from_secs(parse_or(
                &get,
                "TUG_CLEANUP_BOOTSTRAP_DELAY_SECS",
                300,
            )?),
            safety_ceiling: parse_or(&get, "TUG_CLEANUP_SAFETY_LIMIT", 10)?,
            lookup_pace: Duration::from_millis(parse_or(&get, "TUG_LOOKUP_PACE_MS", 500)?),
            retention_days: parse_or(&get, "TUG_HISTORY_RETENTION_DAYS", 30)?,
            retention_sweep_hour: parse_or(&get, "TUG_RETENTION_SWEEP_HOUR", 2)?,
        };

        let bind_addr = get("TUG_DAEMON_ADDR").unwrap_or_else(|| "127.0.0.1:8090".to_string());

        let cfg = Self {
            db,
            oracle,
            cleanup,
            bind_addr,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.db.pool_max_size < self.db.pool_min_size {
            bail!(
                "TUG_DB_POOL_MAX_SIZE ({}) must be >= TUG_DB_POOL_MIN_SIZE ({})",
                self.db.pool_max_size,
                self.db.pool_min_size
            );
        }
        if self.cleanup.interval.is_zero() {
            bail!("TUG_CLEANUP_INTERVAL_SECS must be > 0");
        }
        if self.cleanup.safety_ceiling == 0 {
            bail!("TUG_CLEANUP_SAFETY_LIMIT must be > 0");
        }
        if self.cleanup.retention_days <= 0 {
            bail!("TUG_HISTORY_RETENTION_DAYS must be > 0");
        }
        if self.cleanup.retention_sweep_hour > 23 {
            bail!("TUG_RETENTION_SWEEP_HOUR must be 0..=23");
        }
        Ok(())
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (ENV_DB_URL, "postgres://localhost/tugline"),
            (ENV_ERP_API_BASE, "https://erp.example.com/api/datasources/"),
            (ENV_ERP_USERNAME, "ws-user"),
            (ENV_ERP_PASSWORD, "ws-pass"),
        ])
    }

    fn lookup<'a>(map: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |k| map.get(k).map(|v| v.to_string())
    }

    #[test]
    fn defaults_apply_when_only_required_vars_present() {
        let env = base_env();
        let cfg = Config::from_lookup(lookup(&env)).unwrap();
        assert_eq!(cfg.cleanup.interval, Duration::from_secs(60));
        assert_eq!(cfg.cleanup.bootstrap_delay, Duration::from_secs(300));
        assert_eq!(cfg.cleanup.safety_ceiling, 10);
        assert_eq!(cfg.cleanup.lookup_pace, Duration::from_millis(500));
        assert_eq!(cfg.cleanup.retention_days, 30);
        assert_eq!(cfg.cleanup.retention_sweep_hour, 2);
        assert_eq!(cfg.db.pool_min_size, 5);
        assert_eq!(cfg.db.pool_max_size, 25);
    }

    #[test]
    fn missing_required_var_is_an_error() {
        let mut env = base_env();
        env.remove(ENV_DB_URL);
        let err = Config::from_lookup(lookup(&env)).unwrap_err();
        assert!(err.to_string().contains(ENV_DB_URL));
    }

    #[test]
    fn pool_max_below_min_rejected() {
        let mut env = base_env();
        env.insert("TUG_DB_POOL_MIN_SIZE", "10");
        env.insert("TUG_DB_POOL_MAX_SIZE", "2");
        assert!(Config::from_lookup(lookup(&env)).is_err());
    }

    #[test]
    fn malformed_number_rejected_with_key_in_message() {
        let mut env = base_env();
        env.insert("TUG_CLEANUP_SAFETY_LIMIT", "ten");
        let err = Config::from_lookup(lookup(&env)).unwrap_err();
        assert!(err.to_string().contains("TUG_CLEANUP_SAFETY_LIMIT"));
    }

    #[test]
    fn sweep_hour_out_of_range_rejected() {
        let mut env = base_env();
        env.insert("TUG_RETENTION_SWEEP_HOUR", "24");
        assert!(Config::from_lookup(lookup(&env)).is_err());
    }
}
