//! Data-access configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Unparseable values fall back to their
//! defaults; values that parse but are out of range are rejected.

use std::time::Duration;

use crate::error::DataGateError;

/// Top-level data-access configuration.
///
/// Loaded once at startup via [`DataGateConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataGateConfig {
    /// SQLite connection URL (e.g. `sqlite://users.db`). Must name a file:
    /// each connection scope opens its own connection, so an in-memory
    /// database would start empty every time and is rejected.
    pub database_url: String,

    /// Create the database file on first connect if it does not exist.
    pub create_if_missing: bool,

    /// How long a connection waits on a locked database before failing.
    pub busy_timeout_ms: u64,

    /// Attempts per retried operation, including the first. Must be >= 1.
    pub retry_max_attempts: u32,

    /// Fixed delay between retry attempts, in milliseconds.
    pub retry_delay_ms: u64,

    /// Rows per batch for the batch and page streams. Must be >= 1.
    pub batch_size: u64,

    /// Log the text and parameters of every statement.
    pub log_queries: bool,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,
}

impl Default for DataGateConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://users.db".to_string(),
            create_if_missing: true,
            busy_timeout_ms: 5_000,
            retry_max_attempts: 3,
            retry_delay_ms: 1_000,
            batch_size: 100,
            log_queries: false,
            log_json: false,
        }
    }
}

impl DataGateConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to [`DataGateConfig::default`] for every variable that is
    /// not set. Calls `dotenvy::dotenv().ok()` to optionally load a `.env`
    /// file.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::InvalidConfig`] if
    /// `DATAGATE_RETRY_MAX_ATTEMPTS` or `DATAGATE_BATCH_SIZE` is zero.
    pub fn from_env() -> Result<Self, DataGateError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`DataGateConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DataGateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            create_if_missing: parse_bool(
                lookup("DATAGATE_CREATE_IF_MISSING"),
                defaults.create_if_missing,
            ),
            busy_timeout_ms: parse_or(lookup("DATAGATE_BUSY_TIMEOUT_MS"), defaults.busy_timeout_ms),
            retry_max_attempts: parse_or(
                lookup("DATAGATE_RETRY_MAX_ATTEMPTS"),
                defaults.retry_max_attempts,
            ),
            retry_delay_ms: parse_or(lookup("DATAGATE_RETRY_DELAY_MS"), defaults.retry_delay_ms),
            batch_size: parse_or(lookup("DATAGATE_BATCH_SIZE"), defaults.batch_size),
            log_queries: parse_bool(lookup("DATAGATE_LOG_QUERIES"), defaults.log_queries),
            log_json: lookup("DATAGATE_LOG_FORMAT")
                .is_some_and(|v| v.eq_ignore_ascii_case("json")),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the values that have a lower bound.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::InvalidConfig`] naming the offending value.
    pub fn validate(&self) -> Result<(), DataGateError> {
        if self.retry_max_attempts == 0 {
            return Err(DataGateError::InvalidConfig(
                "retry_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(DataGateError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Delay between retry attempts.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Parses `raw` as `T`, returning `default` on missing or invalid values.
fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Parses a boolean. Accepts `"true"`, `"1"`, `"false"`, `"0"`
/// (case-insensitive). Returns `default` otherwise.
fn parse_bool(raw: Option<String>, default: bool) -> bool {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<DataGateConfig, DataGateError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        DataGateConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let Ok(config) = load(&[]) else {
            panic!("defaults are valid");
        };
        assert_eq!(config, DataGateConfig::default());
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
    }

    #[test]
    fn overrides_are_applied() {
        let Ok(config) = load(&[
            ("DATABASE_URL", "sqlite://other.db"),
            ("DATAGATE_RETRY_MAX_ATTEMPTS", "5"),
            ("DATAGATE_RETRY_DELAY_MS", "250"),
            ("DATAGATE_BATCH_SIZE", "10"),
            ("DATAGATE_LOG_QUERIES", "TRUE"),
            ("DATAGATE_CREATE_IF_MISSING", "0"),
            ("DATAGATE_LOG_FORMAT", "json"),
        ]) else {
            panic!("valid overrides");
        };
        assert_eq!(config.database_url, "sqlite://other.db");
        assert_eq!(config.retry_max_attempts, 5);
        assert_eq!(config.retry_delay(), Duration::from_millis(250));
        assert_eq!(config.batch_size, 10);
        assert!(config.log_queries);
        assert!(!config.create_if_missing);
        assert!(config.log_json);
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let Ok(config) = load(&[("DATAGATE_BATCH_SIZE", "lots"), ("DATAGATE_LOG_QUERIES", "maybe")])
        else {
            panic!("garbage falls back");
        };
        assert_eq!(config.batch_size, 100);
        assert!(!config.log_queries);
    }

    #[test]
    fn zero_attempts_rejected() {
        let result = load(&[("DATAGATE_RETRY_MAX_ATTEMPTS", "0")]);
        assert!(matches!(result, Err(DataGateError::InvalidConfig(_))));
    }

    #[test]
    fn zero_batch_size_rejected() {
        let result = load(&[("DATAGATE_BATCH_SIZE", "0")]);
        assert!(matches!(result, Err(DataGateError::InvalidConfig(_))));
    }
}
