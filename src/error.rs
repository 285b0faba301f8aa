//! Data-access error types.
//!
//! [`DataGateError`] is the single error type surfaced by every primitive in
//! this crate. Each variant carries a stable numeric code so callers can log
//! or map failures without matching on message text.

use std::time::Duration;

/// Error enum for every data-access primitive.
///
/// # Error Code Ranges
///
/// | Range     | Category       |
/// |-----------|----------------|
/// | 1000–1999 | Configuration  |
/// | 2000–2999 | Store / Query  |
/// | 3000–3999 | Recovery       |
#[derive(Debug, thiserror::Error)]
pub enum DataGateError {
    /// The store is unreachable or a handle is no longer valid.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store rejected a request (malformed SQL, constraint violation).
    #[error("query error: {0}")]
    Query(String),

    /// A column was missing from a row or held an incompatible value.
    #[error("cannot decode column `{column}`: {message}")]
    Decode {
        /// Column name that failed to decode.
        column: String,
        /// What went wrong.
        message: String,
    },

    /// Every attempt of a retried operation failed.
    #[error("retries exhausted after {attempts} attempt(s): {source}")]
    RetryExhausted {
        /// Number of attempts made, including the first.
        attempts: u32,
        /// Total time spent waiting between attempts.
        waited: Duration,
        /// The failure of the final attempt.
        #[source]
        source: Box<DataGateError>,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DataGateError {
    /// Maps a driver error raised while opening or closing a connection.
    #[must_use]
    pub fn connection(err: sqlx::Error) -> Self {
        Self::Connection(err.to_string())
    }

    /// Maps a driver error raised while running a statement.
    ///
    /// I/O and pool-level failures are still reported as
    /// [`DataGateError::Connection`]; everything else is a query failure.
    #[must_use]
    pub fn query(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed => Self::Connection(err.to_string()),
            other => Self::Query(other.to_string()),
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidConfig(_) => 1001,
            Self::Connection(_) => 2001,
            Self::Query(_) => 2002,
            Self::Decode { .. } => 2003,
            Self::RetryExhausted { .. } => 3001,
        }
    }

    /// Returns `true` if the failure looks like brief unavailability.
    ///
    /// Informational only: the retry policy retries every failure.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Query(msg) => {
                let msg = msg.to_ascii_lowercase();
                msg.contains("locked") || msg.contains("busy")
            }
            Self::RetryExhausted { source, .. } => source.is_transient(),
            Self::Decode { .. } | Self::InvalidConfig(_) => false,
        }
    }

    /// Returns the innermost failure, unwrapping any retry wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::RetryExhausted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
