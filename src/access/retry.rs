//! Retry policy: bounded attempts with a fixed delay.
//!
//! Every failure is treated as retryable, whatever its kind. The final
//! failure is surfaced wrapped in [`DataGateError::RetryExhausted`].

use std::future::Future;
use std::time::Duration;

use crate::config::DataGateConfig;
use crate::error::DataGateError;

/// Attempt budget and fixed inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

/// Per-invocation bookkeeping.
#[derive(Debug, Default)]
struct RetryState {
    attempt: u32,
    waited: Duration,
}

impl RetryPolicy {
    /// Creates a policy making at most `max_attempts` attempts.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::InvalidConfig`] if `max_attempts` is zero.
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, DataGateError> {
        if max_attempts == 0 {
            return Err(DataGateError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    /// A single attempt with no retry.
    #[must_use]
    pub const fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Builds the policy described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::InvalidConfig`] if the configured attempt
    /// count is zero.
    pub fn from_config(config: &DataGateConfig) -> Result<Self, DataGateError> {
        Self::new(config.retry_max_attempts, config.retry_delay())
    }

    /// Maximum attempts, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between consecutive attempts.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Invokes `op` until it succeeds or the attempt budget is spent.
    ///
    /// Waits [`RetryPolicy::delay`] between attempts, never after the last.
    ///
    /// # Errors
    ///
    /// Returns [`DataGateError::RetryExhausted`] wrapping the final failure.
    pub async fn run<F, Fut, T>(&self, mut op: F) -> Result<T, DataGateError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DataGateError>>,
    {
        let mut state = RetryState::default();
        loop {
            state.attempt += 1;
            match op().await {
                Ok(value) => {
                    if state.attempt > 1 {
                        tracing::info!(attempt = state.attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => {
                    tracing::warn!(
                        attempt = state.attempt,
                        max_attempts = self.max_attempts,
                        transient = err.is_transient(),
                        error = %err,
                        "operation failed"
                    );
                    if state.attempt >= self.max_attempts {
                        tracing::warn!(attempts = state.attempt, "all retry attempts failed");
                        return Err(DataGateError::RetryExhausted {
                            attempts: state.attempt,
                            waited: state.waited,
                            source: Box::new(err),
                        });
                    }
                    tracing::debug!(delay_ms = self.delay.as_millis(), "retrying");
                    tokio::time::sleep(self.delay).await;
                    state.waited += self.delay;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, one second apart.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Runs `op` under a one-off [`RetryPolicy`].
///
/// # Errors
///
/// Returns [`DataGateError::InvalidConfig`] if `max_attempts` is zero and
/// [`DataGateError::RetryExhausted`] if every attempt fails.
pub async fn with_retry<F, Fut, T>(
    op: F,
    max_attempts: u32,
    delay: Duration,
) -> Result<T, DataGateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DataGateError>>,
{
    RetryPolicy::new(max_attempts, delay)?.run(op).await
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    fn failing(n: u32) -> DataGateError {
        DataGateError::Connection(format!("attempt {n} failed"))
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_third_attempt_after_two_waits() {
        let delay = Duration::from_millis(500);
        let policy = assert_ok!(RetryPolicy::new(3, delay));
        let mut calls = 0u32;
        let start = Instant::now();

        let result = policy
            .run(|| {
                calls += 1;
                let n = calls;
                async move { if n < 3 { Err(failing(n)) } else { Ok(n) } }
            })
            .await;

        assert!(matches!(result, Ok(3)));
        assert_eq!(calls, 3);
        assert_eq!(start.elapsed(), delay * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_and_wraps_last_failure() {
        let delay = Duration::from_millis(200);
        let policy = assert_ok!(RetryPolicy::new(3, delay));
        let mut calls = 0u32;
        let start = Instant::now();

        let result: Result<(), _> = policy
            .run(|| {
                calls += 1;
                let n = calls;
                async move { Err(failing(n)) }
            })
            .await;

        assert_eq!(calls, 3);
        // Two waits, never a third.
        assert_eq!(start.elapsed(), delay * 2);
        let DataGateError::RetryExhausted {
            attempts,
            waited,
            source,
        } = assert_err!(result)
        else {
            panic!("expected RetryExhausted");
        };
        assert_eq!(attempts, 3);
        assert_eq!(waited, delay * 2);
        assert_eq!(source.to_string(), "connection error: attempt 3 failed");
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_never_waits() {
        let policy = RetryPolicy::single_attempt();
        let mut calls = 0u32;
        let start = Instant::now();

        let result: Result<(), _> = policy
            .run(|| {
                calls += 1;
                async { Err(DataGateError::Query("bad".into())) }
            })
            .await;

        assert_eq!(calls, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(
            result,
            Err(DataGateError::RetryExhausted { attempts: 1, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn first_success_short_circuits() {
        let mut calls = 0u32;
        let result = with_retry(
            || {
                calls += 1;
                async { Ok::<_, DataGateError>("done") }
            },
            5,
            Duration::from_secs(10),
        )
        .await;
        assert!(matches!(result, Ok("done")));
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_attempts_rejected() {
        assert!(matches!(
            RetryPolicy::new(0, Duration::ZERO),
            Err(DataGateError::InvalidConfig(_))
        ));
    }

    #[test]
    fn policy_from_config() {
        let config = DataGateConfig {
            retry_max_attempts: 4,
            retry_delay_ms: 50,
            ..DataGateConfig::default()
        };
        let Ok(policy) = RetryPolicy::from_config(&config) else {
            panic!("valid config");
        };
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay(), Duration::from_millis(50));
    }
}
