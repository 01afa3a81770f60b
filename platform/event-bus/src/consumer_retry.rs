//! Bounded retry with exponential backoff
//!
//! Two users share one [`RetryConfig`]:
//! - the agent runtime, which caps how many times a failing delivery is
//!   requeued and how long the broker holds each redelivery back
//! - publishers, which retry a transient broker error in-process via
//!   [`retry_with_backoff`]

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (deliveries, for the runtime)
    pub max_attempts: u32,
    /// Backoff after the first failure (doubles on each retry)
    pub initial_backoff: Duration,
    /// Cap on exponential growth
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Backoff to apply after the given failed attempt (1-based)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let scaled = self.initial_backoff.saturating_mul(1u32 << exponent);
        scaled.min(self.max_backoff)
    }

    /// True once `attempt` has used up the budget
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

/// Run `operation` until it succeeds or `config.max_attempts` is spent,
/// sleeping [`RetryConfig::backoff_for`] between tries.
///
/// The last error is returned unchanged; `context` only labels the log lines.
///
/// ```rust
/// use event_bus::consumer_retry::{retry_with_backoff, RetryConfig};
///
/// # async fn demo() -> Result<(), String> {
/// let value = retry_with_backoff(
///     || async { Ok::<_, String>(7) },
///     &RetryConfig::default(),
///     "demo",
/// )
/// .await?;
/// assert_eq!(value, 7);
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation: F,
    config: &RetryConfig,
    context: &str,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display + Send,
{
    let mut attempt: u32 = 1;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(%context, attempt, "recovered on retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if config.is_exhausted(attempt) {
            warn!(%context, attempts = attempt, error = %err, "giving up");
            return Err(err);
        }

        let delay = config.backoff_for(attempt);
        warn!(
            %context,
            attempt,
            max_attempts = config.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "attempt failed, backing off"
        );
        sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = fast_config(10);

        assert_eq!(config.backoff_for(1), Duration::from_millis(10));
        assert_eq!(config.backoff_for(2), Duration::from_millis(20));
        assert_eq!(config.backoff_for(3), Duration::from_millis(40));
        assert_eq!(config.backoff_for(4), Duration::from_millis(50));
        assert_eq!(config.backoff_for(40), Duration::from_millis(50));
    }

    #[test]
    fn test_backoff_for_attempt_zero_is_initial() {
        let config = fast_config(3);
        assert_eq!(config.backoff_for(0), Duration::from_millis(10));
    }

    #[test]
    fn test_is_exhausted() {
        let config = fast_config(3);
        assert!(!config.is_exhausted(1));
        assert!(!config.is_exhausted(2));
        assert!(config.is_exhausted(3));
        assert!(config.is_exhausted(7));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = retry_with_backoff(
            || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(format!("broker busy ({n})"))
                    } else {
                        Ok(n)
                    }
                }
            },
            &fast_config(5),
            "test_operation",
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = retry_with_backoff(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("connection reset")
                }
            },
            &fast_config(2),
            "test_operation",
        )
        .await;

        assert_eq!(result, Err("connection reset"));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
