//! Retry loop with fixed or exponential backoff
//!
//! The operation receives the zero-based attempt index so callers can widen
//! their own budgets on later attempts; the browser tier uses it to give
//! its second session a longer wait.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How many times to retry and how long to pause in between
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Pause before the first retry
    pub base_delay_ms: u64,

    /// Ceiling for any single pause
    pub max_delay_ms: u64,

    /// Growth factor between consecutive pauses (1.0 keeps them fixed)
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::with_delays(2, 500, 10_000)
    }
}

impl RetryConfig {
    /// Doubling pauses starting at `base_delay_ms`, capped at `max_delay_ms`
    pub fn with_delays(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            backoff_multiplier: 2.0,
        }
    }

    /// Same pause before every retry
    pub fn fixed(max_retries: u32, delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            backoff_multiplier: 1.0,
        }
    }

    /// Pause before `attempt`; the first attempt never waits
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let Some(retry) = attempt.checked_sub(1) else {
            return Duration::ZERO;
        };
        let grown = self.base_delay_ms as f64 * self.backoff_multiplier.powi(retry as i32);
        Duration::from_millis((grown as u64).min(self.max_delay_ms))
    }
}

/// Run `operation` until it succeeds or the budget is spent, treating
/// every error as retryable
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    with_retry_if(config, operation, |_| true).await
}

/// Run `operation` until it succeeds, `should_retry` rejects an error, or
/// the budget is spent. The last error is returned as is.
///
/// ```no_run
/// use campwatch::utils::retry::{with_retry_if, RetryConfig};
///
/// # async fn demo() -> Result<(), String> {
/// let value = with_retry_if(
///     &RetryConfig::fixed(1, 1500),
///     |attempt| async move {
///         if attempt == 0 { Err("crashed".to_string()) } else { Ok(42) }
///     },
///     |e: &String| e.contains("crash"),
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn with_retry_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 0;
    loop {
        let pause = config.delay_before(attempt);
        if !pause.is_zero() {
            debug!(attempt, pause_ms = pause.as_millis() as u64, "Backing off");
            tokio::time::sleep(pause).await;
        }

        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !should_retry(&error) {
            debug!(attempt, error = %error, "Giving up on non-retryable error");
            return Err(error);
        }
        if attempt >= config.max_retries {
            warn!(attempts = attempt + 1, error = %error, "Retry budget exhausted");
            return Err(error);
        }
        warn!(attempt, max_retries = config.max_retries, error = %error, "Attempt failed");
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = with_retry(&RetryConfig::with_delays(3, 100, 1000), move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("503 Service Unavailable".to_string())
                } else {
                    Ok("<table>")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "<table>");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), String> = with_retry(&RetryConfig::fixed(2, 50), move |attempt| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("attempt {attempt} failed")) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "attempt 2 failed");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_predicate_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), String> = with_retry_if(
            &RetryConfig::fixed(3, 10),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("login required".to_string()) }
            },
            |e| !e.contains("login"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_index_passed_through() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        let result = with_retry(&RetryConfig::fixed(1, 1500), move |attempt| {
            log.lock().unwrap().push(attempt);
            async move {
                if attempt == 0 {
                    Err("session not created".to_string())
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_exponential_delays() {
        let config = RetryConfig::with_delays(5, 500, 3000);
        let delays: Vec<u64> = (0..5)
            .map(|n| config.delay_before(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![0, 500, 1000, 2000, 3000]);
    }

    #[test]
    fn test_fixed_delays() {
        let config = RetryConfig::fixed(1, 1500);
        assert_eq!(config.delay_before(0), Duration::ZERO);
        assert_eq!(config.delay_before(1), Duration::from_millis(1500));
        assert_eq!(config.delay_before(2), Duration::from_millis(1500));
    }
}
