//! Bounded retries for external calls
//!
//! Every call to the embedding provider or the similarity index goes through
//! [`with_retry`]: each attempt runs under `tokio::time::timeout`, only errors
//! that report themselves as retryable are retried, and the sleep between
//! attempts doubles (with jitter) up to a cap. A dead dependency therefore
//! costs at most `(max_retries + 1) * attempt_timeout` plus backoff.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::defaults::MAX_BACKOFF_MS;

/// Maximum backoff multiplier exponent (`2^6 = 64×` base backoff).
const MAX_BACKOFF_EXPONENT: u32 = 6;

/// Retry budget for one logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Upper bound for a single attempt
    pub attempt_timeout: Duration,
    /// Sleep before the first retry, doubled afterwards
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        crate::config::NetworkConfig::default().retry_policy()
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based), jitter included.
    fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let base_ms = u64::try_from(self.base_backoff.as_millis()).unwrap_or(MAX_BACKOFF_MS);
        let backoff_ms = base_ms.saturating_mul(1u64 << exp).min(MAX_BACKOFF_MS);
        let jitter_ms = if backoff_ms > 0 {
            rand::thread_rng().gen_range(0..=backoff_ms / 4)
        } else {
            0
        };
        Duration::from_millis(backoff_ms + jitter_ms)
    }
}

/// Errors that know whether another attempt could succeed.
pub trait Retryable: Sized {
    /// Transient failures (timeouts, refused connections, 429/5xx).
    fn is_retryable(&self) -> bool;

    /// Error produced when an attempt exceeds `attempt_timeout`.
    fn timed_out(after: Duration) -> Self;
}

/// Run `op` under `policy`, returning the first success or the last error.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut retry = 0u32;
    loop {
        let outcome = match tokio::time::timeout(policy.attempt_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(E::timed_out(policy.attempt_timeout)),
        };

        match outcome {
            Ok(value) => {
                if retry > 0 {
                    debug!(operation = label, retries = retry, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && retry < policy.max_retries => {
                retry += 1;
                let backoff = policy.backoff(retry);
                warn!(
                    operation = label,
                    error = %e,
                    attempt = retry,
                    max_retries = policy.max_retries,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    "External call failed, retrying"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Fatal,
        Timeout,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient | TestError::Timeout)
        }

        fn timed_out(_after: Duration) -> Self {
            TestError::Timeout
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            attempt_timeout: Duration::from_millis(50),
            base_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<u32, TestError> = with_retry(fast_policy(3), "test", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(TestError::Transient)
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), TestError> = with_retry(fast_policy(5), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Fatal)
        })
        .await;
        assert_eq!(result, Err(TestError::Fatal));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_is_finite() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), TestError> = with_retry(fast_policy(2), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError::Transient)
        })
        .await;
        assert_eq!(result, Err(TestError::Transient));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_hung_call_times_out() {
        let result: Result<(), TestError> = with_retry(fast_policy(1), "test", || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert_eq!(result, Err(TestError::Timeout));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            attempt_timeout: Duration::from_secs(1),
            base_backoff: Duration::from_secs(5),
        };
        let cap = Duration::from_millis(MAX_BACKOFF_MS + MAX_BACKOFF_MS / 4);
        assert!(policy.backoff(10) <= cap);
    }
}
