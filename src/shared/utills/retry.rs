//! Retry with a fixed delay
//!
//! Generic retry helper for transient failures of outbound calls
//! (payment session creation, status polling). Only errors the
//! `should_retry` closure accepts are retried; everything else bails
//! on the first attempt.

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt (so `max_retries + 1` calls at most).
    pub max_retries: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// No retries, no delay.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

/// Execute an async operation, retrying with a fixed delay.
///
/// # Example
/// ```ignore
/// let session = retry_with_delay(
///     &RetryConfig::default(),
///     || gateway.create_transaction(&booking),
///     GatewayError::is_retryable,
///     "create_transaction",
/// ).await?;
/// ```
pub async fn retry_with_delay<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
    operation_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = config.max_retries + 1;
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt >= max_attempts || !should_retry(&err) {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts,
                        error = %err,
                        "Operation failed permanently"
                    );
                    return Err(err);
                }

                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %err,
                    retry_in_ms = config.retry_delay.as_millis() as u64,
                    "Transient failure, retrying"
                );

                tokio::time::sleep(config.retry_delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum TestErr {
        Transient,
        Permanent,
    }

    impl std::fmt::Display for TestErr {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    fn quick(max_retries: u32) -> RetryConfig {
        RetryConfig::new(max_retries, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, TestErr> = retry_with_delay(
            &quick(3),
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(TestErr::Transient)
                } else {
                    Ok(n)
                }
            },
            |e| matches!(e, TestErr::Transient),
            "test",
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestErr> = retry_with_delay(
            &quick(5),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestErr::Permanent)
            },
            |e| matches!(e, TestErr::Transient),
            "test",
        )
        .await;

        assert!(matches!(result, Err(TestErr::Permanent)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestErr> = retry_with_delay(
            &quick(2),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestErr::Transient)
            },
            |_| true,
            "test",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let calls = AtomicU32::new(0);
        let _: Result<(), TestErr> = retry_with_delay(
            &RetryConfig::none(),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestErr::Transient)
            },
            |_| true,
            "test",
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
