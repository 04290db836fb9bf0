//! Bounded exponential backoff
//! Only errors that say they are transient get another attempt

use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::api::ApiError;
use crate::trading::TradingError;

/// Errors that know whether retrying could help
pub trait Retryable: std::fmt::Display {
    fn should_retry(&self) -> bool;
}

impl Retryable for ApiError {
    fn should_retry(&self) -> bool {
        self.is_transient()
    }
}

impl Retryable for TradingError {
    fn should_retry(&self) -> bool {
        self.is_retryable()
    }
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            ..Self::default()
        }
    }

    /// Single attempt
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        delay.mul_f64(self.backoff_multiplier).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails permanently, or retries run out
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable,
{
    let mut delay = config.initial_delay;
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        if !err.should_retry() {
            warn!("{} failed permanently: {}", operation_name, err);
            return Err(err);
        }
        if attempt >= config.max_retries {
            error!(
                "{} failed after {} attempts: {}",
                operation_name,
                attempt + 1,
                err
            );
            return Err(err);
        }

        attempt += 1;
        warn!(
            "{} failed (attempt {}/{}), retrying in {:?}: {}",
            operation_name,
            attempt,
            config.max_retries + 1,
            delay,
            err
        );
        tokio::time::sleep(delay).await;
        delay = config.next_delay(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> ApiError {
        ApiError::ApiError {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let result = retry_with_backoff("test", &RetryConfig::default(), || async {
            Ok::<i32, ApiError>(42)
        })
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retry_success_after_transient_failures() {
        let counter = AtomicU32::new(0);

        let result = retry_with_backoff(
            "test",
            &RetryConfig::new(3, Duration::from_millis(1)),
            || async {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(transient())
                } else {
                    Ok("success")
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let counter = AtomicU32::new(0);

        let result: Result<(), ApiError> = retry_with_backoff(
            "test",
            &RetryConfig::new(2, Duration::from_millis(1)),
            || async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(transient())
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let counter = AtomicU32::new(0);

        let result: Result<(), ApiError> = retry_with_backoff(
            "test",
            &RetryConfig::new(5, Duration::from_millis(1)),
            || async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::ApiError {
                    status: 400,
                    message: "bad request".to_string(),
                })
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_is_capped() {
        let cfg = RetryConfig {
            max_delay: Duration::from_millis(700),
            ..RetryConfig::default()
        };
        assert_eq!(cfg.next_delay(Duration::from_millis(500)), Duration::from_millis(700));
    }
}
