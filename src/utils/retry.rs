//! Retry utilities with exponential backoff.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Initial delay between attempts.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Backoff multiplier (delay *= multiplier after each retry).
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Set the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }
}

/// Retry result indicating what happened.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed. `earlier` holds the errors of the attempts before
    /// the last one, oldest first.
    Failed {
        last_error: E,
        earlier: Vec<E>,
        attempts: u32,
    },
}

impl<T, E> RetryResult<T, E> {
    /// Convert to a Result, discarding retry information.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success(value) => Ok(value),
            RetryResult::Failed { last_error, .. } => Err(last_error),
        }
    }

    /// Convert to a Result, folding all attempt errors into one.
    pub fn into_result_with<F>(self, aggregate: F) -> Result<T, E>
    where
        F: FnOnce(Vec<E>) -> E,
    {
        match self {
            RetryResult::Success(value) => Ok(value),
            RetryResult::Failed {
                last_error,
                mut earlier,
                ..
            } => {
                earlier.push(last_error);
                Err(aggregate(earlier))
            }
        }
    }
}

/// Determines if an error is retryable.
pub trait Retryable {
    /// Returns true if the operation should be retried.
    fn is_retryable(&self) -> bool;
}

/// Execute an async operation with exponential backoff retry.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> RetryResult<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempts = 0;
    let mut delay = config.initial_delay;
    let mut earlier = Vec::new();

    loop {
        attempts += 1;

        match operation(attempts).await {
            Ok(value) => return RetryResult::Success(value),
            Err(error) => {
                tracing::warn!(attempt = attempts, error = %error, "attempt failed");
                if attempts >= config.max_attempts || !error.is_retryable() {
                    return RetryResult::Failed {
                        last_error: error,
                        earlier,
                        attempts,
                    };
                }
                earlier.push(error);

                let jitter_ms = rand_jitter(delay.as_millis() as u64 / 4);
                sleep(delay + Duration::from_millis(jitter_ms)).await;

                delay = Duration::from_secs_f64(delay.as_secs_f64() * config.multiplier)
                    .min(config.max_delay);
            }
        }
    }
}

fn rand_jitter(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    rand::rng().random_range(0..max)
}

/// Execute an async operation with default retry configuration.
pub async fn retry<T, E, F, Fut>(operation: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_retry(&RetryConfig::default(), operation)
        .await
        .into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct RetryableError(String);

    impl std::fmt::Display for RetryableError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl Retryable for RetryableError {
        fn is_retryable(&self) -> bool {
            self.0.contains("transient")
        }
    }

    fn fast(attempts: u32) -> RetryConfig {
        RetryConfig::new(attempts).with_initial_delay(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let counter = AtomicU32::new(0);
        let result = with_retry(&RetryConfig::new(3), |_| async {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, RetryableError>("success")
        })
        .await;

        match result {
            RetryResult::Success(v) => assert_eq!(v, "success"),
            _ => panic!("expected success"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_retries() {
        let result = with_retry(&fast(3), |attempt| async move {
            if attempt < 3 {
                Err(RetryableError("transient error".to_string()))
            } else {
                Ok(attempt)
            }
        })
        .await;

        match result {
            RetryResult::Success(v) => assert_eq!(v, 3),
            _ => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn test_retry_non_retryable_error() {
        let counter = AtomicU32::new(0);
        let result = with_retry(&RetryConfig::new(3), |_| async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(RetryableError("permanent error".to_string()))
        })
        .await;

        match result {
            RetryResult::Failed {
                attempts, earlier, ..
            } => {
                assert_eq!(attempts, 1);
                assert!(earlier.is_empty());
            }
            _ => panic!("expected failure"),
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhausted_keeps_every_error() {
        let result = with_retry(&fast(3), |attempt| async move {
            Err::<(), _>(RetryableError(format!("transient error {attempt}")))
        })
        .await;

        match result {
            RetryResult::Failed {
                last_error,
                earlier,
                attempts,
            } => {
                assert_eq!(attempts, 3);
                let messages: Vec<String> = earlier.iter().map(|e| e.0.clone()).collect();
                assert_eq!(messages, vec!["transient error 1", "transient error 2"]);
                assert_eq!(last_error.0, "transient error 3");
            }
            _ => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_into_result_with_aggregates() {
        let result = with_retry(&fast(2), |_| async {
            Err::<(), _>(RetryableError("transient".to_string()))
        })
        .await
        .into_result_with(|errors| RetryableError(format!("{} failures", errors.len())));

        assert_eq!(result.unwrap_err().0, "2 failures");
    }
}
