use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// How an error affects the retry loop.
pub trait Retryable {
    /// A deliberate cancellation: never retried, propagated at once.
    fn is_cancellation(&self) -> bool;

    /// Failures another attempt cannot fix.
    fn is_permanent(&self) -> bool {
        false
    }
}

impl Retryable for AppError {
    fn is_cancellation(&self) -> bool {
        self.is_cancelled()
    }

    fn is_permanent(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

/// Bounded linear retry: `retries` extra attempts, `delay` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub retries: u32,
    #[serde(with = "millis")]
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Exactly one attempt.
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        with_retry(operation, self.retries, self.delay).await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Run `operation`, retrying failed attempts up to `retries` more times.
pub async fn with_retry<T, E, F, Fut>(mut operation: F, retries: u32, delay: Duration) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_cancellation() || err.is_permanent() || attempt >= retries => {
                return Err(err);
            }
            Err(err) => {
                attempt += 1;
                tracing::warn!(
                    attempt,
                    retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn zero_retries_means_one_attempt() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), AppError> = with_retry(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::internal("down"))
            },
            0,
            Duration::ZERO,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), AppError> = RetryPolicy::new(5, Duration::ZERO)
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::not_found("position not found"))
            })
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn policy_reads_delay_in_millis() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"retries": 2, "delay": 250}"#).expect("valid policy");
        assert_eq!(policy, RetryPolicy::new(2, Duration::from_millis(250)));
    }
}
