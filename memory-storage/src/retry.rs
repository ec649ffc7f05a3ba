//! Retry policy for retryable storage errors: 5 attempts, 100ms base delay,
//! exponential backoff capped at 5s, with absolute (not percentage) jitter.

use std::future::Future;
use std::time::Duration;

use rand::RngExt;
use tracing::warn;

use crate::error::StorageError;

const MAX_RETRIES: u32 = 5;
const BASE_DELAY: Duration = Duration::from_millis(100);
const MAX_DELAY: Duration = Duration::from_secs(5);
const JITTER: Duration = Duration::from_millis(100);

pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: BASE_DELAY,
            max_delay: MAX_DELAY,
            jitter: JITTER,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1));
        let capped = std::cmp::min(exp, self.max_delay);
        let jitter_ms = rand::rng().random_range(0..=self.jitter.as_millis() as u64 * 2);
        let jitter_signed = jitter_ms as i64 - self.jitter.as_millis() as i64;
        let adjusted = (capped.as_millis() as i64 + jitter_signed).max(0);
        Duration::from_millis(adjusted as u64)
    }

    /// Run `op`, retrying on [`StorageError::is_recoverable`] errors until
    /// `max_retries` is exhausted.
    pub async fn execute<F, T, Fut>(&self, op: F) -> Result<T, StorageError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_recoverable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        ?delay,
                        error = %err,
                        "retrying storage operation"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new();

        let result = policy
            .execute(|| async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(StorageError::LockTimeout {
                        key: "upsert:proj".into(),
                        attempts: n,
                    })
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.expect("eventually succeeds"), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_recoverable_errors_do_not_retry() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new();

        let result: Result<(), StorageError> = policy
            .execute(|| async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(StorageError::MissingColumn("title".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
