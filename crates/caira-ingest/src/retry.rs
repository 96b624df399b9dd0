//! Exponential backoff for rate-limited embedding calls.

use std::future::Future;
use std::time::Duration;

use caira_core::{CairaError, EmbeddingConfig};

/// How many times to attempt a call and how long to wait between attempts.
///
/// Only [`CairaError::RateLimited`] is retried. Attempt `n` (0-based) that
/// hits the rate limit waits `base_delay * 2^n` before the next attempt.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use caira_ingest::retry::RetryPolicy;
///
/// let policy = RetryPolicy::new(3, Duration::from_secs(1));
/// assert_eq!(policy.delay_for(0), Duration::from_secs(1));
/// assert_eq!(policy.delay_for(2), Duration::from_secs(4));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Policy from the `[embedding]` config section.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_base_ms),
        )
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after the `attempt`-th (0-based) rate-limited attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `op` until it succeeds, fails with a non-rate-limit error, or
    /// exhausts the attempt budget.
    ///
    /// # Errors
    ///
    /// Returns the first non-rate-limit error unchanged, or
    /// [`CairaError::Embedding`] once every attempt was rate limited.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, CairaError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CairaError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(CairaError::RateLimited(msg)) => {
                    if attempt + 1 >= self.max_attempts {
                        return Err(CairaError::Embedding(format!(
                            "rate limited after {} attempts: {msg}",
                            self.max_attempts
                        )));
                    }
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
    }

    #[test]
    fn delay_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::new(5, Duration::from_secs(u64::MAX / 2));
        assert_eq!(policy.delay_for(40), Duration::MAX);
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test]
    async fn succeeds_after_rate_limits() {
        let calls = AtomicU32::new(0);
        let result = instant(3)
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(CairaError::RateLimited("429".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_attempts_become_embedding_error() {
        let calls = AtomicU32::new(0);
        let err = instant(3)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(CairaError::RateLimited("slow down".into())) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(err, CairaError::Embedding(ref m) if m.contains("3 attempts")));
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = instant(3)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(CairaError::Embedding("401 unauthorized".into())) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, CairaError::Embedding(_)));
    }
}
