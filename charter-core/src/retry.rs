use std::future::Future;
use std::time::Duration;

use crate::CoreResult;

/// Bounded retry with exponential backoff for conflicts and storage faults.
///
/// Validation, transition and payment errors are returned on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Delay before attempt `attempt + 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempts are used up. `op` receives the zero-based attempt number so it
    /// can refetch state before retrying.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> CoreResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = CoreResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Err(err) if err.is_retryable() && attempt + 1 < self.attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "Attempt {}/{} failed ({}), retrying in {:?}",
                        attempt + 1,
                        self.attempts,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
