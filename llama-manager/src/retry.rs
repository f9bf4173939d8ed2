//! Fixed-count, fixed-delay retry policy.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How a logical operation is retried.
///
/// The delay is constant between attempts: no backoff, no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout_per_attempt: Duration,
    pub delay_between_attempts: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_per_attempt: Duration::from_secs(10),
            delay_between_attempts: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, timeout_per_attempt: Duration, delay_between_attempts: Duration) -> Self {
        Self {
            max_attempts,
            timeout_per_attempt,
            delay_between_attempts,
        }
    }

    /// Attempts actually made; a policy of zero still tries once.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Longest time one logical operation can take.
    pub fn worst_case(&self) -> Duration {
        let attempts = self.attempts();
        self.timeout_per_attempt * attempts + self.delay_between_attempts * (attempts - 1)
    }

    /// Run `attempt` until it succeeds or the attempts are used up.
    ///
    /// The closure receives the 1-based attempt number. The error of the
    /// final attempt is returned as-is.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let max_attempts = self.attempts();
        let mut number = 1;

        loop {
            match attempt(number).await {
                Ok(value) => return Ok(value),
                Err(e) if number >= max_attempts => return Err(e),
                Err(e) => {
                    tracing::warn!(operation, "Retry {}/{}: {}", number, max_attempts, e);
                    tokio::time::sleep(self.delay_between_attempts).await;
                    number += 1;
                }
            }
        }
    }
}
