//! Bounded exponential retry for flaky collaborators.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::LogResult;

/// Delay doubles after every failed attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    initial_delay: Duration,
    max_retries: usize,
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, max_retries: usize) -> Self {
        Self {
            initial_delay,
            max_retries,
        }
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for_retry(&self, retry: usize) -> Duration {
        let shift = retry.saturating_sub(1).min(31) as u32;
        self.initial_delay.saturating_mul(1u32 << shift)
    }

    /// Run `op` until it succeeds or the retries are used up, returning the
    /// last error in that case.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> LogResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LogResult<T>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if retry < self.max_retries => {
                    retry += 1;
                    let delay = self.delay_for_retry(retry);
                    warn!(what, retry, error = %e, delay_ms = delay.as_millis() as u64, "Retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Five retries starting at five seconds.
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 5)
    }
}
