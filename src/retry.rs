//! Bounded retry with a fixed backoff delay.
//!
//! Transport calls (embedding requests, text-service requests) take a
//! [`RetryPolicy`] instead of hand-rolling sleep-and-loop; stores and the
//! resolver never retry on their own.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::types::LicenseerError;

/// Retry budget applied uniformly to any injected transport call.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Must be at least 1.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A policy that runs the operation exactly once.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `operation` until it succeeds or the attempt budget is spent.
    ///
    /// The last error is returned unchanged once attempts are exhausted.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, LicenseerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LicenseerError>>,
    {
        let mut attempt = 1u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts => {
                    warn!(attempt, error = %err, "transport call failed, retrying");
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
