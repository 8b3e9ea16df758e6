//! Bounded retry for remote reads.
//!
//! Retries an operation a fixed number of times with a fixed delay, but only
//! while its failure is transient. Any other failure propagates immediately.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{ChainError, EngineError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; it is clamped to at least one.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self::new(cfg.max_attempts, Duration::from_millis(cfg.delay_ms))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `f` until it succeeds, fails non-transiently, or the attempt
    /// budget is spent. Exhaustion surfaces as `RemoteUnavailable` carrying
    /// the last transient failure.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err.into()),
                Err(err) if attempt >= self.max_attempts => {
                    warn!(operation, attempts = attempt, error = %err, "Retries exhausted");
                    return Err(EngineError::RemoteUnavailable {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => {
                    debug!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
