//! Retry logic with exponential backoff

use crate::config::DataConfig;
use crate::error::DataFailure;
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Errors that know whether another attempt could succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for DataFailure {
    fn is_retryable(&self) -> bool {
        self.reason.is_retryable()
    }
}

impl Retryable for swing_llm::LLMError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &DataConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            initial_backoff: config.retry_backoff(),
            ..Self::default()
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Create a policy with fast retries (for testing)
    pub fn fast() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
            backoff_multiplier: 2.0,
        }
    }

    /// Backoff before retry number `attempt` (1-based)
    fn backoff_duration(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let backoff_ms = self.initial_backoff.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error or
    /// runs out of attempts. The last error is returned.
    pub async fn execute<F, Fut, T, E>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Debug,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("Attempt {attempt}/{max_attempts} for {operation_name}");

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{operation_name} succeeded after {} retries", attempt - 1);
                    }
                    return Ok(value);
                },
                Err(e) if !e.is_retryable() => {
                    debug!("{operation_name} failed with non-retryable error: {e:?}");
                    return Err(e);
                },
                Err(e) if attempt >= max_attempts => {
                    warn!("{operation_name} failed after {max_attempts} attempts: {e:?}");
                    return Err(e);
                },
                Err(e) => {
                    let backoff = self.backoff_duration(attempt);
                    warn!("{operation_name} failed (attempt {attempt}/{max_attempts}): {e:?}. Retrying in {backoff:?}");
                    sleep(backoff).await;
                },
            }
        }
    }
}
