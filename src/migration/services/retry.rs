//! Retry policy for destination API calls.
//!
//! Transient failures are retried with exponential backoff; permanent
//! failures surface immediately.

use crate::migration::domain::MigrationConfig;
use crate::migration::ports::{ApiError, ApiResult, ErrorClass};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff never grows past this, however many attempts remain.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Bounded exponential backoff for a single API operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy that retries `max_retries` times after the initial
    /// attempt, starting at `initial_delay` and doubling each retry.
    #[must_use]
    pub const fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
        }
    }

    /// Derives the policy from run configuration.
    #[must_use]
    pub const fn from_config(config: &MigrationConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay())
    }

    /// Runs `attempt` until it succeeds, fails permanently, or the retry
    /// budget is spent.
    ///
    /// # Errors
    ///
    /// Returns the permanent error unchanged, or
    /// [`ApiError::ExhaustedRetries`] wrapping the last transient error once
    /// the budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut delay = self.initial_delay;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let error = match attempt().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if error.classification() == ErrorClass::Permanent {
                return Err(error);
            }
            if attempts > self.max_retries {
                return Err(ApiError::ExhaustedRetries {
                    attempts,
                    last: Box::new(error),
                });
            }

            warn!(
                operation,
                attempt = attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "transient failure, backing off before retry"
            );
            tokio::time::sleep(delay).await;
            delay = delay.saturating_mul(2).min(MAX_BACKOFF);
        }
    }
}
