//! Bounded, fixed-interval retry for upstream calls.
//!
//! Rate-limit windows on the supported services are roughly constant in
//! length, so the gate sleeps the same interval between every attempt.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::error::AgentError;

/// Default attempts per gated call.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
/// Default pause between attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(20);

/// Attempt budget and fixed backoff for one gated call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least 1.
    pub attempts: u32,
    /// Pause between consecutive attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub const fn new(attempts: u32, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    /// Runs `call` until it succeeds or the budget is spent.
    ///
    /// Retryable failures sleep `backoff` and try again; after the last
    /// attempt the failure is surfaced as [`AgentError::RetriesExhausted`].
    /// Non-retryable failures (see [`AgentError::is_retryable`]) are
    /// returned unchanged on first sight.
    ///
    /// A call failing `k < attempts` times sleeps exactly `k` times. A call
    /// that always fails runs `attempts` times and sleeps `attempts - 1` times.
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or
    /// [`AgentError::RetriesExhausted`] wrapping the final retryable one.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, AgentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= attempts => {
                    error!(operation, attempts, error = %e, "retry budget exhausted");
                    return Err(AgentError::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(
                        operation,
                        attempt,
                        attempts,
                        backoff_secs = self.backoff.as_secs_f64(),
                        error = %e,
                        "upstream call failed, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
