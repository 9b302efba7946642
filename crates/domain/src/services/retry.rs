//! Resilient store gateway.
//!
//! Every read and write against a storage collaborator runs through
//! [`StoreGateway::run`]. Transient failures are retried with exponential
//! backoff up to a fixed attempt ceiling; terminal failures propagate on the
//! first occurrence. Exhausting the ceiling yields
//! [`StoreError::ServiceUnavailable`], which callers must surface as a 5xx.
//!
//! Writes that are not idempotent go through [`StoreGateway::run_write`]: an
//! attempt that timed out may still have committed, so it is never repeated.

use metrics::counter;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::errors::StoreError;

/// Default attempt ceiling.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Bounded retry policy for storage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after every further failure.
    pub base_delay: Duration,
    /// Cap for a single backoff delay.
    pub max_delay: Duration,
    /// Upper bound for one attempt. An attempt exceeding it counts as a transient failure.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Backoff to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Worst-case wall time of one gateway call.
    pub fn max_total_duration(&self) -> Duration {
        let attempts = self.max_attempts.max(1);
        let backoff: Duration = (1..attempts).map(|a| self.delay_after(a)).sum();
        self.attempt_timeout.saturating_mul(attempts) + backoff
    }
}

/// The single choke point between the access core and storage.
#[derive(Debug, Clone, Default)]
pub struct StoreGateway {
    policy: RetryPolicy,
}

impl StoreGateway {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `op` under the retry policy.
    ///
    /// `operation` names the call in logs and metrics.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.execute(operation, op, true).await
    }

    /// Runs a non-idempotent write such as a redemption or an insert.
    ///
    /// Transient errors reported by the store are retried as usual, but a
    /// timed-out attempt ends the call with `ServiceUnavailable`.
    pub async fn run_write<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.execute(operation, op, false).await
    }

    async fn execute<T, F, Fut>(
        &self,
        operation: &'static str,
        mut op: F,
        retry_timeouts: bool,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match tokio::time::timeout(self.policy.attempt_timeout, op()).await {
                Ok(result) => result,
                Err(_) if !retry_timeouts => {
                    error!(
                        operation = operation,
                        attempts = attempt,
                        timeout_ms = self.policy.attempt_timeout.as_millis() as u64,
                        "Write timed out with unknown outcome, not retrying"
                    );
                    counter!("store_unavailable_total", "operation" => operation).increment(1);
                    return Err(StoreError::ServiceUnavailable { attempts: attempt });
                }
                Err(_) => Err(StoreError::Transient(format!(
                    "attempt timed out after {:?}",
                    self.policy.attempt_timeout
                ))),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    if attempt >= max_attempts {
                        error!(
                            operation = operation,
                            attempts = attempt,
                            error = %err,
                            "Storage retries exhausted"
                        );
                        counter!("store_unavailable_total", "operation" => operation).increment(1);
                        return Err(StoreError::ServiceUnavailable { attempts: attempt });
                    }

                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        operation = operation,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient storage failure, retrying"
                    );
                    counter!("store_retries_total", "operation" => operation).increment(1);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
