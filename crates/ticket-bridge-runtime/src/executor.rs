// crates/ticket-bridge-runtime/src/executor.rs
// ============================================================================
// Module: Resilient Call Executor
// Description: Retries, backoff, rate-limit waits, and breaker gating.
// Purpose: Wrap single-attempt adapter calls in a bounded retry budget.
// Dependencies: tokio, ticket-bridge-config, ticket-bridge-core
// ============================================================================

//! ## Overview
//! The executor drives an adapter operation that makes exactly one network
//! attempt per invocation. Before each attempt it asks the circuit breaker
//! for a permit; each attempt runs under a deadline. Failures are classified
//! by [`AdapterCallError::disposition`]:
//!
//! - authentication failures end the call at once,
//! - tool rate limits wait and retry without spending the attempt budget,
//! - transient failures back off exponentially until the budget runs out,
//! - anything else is rejected without retry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use ticket_bridge_config::ExecutorConfig;
use ticket_bridge_core::AdapterCallError;
use ticket_bridge_core::CallDisposition;
use tokio::time::Instant;

use crate::circuit::CallOutcome;
use crate::circuit::CircuitBreakers;
use crate::circuit::CircuitKey;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Retry budget and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed for transient failures, the first included.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles afterwards.
    pub base_backoff: Duration,
    /// Tool rate-limit responses honored before giving up.
    pub max_rate_limit_waits: u32,
    /// Wait used when a rate-limit response carries no hint.
    pub default_retry_after: Duration,
    /// Upper bound on any rate-limit wait.
    pub max_retry_after: Duration,
    /// Deadline for one attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            max_rate_limit_waits: 2,
            default_retry_after: Duration::from_secs(5),
            max_retry_after: Duration::from_secs(60),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&ExecutorConfig> for RetryPolicy {
    fn from(config: &ExecutorConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_rate_limit_waits: config.max_rate_limit_waits,
            default_retry_after: Duration::from_millis(config.default_retry_after_ms),
            max_retry_after: Duration::from_millis(config.max_retry_after_ms),
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
        }
    }
}

impl RetryPolicy {
    /// Returns the backoff before budgeted attempt `attempt` (1-based).
    ///
    /// The first attempt has no backoff; attempt `n` waits
    /// `base_backoff × 2^(n-2)`.
    #[must_use]
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let factor = 2_u32.checked_pow(attempt - 2).unwrap_or(u32::MAX);
        self.base_backoff.saturating_mul(factor)
    }

    /// Returns the wait for a tool rate-limit response.
    #[must_use]
    pub fn rate_limit_wait(&self, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or(self.default_retry_after).min(self.max_retry_after)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Terminal executor failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// The tool rejected the credentials.
    #[error("authentication rejected (status {status})")]
    Authentication {
        /// HTTP status.
        status: u16,
    },
    /// The breaker refused the call.
    #[error("circuit open; retry in {}ms", .retry_in.as_millis())]
    CircuitOpen {
        /// Time until a call may be attempted.
        retry_in: Duration,
    },
    /// The retry budget ran out.
    #[error("retry budget exhausted after {attempts} attempt(s): {last}")]
    Exhausted {
        /// Network attempts made.
        attempts: u32,
        /// Last failure observed.
        last: AdapterCallError,
    },
    /// A non-retryable failure ended the call.
    #[error("call rejected after {attempts} attempt(s): {error}")]
    Rejected {
        /// Network attempts made.
        attempts: u32,
        /// The failure.
        error: AdapterCallError,
    },
}

/// Result of an executed call with the attempts it took.
#[derive(Debug)]
pub struct Execution<T> {
    /// Final result.
    pub result: Result<T, ExecutorError>,
    /// Network attempts made, rate-limited ones included.
    pub attempts: u32,
}

// ============================================================================
// SECTION: Executor
// ============================================================================

/// Retry driver bound to a breaker map.
pub struct CallExecutor {
    /// Retry budget and timing.
    policy: RetryPolicy,
    /// Breakers consulted before every attempt.
    breakers: Arc<CircuitBreakers>,
}

impl CallExecutor {
    /// Creates an executor.
    #[must_use]
    pub const fn new(policy: RetryPolicy, breakers: Arc<CircuitBreakers>) -> Self {
        Self { policy, breakers }
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation` until it succeeds or the budget is spent.
    pub async fn execute<T, F, Fut>(&self, key: &CircuitKey, mut operation: F) -> Execution<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdapterCallError>>,
    {
        let mut attempts = 0_u32;
        let mut budget_used = 0_u32;
        let mut rate_limit_waits = 0_u32;

        loop {
            let permit = match self.breakers.acquire_guard(key, Instant::now()) {
                Ok(permit) => permit,
                Err(retry_in) => {
                    return Execution {
                        result: Err(ExecutorError::CircuitOpen { retry_in }),
                        attempts,
                    };
                }
            };
            attempts += 1;
            // Dropping the guard mid-attempt records a failure.
            let outcome = tokio::time::timeout(self.policy.attempt_timeout, operation())
                .await
                .unwrap_or(Err(AdapterCallError::Timeout));
            let error = match outcome {
                Ok(value) => {
                    permit.settle(CallOutcome::Success);
                    return Execution { result: Ok(value), attempts };
                }
                Err(error) => error,
            };

            match error.disposition() {
                CallDisposition::Authentication => {
                    permit.settle(CallOutcome::Success);
                    let status = match error {
                        AdapterCallError::Authentication { status } => status,
                        _ => 0,
                    };
                    return Execution {
                        result: Err(ExecutorError::Authentication { status }),
                        attempts,
                    };
                }
                CallDisposition::RateLimited(retry_after) => {
                    permit.settle(CallOutcome::Neutral);
                    if rate_limit_waits >= self.policy.max_rate_limit_waits {
                        return Execution {
                            result: Err(ExecutorError::Exhausted { attempts, last: error }),
                            attempts,
                        };
                    }
                    rate_limit_waits += 1;
                    tokio::time::sleep(self.policy.rate_limit_wait(retry_after)).await;
                }
                CallDisposition::Retryable => {
                    permit.settle(CallOutcome::Failure);
                    budget_used += 1;
                    if budget_used >= self.policy.max_attempts {
                        return Execution {
                            result: Err(ExecutorError::Exhausted { attempts, last: error }),
                            attempts,
                        };
                    }
                    tokio::time::sleep(self.policy.backoff_before(budget_used + 1)).await;
                }
                CallDisposition::Fatal => {
                    permit.settle(CallOutcome::Success);
                    return Execution {
                        result: Err(ExecutorError::Rejected { attempts, error }),
                        attempts,
                    };
                }
            }
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
