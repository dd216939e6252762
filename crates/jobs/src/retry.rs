//! Deterministic retry policy and execution.
//!
//! Decision logic ([`RetryPolicy`], [`RetryState`]) is pure and unit-testable
//! without timing; [`run_with_retry`] adds the blocking loop around it.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Invalid retry configuration.
///
/// Raised eagerly at validation, before any execution begins.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RetryPolicyError {
    #[error("max_attempts must be >= 1, got {0}")]
    MaxAttempts(u32),
    #[error("backoff_factor must be a finite value >= 1.0, got {0}")]
    BackoffFactor(f64),
}

/// Failure of a retried execution.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The policy itself was invalid; the action was never invoked.
    #[error("invalid retry policy: {0}")]
    Policy(#[from] RetryPolicyError),

    /// The attempt budget ran out; carries the final action error.
    #[error("retries exhausted after {attempts} attempt(s): {error}")]
    Exhausted { attempts: u32, error: E },
}

/// Retry behavior for a job/worker.
///
/// Backoff is deterministic (no jitter) so failure sequences reproduce
/// exactly in tests and log archaeology. `max_attempts` counts the first
/// attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Exponential backoff with the given bounds.
    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            backoff_factor: 2.0,
        }
    }

    /// Check configuration invariants.
    ///
    /// Delays are `Duration`s and therefore non-negative by construction;
    /// only the attempt budget and the factor can be out of range.
    pub fn validate(&self) -> Result<(), RetryPolicyError> {
        if self.max_attempts < 1 {
            return Err(RetryPolicyError::MaxAttempts(self.max_attempts));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(RetryPolicyError::BackoffFactor(self.backoff_factor));
        }
        Ok(())
    }
}

/// Progress of a single [`run_with_retry`] execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    /// 1-based once execution starts; incremented before each try.
    pub attempt: u32,
    pub last_error: Option<String>,
}

impl RetryState {
    pub fn can_retry(&self, policy: &RetryPolicy) -> bool {
        self.attempt < policy.max_attempts
    }

    /// Delay before the next attempt: `base * factor^(attempt - 1)`, capped
    /// at `max_delay`. Attempt 1 maps to the base delay.
    pub fn next_delay(&self, policy: &RetryPolicy) -> Duration {
        let exp = self.attempt.saturating_sub(1);
        let delay = policy.base_delay.as_secs_f64() * policy.backoff_factor.powi(exp as i32);
        // powi overflow saturates to infinity; min() pulls it back to the cap.
        Duration::from_secs_f64(delay.min(policy.max_delay.as_secs_f64()))
    }
}

/// Execute `action` under `policy`, sleeping between attempts.
///
/// After every failure, `on_error` runs synchronously (metrics/logging hook)
/// before the retry-or-exhaust decision. Exhaustion propagates the final
/// action error inside [`RetryError::Exhausted`]; success returns the state
/// with the attempt count that got there.
pub fn run_with_retry<F, H, E>(
    policy: &RetryPolicy,
    mut on_error: H,
    mut action: F,
) -> Result<RetryState, RetryError<E>>
where
    F: FnMut() -> Result<(), E>,
    H: FnMut(&E, &RetryState),
    E: std::fmt::Display,
{
    policy.validate()?;
    let mut state = RetryState::default();

    while state.can_retry(policy) {
        state.attempt += 1;

        let err = match action() {
            Ok(()) => return Ok(state),
            Err(err) => err,
        };

        state.last_error = Some(err.to_string());
        on_error(&err, &state);

        if !state.can_retry(policy) {
            return Err(RetryError::Exhausted {
                attempts: state.attempt,
                error: err,
            });
        }

        let delay = state.next_delay(policy);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    // max_attempts >= 1 is validated above, so the loop body runs at least
    // once and every path through it returns.
    unreachable!("retry loop exited without a terminal result")
}
