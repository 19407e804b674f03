// src/generation/retry.rs

//! Attempt/model bookkeeping for question generation, kept free of I/O so the
//! transition table can be tested on its own.

use std::time::Duration;

use rand::Rng;

/// Which configured model a call goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    /// Call the model for attempt `attempt` (1-based).
    Attempting { attempt: u32, model: ModelRole },
    /// Sleep before continuing after an overloaded primary call.
    Backoff { attempt: u32 },
    Success,
    /// Stop and surface the last error.
    Exhausted,
}

/// Result of one model call, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Overloaded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound (exclusive) of the random delay added to each backoff.
    pub max_jitter: Duration,
    /// First attempt after whose backoff the fallback model is tried too.
    pub fallback_from_attempt: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(600),
            max_delay: Duration::from_millis(8000),
            max_jitter: Duration::from_millis(250),
            fallback_from_attempt: 3,
        }
    }
}

impl RetryPolicy {
    pub fn start(&self) -> RetryState {
        RetryState::Attempting {
            attempt: 1,
            model: ModelRole::Primary,
        }
    }

    /// `min(max_delay, base_delay * 2^(attempt - 1))`, without jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    pub fn jitter(&self) -> Duration {
        let max = self.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max))
    }

    /// Next state after a model call in `state` finished with `outcome`.
    pub fn after_call(&self, state: RetryState, outcome: CallOutcome) -> RetryState {
        let RetryState::Attempting { attempt, model } = state else {
            return state;
        };

        match (model, outcome) {
            (_, CallOutcome::Success) => RetryState::Success,
            (ModelRole::Primary, CallOutcome::Overloaded) => RetryState::Backoff { attempt },
            (ModelRole::Primary, CallOutcome::Failed) => RetryState::Exhausted,
            (ModelRole::Fallback, _) => self.next_attempt(attempt),
        }
    }

    /// Next state once the sleep of `Backoff { attempt }` is over.
    pub fn after_backoff(&self, state: RetryState) -> RetryState {
        let RetryState::Backoff { attempt } = state else {
            return state;
        };

        if attempt >= self.fallback_from_attempt {
            RetryState::Attempting {
                attempt,
                model: ModelRole::Fallback,
            }
        } else {
            self.next_attempt(attempt)
        }
    }

    fn next_attempt(&self, attempt: u32) -> RetryState {
        if attempt < self.max_attempts {
            RetryState::Attempting {
                attempt: attempt + 1,
                model: ModelRole::Primary,
            }
        } else {
            RetryState::Exhausted
        }
    }
}
