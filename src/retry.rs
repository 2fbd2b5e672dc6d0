//! Retry policy for oracle replies that fail to parse.
//!
//! The policy only answers two questions ("may I try again?" and "how long
//! do I wait first?") and knows nothing about schedulers. The caller does
//! the waiting with `tokio::time::sleep`, so a task backing off never holds
//! up other tasks on the same runtime.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay between attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backoff {
    /// Same delay before every retry (default).
    #[default]
    Fixed,
    /// Delay doubles after each retry: d, 2d, 4d, …
    Exponential,
}

/// Bounded retry with a fixed or exponential delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always ≥ 1.
    pub max_attempts: u32,
    /// Base delay between attempts.
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(5, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff: Backoff::Fixed,
        }
    }

    pub fn exponential(max_attempts: u32, base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: base,
            backoff: Backoff::Exponential,
        }
    }

    /// Whether another attempt is allowed after `attempt` (1-indexed) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to wait after failed `attempt` (1-indexed) before the next one.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let exp = attempt.saturating_sub(1).min(16);
                self.delay.saturating_mul(1u32 << exp)
            }
        }
    }
}
