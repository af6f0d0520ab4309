//! Bounded exponential retry settings for store writes.

use std::time::Duration;

use backon::ExponentialBuilder;
use serde::{Deserialize, Serialize};

/// How often and how patiently a failing write is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: usize,
    /// Delay before the first retry
    pub min_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_delay_ms: 100,
            max_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Retry `max_retries` times without waiting in between
    pub fn immediate(max_retries: usize) -> Self {
        Self {
            max_retries,
            min_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Build the backoff strategy
    pub fn strategy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.min_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_times(self.max_retries)
    }

    /// Total attempts including the first one
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }
}
