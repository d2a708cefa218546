use std::time::Duration;

use crate::config::SetterConfig;

/// Exponent is capped, so the doubling stops after ten attempts.
const MAX_EXPONENT_ATTEMPTS: u32 = 10;

/// `min(base * 2^(min(attempts, 10) - 1), max)`
#[must_use]
pub fn backoff(base: Duration, attempts: u32, max: Duration) -> Duration {
    let exponent = attempts.clamp(1, MAX_EXPONENT_ATTEMPTS) - 1;
    base.checked_mul(1 << exponent)
        .map_or(max, |delay| delay.min(max))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryLimit {
    /// Keep retrying until the write succeeds
    Unbounded,
    /// Give up after this many failed attempts
    Attempts(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
    pub limit: RetryLimit,
}

impl RetryPolicy {
    /// Policy for a boiler that could not be reached at all.
    #[must_use]
    pub fn connection(config: &SetterConfig) -> Self {
        Self {
            base: config.base_backoff() * config.connection_backoff_multiplier,
            max: config.max_backoff(),
            limit: RetryLimit::Unbounded,
        }
    }

    /// Policy for a boiler that answered, but rejected the write.
    #[must_use]
    pub fn rejected(config: &SetterConfig) -> Self {
        Self {
            base: config.base_backoff(),
            max: config.max_backoff(),
            limit: RetryLimit::Attempts(config.max_attempts),
        }
    }

    #[must_use]
    pub fn delay(&self, attempts: u32) -> Duration {
        backoff(self.base, attempts, self.max)
    }

    #[must_use]
    pub const fn exhausted(&self, attempts: u32) -> bool {
        match self.limit {
            RetryLimit::Unbounded => false,
            RetryLimit::Attempts(max) => attempts >= max,
        }
    }
}
