use std::time::Duration;

use tokio::time::Instant;

/// Backoff state of a polling group that failed with a response error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupRetryState {
    pub attempts: u32,
    pub next_retry: Instant,
}

/// Delay before retry number `attempts` of a failed group:
/// `base * factor^(attempts - 1)`, capped at `max`.
#[must_use]
pub fn group_backoff(base: Duration, factor: u32, attempts: u32, max: Duration) -> Duration {
    factor
        .checked_pow(attempts.saturating_sub(1))
        .and_then(|mult| base.checked_mul(mult))
        .map_or(max, |delay| delay.min(max))
}

impl GroupRetryState {
    /// Record one more failure, scheduling the next attempt from `now`.
    #[must_use]
    pub fn next(
        prev: Option<Self>,
        now: Instant,
        base: Duration,
        factor: u32,
        max: Duration,
    ) -> Self {
        let attempts = prev.map_or(1, |state| state.attempts.saturating_add(1));
        Self {
            attempts,
            next_retry: now + group_backoff(base, factor, attempts, max),
        }
    }
}
