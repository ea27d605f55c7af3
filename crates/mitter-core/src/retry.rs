use std::time::Duration;

use crate::error::MitterError;

/// Exponents past this saturate at the ceiling anyway.
const MAX_DOUBLINGS: u32 = 20;

/// Caller-side backoff for re-issuing failed page requests.
///
/// Pagination managers never retry on their own; views use this to decide when
/// the next boundary signal may trigger a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
    ceiling: Duration,
}

impl RetryPolicy {
    /// Delays start at `base_delay_ms` and never exceed `max_delay_ms`
    /// (raised to the base if smaller).
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            base: Duration::from_millis(base_delay_ms),
            ceiling: Duration::from_millis(max_delay_ms.max(base_delay_ms)),
        }
    }

    pub fn base_delay_ms(&self) -> u64 {
        self.base.as_millis() as u64
    }

    pub fn max_delay_ms(&self) -> u64 {
        self.ceiling.as_millis() as u64
    }

    /// `base * 2^attempt`, raised to the server hint and capped at the ceiling.
    pub fn delay_for_attempt(&self, attempt: u32, retry_after_hint_ms: Option<u64>) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.min(MAX_DOUBLINGS));
        let backoff = self.base.saturating_mul(factor);
        let hint = retry_after_hint_ms.map_or(Duration::ZERO, Duration::from_millis);
        backoff.max(hint).min(self.ceiling)
    }

    /// Delay before retry number `attempt` after `error`, honouring its hint.
    pub fn delay_after(&self, attempt: u32, error: &MitterError) -> Duration {
        self.delay_for_attempt(attempt, error.retry_after_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(500, 30_000)
    }
}
