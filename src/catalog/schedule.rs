use chrono::{DateTime, Utc};
use std::time::Duration;

/// Refresh timing state machine
///
/// Tracks consecutive failures and the last successful fetch, and decides how long the
/// refresh loop waits before the next attempt:
///
/// | Last attempt | Next delay |
/// |--------------|------------|
/// | success | `interval` |
/// | 1st failure in a row | `backoff_base` |
/// | nth failure in a row | `min(backoff_base * 2^(n-1), backoff_ceiling)` |
#[derive(Debug, Clone)]
pub struct RefreshSchedule {
    interval: Duration,
    backoff_base: Duration,
    backoff_ceiling: Duration,
    consecutive_failures: u32,
    last_success: Option<DateTime<Utc>>,
    next_delay: Duration,
}

impl RefreshSchedule {
    pub fn new(interval: Duration, backoff_base: Duration, backoff_ceiling: Duration) -> Self {
        Self {
            interval,
            backoff_base,
            backoff_ceiling,
            consecutive_failures: 0,
            last_success: None,
            next_delay: interval,
        }
    }

    /// Resets the backoff and returns the delay before the next refresh
    pub fn record_success(&mut self, at: DateTime<Utc>) -> Duration {
        self.consecutive_failures = 0;
        self.last_success = Some(at);
        self.next_delay = self.interval;
        self.next_delay
    }

    /// Grows the backoff and returns the delay before the retry
    pub fn record_failure(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let exponent = (self.consecutive_failures - 1).min(31);
        self.next_delay = self
            .backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_ceiling);
        self.next_delay
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    pub fn next_delay(&self) -> Duration {
        self.next_delay
    }
}
