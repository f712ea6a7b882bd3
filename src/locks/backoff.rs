//! Retry pacing for lock acquisition.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with jitter, drawn from a fixed time budget.
///
/// Each delay is uniformly random in `[interval / 2, interval * 2]` and the
/// interval doubles after every delay. The budget is exhausted once the
/// delays taken so far exceed it; the final delay is clamped so the overshoot
/// stays at one millisecond.
#[derive(Debug)]
pub(crate) struct Backoff {
    interval: Duration,
    remaining: Option<Duration>,
}

impl Backoff {
    pub(crate) fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            interval,
            remaining: Some(timeout),
        }
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.remaining.is_none()
    }

    /// Take the next delay out of the budget.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let remaining = self.remaining.unwrap_or_default();
        let delay = jitter(self.interval).min(remaining + Duration::from_millis(1));
        self.remaining = remaining.checked_sub(delay);
        self.interval = self.interval.saturating_mul(2);
        delay
    }
}

/// A uniformly random duration in `[interval / 2, interval * 2]`.
pub(crate) fn jitter(interval: Duration) -> Duration {
    let micros = u64::try_from(interval.as_micros()).unwrap_or(u64::MAX / 2);
    if micros == 0 {
        return Duration::ZERO;
    }
    let low = micros / 2;
    let high = micros.saturating_mul(2);
    Duration::from_micros(rand::thread_rng().gen_range(low..=high))
}
