//! Polling backoff and the clock the reader sleeps on.

use std::time::{Duration, Instant};

/// Lower bound for every delay, so an empty channel is never busy-polled.
pub const MIN_DELAY: Duration = Duration::from_micros(100);

/// Maps consecutive empty polls to a sleep duration in three tiers.
///
/// Tiers are clamped at evaluation time: `short` to at least [`MIN_DELAY`],
/// `medium` to at least `short`, `long` to at least `medium`. The resulting
/// delay is therefore non-decreasing in the poll count whatever values are
/// configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSchedule {
    /// Polls below this count use `short`.
    pub short_until: u32,
    /// Polls below this count (and at or above `short_until`) use `medium`.
    pub medium_until: u32,
    pub short: Duration,
    pub medium: Duration,
    pub long: Duration,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            short_until: 10,
            medium_until: 100,
            short: Duration::from_millis(1),
            medium: Duration::from_millis(5),
            long: Duration::from_millis(10),
        }
    }
}

impl BackoffSchedule {
    /// Sleep duration after `empty_polls` consecutive empty polls.
    pub fn delay(&self, empty_polls: u32) -> Duration {
        let short = self.short.max(MIN_DELAY);
        let medium = self.medium.max(short);
        let long = self.long.max(medium);

        if empty_polls < self.short_until {
            short
        } else if empty_polls < self.medium_until {
            medium
        } else {
            long
        }
    }
}

/// Time source and sleeper used by the frame reader.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `Instant::now` and `thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}
