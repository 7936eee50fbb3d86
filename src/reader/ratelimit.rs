//! Fixed-window rate limiting per stream.

use std::time::{Duration, Instant};

/// Allows at most `burst` records per `interval`; the rest are dropped.
///
/// Drops are counted and reported once the window rolls over.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    interval: Option<Duration>,
    burst: u32,
    window_start: Option<Instant>,
    done: u32,
    missed: u64,
}

impl RateLimiter {
    /// Create a limiter. `interval = None` disables limiting.
    #[must_use]
    pub fn new(name: impl Into<String>, interval: Option<Duration>, burst: u32) -> Self {
        Self {
            name: name.into(),
            interval,
            burst: burst.max(1),
            window_start: None,
            done: 0,
            missed: 0,
        }
    }

    /// Decide whether one record at `now` may pass.
    pub fn allow(&mut self, now: Instant) -> bool {
        let Some(interval) = self.interval else {
            return true;
        };

        let start = *self.window_start.get_or_insert(now);
        // A clock going backwards also opens a new window.
        if now > start + interval || now < start {
            self.report_lost();
            self.window_start = Some(now);
            self.done = 0;
        }

        if self.done < self.burst {
            self.done += 1;
            true
        } else {
            self.missed += 1;
            if self.missed == 1 {
                tracing::info!(stream = %self.name, "Begin to drop records due to rate-limiting");
            }
            false
        }
    }

    /// Records dropped in the current window.
    #[must_use]
    pub const fn missed(&self) -> u64 {
        self.missed
    }

    fn report_lost(&mut self) {
        if self.missed > 0 {
            tracing::warn!(
                stream = %self.name,
                lost = self.missed,
                burst = self.burst,
                interval_secs = self.interval.map_or(0, |i| i.as_secs()),
                "Records lost due to rate-limiting"
            );
            self.missed = 0;
        }
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.report_lost();
    }
}
