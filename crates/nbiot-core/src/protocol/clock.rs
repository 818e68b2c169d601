//! Time sources for deadlines and backoff
//!
//! The engine never calls `Instant::now()` or `thread::sleep` directly so that
//! retry timing can be driven by a virtual clock in tests.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Monotonic clock used by the transaction engine
pub trait Clock: Send {
    /// Time elapsed since the clock was created
    fn now(&self) -> Duration;

    /// Block the caller for `duration`
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by [`Instant`] and [`std::thread::sleep`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Wall clock
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock: time only moves when someone sleeps or calls [`advance`].
///
/// Clones share the same timeline, so a test can keep one handle while the
/// engine owns another.
///
/// [`advance`]: ManualClock::advance
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    /// Clock starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += duration;
        }
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Number of sleeps of exactly `duration`
    pub fn count_sleeps_of(&self, duration: Duration) -> usize {
        self.sleeps().iter().filter(|d| **d == duration).count()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.lock().map(|n| *n).unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
    }
}
