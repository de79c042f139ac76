//! Injectable clock and sleep abstraction
//!
//! All elapsed-time checks and backoff waits go through [`Clock`] so
//! tests run without real wall-clock delay. The time-budget exit points
//! built on this clock double as cooperative cancellation checkpoints.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source plus suspension point
pub trait Clock: Send + Sync {
    /// Monotonic time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Suspend for `duration` (virtual time in tests).
    fn sleep(&self, duration: Duration);
}

/// Real clock backed by [`Instant`] and [`std::thread::sleep`]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
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

/// Manually advanced clock for tests
///
/// `sleep` advances virtual time instead of blocking, so retry/backoff
/// and timeout paths run instantly under test.
#[derive(Default)]
pub struct ManualClock {
    elapsed_micros: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance virtual time by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.elapsed_micros
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.elapsed_micros.load(Ordering::SeqCst))
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}
