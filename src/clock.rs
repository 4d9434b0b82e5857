//! Injected time source.
//!
//! Throttles (drop-target recompute, drag publishing, remote-drag expiry)
//! and audit timestamps read time through [`Clock`] so tests can step it by
//! hand instead of sleeping.

#[cfg(test)]
#[path = "clock_test.rs"]
mod clock_test;

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    /// Monotonic instant for interval math.
    fn now(&self) -> Instant;

    /// Wall-clock milliseconds since the Unix epoch, for audit fields.
    fn now_ms(&self) -> i64;
}

/// Real time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    }
}

/// Hand-stepped clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    origin_ms: i64,
    elapsed: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ManualClock {
    /// Start at the current instant, reporting `epoch_ms` as wall time.
    #[must_use]
    pub fn new(epoch_ms: i64) -> Self {
        Self { origin: Instant::now(), origin_ms: epoch_ms, elapsed: Mutex::new(Duration::ZERO) }
    }

    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        *elapsed += by;
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn now_ms(&self) -> i64 {
        let ms = i64::try_from(self.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.origin_ms.saturating_add(ms)
    }
}
