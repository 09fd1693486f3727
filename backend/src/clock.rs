//! Time sources for the peer registry
//!
//! Expiry arithmetic always runs on the monotonic [`Instant`]; the wall-clock
//! reading is only used for the `last_seen` value reported to clients.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Abstract time source shared by the registry and its sweeper.
pub trait Clock: Send + Sync {
    /// Monotonic reading used to decide liveness.
    fn now(&self) -> Instant;

    /// Wall-clock reading matching [`Clock::now`].
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Used by tests and benchmarks to step across the liveness timeout without
/// sleeping.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    base_utc: DateTime<Utc>,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            base_utc: Utc::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    /// Total time advanced since creation.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        // Offsets stay far below chrono's range, fall back to the base if not.
        chrono::Duration::from_std(self.elapsed())
            .map(|d| self.base_utc + d)
            .unwrap_or(self.base_utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_starts_still() {
        let clock = ManualClock::new();
        let a = clock.now();
        let b = clock.now();
        assert_eq!(a, b);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_manual_clock_advance_moves_both_readings() {
        let clock = ManualClock::new();
        let start = clock.now();
        let start_utc = clock.utc_now();

        clock.advance(Duration::from_secs(90));

        assert_eq!(clock.now() - start, Duration::from_secs(90));
        assert_eq!((clock.utc_now() - start_utc).num_seconds(), 90);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
