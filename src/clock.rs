//! Wall-clock access for Turnkeeper
//!
//! Every time-based rule (operating window, suppression timeout, trigger
//! windows) reads time through a [`Clock`] so tests can drive it by hand.
//! Persisted timestamps are Unix milliseconds.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Local, TimeZone, Timelike};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> i64 {
    Local::now().timestamp_millis()
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current local time.
    fn now(&self) -> DateTime<Local>;

    /// Current time as Unix milliseconds.
    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }

    /// Current local hour of day, `0..24`.
    fn local_hour(&self) -> u32 {
        self.now().hour()
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Local>>,
}

impl ManualClock {
    /// Create a clock frozen at the given instant.
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Create a clock frozen at a local calendar time.
    ///
    /// Returns `None` when the local time is ambiguous or skipped (DST edges).
    pub fn at_local(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Option<Self> {
        Local
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .map(Self::new)
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: DateTime<Local>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }

    /// Move the clock forward (or backward, for a negative duration).
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_returns_reasonable_timestamp() {
        let ts = now_ms();
        // After 2024-01-01
        assert!(ts > 1_704_067_200_000);
    }

    #[test]
    fn test_system_clock_tracks_now_ms() {
        let clock = SystemClock;
        let a = clock.now_ms();
        let b = now_ms();
        assert!(b >= a);
        assert!(b - a < 5_000);
    }

    #[test]
    fn test_manual_clock_hour() {
        let clock = ManualClock::at_local(2024, 1, 10, 3, 15).unwrap();
        assert_eq!(clock.local_hour(), 3);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at_local(2024, 1, 10, 9, 0).unwrap();
        let before = clock.now_ms();
        clock.advance(Duration::minutes(31));
        assert_eq!(clock.now_ms() - before, 31 * 60 * 1000);
        assert_eq!(clock.local_hour(), 9);
    }

    #[test]
    fn test_manual_clock_backwards() {
        let clock = ManualClock::at_local(2024, 1, 10, 9, 0).unwrap();
        let before = clock.now_ms();
        clock.advance(Duration::minutes(-5));
        assert!(clock.now_ms() < before);
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::at_local(2024, 1, 10, 9, 0).unwrap();
        let later = ManualClock::at_local(2024, 1, 10, 23, 0).unwrap().now();
        clock.set(later);
        assert_eq!(clock.local_hour(), 23);
    }
}
