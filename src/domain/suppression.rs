//! Learning suppression state.
//!
//! Independent of the cycle phase: a suppressed agent may not produce new
//! work, but may still test and publish what it already produced.

use serde::{Deserialize, Serialize};

use super::phase::Phase;

/// Why a suppression was lifted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseReason {
    /// Suppressed longer than the hard timeout
    Timeout,
    /// Too many triggers in the trailing window; released to avoid lock-out
    ForceAfterRepeatedTriggers,
    /// Outcomes since the trigger show recovery
    Recovered,
}

impl ReleaseReason {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseReason::Timeout => "TIMEOUT",
            ReleaseReason::ForceAfterRepeatedTriggers => "FORCE_AFTER_REPEATED_TRIGGERS",
            ReleaseReason::Recovered => "RECOVERED",
        }
    }
}

impl std::fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One collaborator outcome fed to the trigger monitor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomeSample {
    /// Unix timestamp in milliseconds
    pub at: i64,
    /// Whether the collaborator call succeeded
    pub success: bool,
    /// Phase the outcome was produced in
    pub phase: Phase,
}

/// Per-agent suppression flag plus the samples and triggers it is derived from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SuppressionState {
    /// Blocks the Proposing path while set
    pub is_suppressed: bool,

    /// Unix ms of the current suppression's trigger
    pub triggered_at: Option<i64>,

    /// Unix ms of the last release
    pub released_at: Option<i64>,

    /// Why the last suppression was lifted
    pub last_release: Option<ReleaseReason>,

    /// Trigger timestamps inside the trailing window
    #[serde(default)]
    pub trigger_history: Vec<i64>,

    /// Outcome samples inside the trailing window, oldest first
    #[serde(default)]
    pub samples: Vec<OutcomeSample>,
}

impl SuppressionState {
    /// Drop samples and trigger stamps older than the trailing window.
    ///
    /// Returns true when anything was removed.
    pub fn prune(&mut self, now: i64, window_ms: i64) -> bool {
        let cutoff = now - window_ms;
        let before = self.samples.len() + self.trigger_history.len();
        self.samples.retain(|s| s.at > cutoff);
        self.trigger_history.retain(|t| *t > cutoff);
        before != self.samples.len() + self.trigger_history.len()
    }

    /// Keep only the newest `max` samples.
    pub fn cap_samples(&mut self, max: usize) {
        if self.samples.len() > max {
            let excess = self.samples.len() - max;
            self.samples.drain(..excess);
        }
    }

    /// Triggers recorded within the trailing window ending at `now`.
    pub fn trigger_count_24h(&self, now: i64, window_ms: i64) -> usize {
        let cutoff = now - window_ms;
        self.trigger_history.iter().filter(|t| **t > cutoff).count()
    }

    /// Enter suppression.
    pub fn trigger(&mut self, now: i64) {
        self.is_suppressed = true;
        self.triggered_at = Some(now);
        self.trigger_history.push(now);
    }

    /// Leave suppression.
    pub fn release(&mut self, now: i64, reason: ReleaseReason) {
        self.is_suppressed = false;
        self.triggered_at = None;
        self.released_at = Some(now);
        self.last_release = Some(reason);
    }

    /// Samples strictly after the given instant.
    pub fn samples_since(&self, since: i64) -> impl Iterator<Item = &OutcomeSample> {
        self.samples.iter().filter(move |s| s.at > since)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 60 * 60 * 1000;

    fn sample(at: i64, success: bool) -> OutcomeSample {
        OutcomeSample {
            at,
            success,
            phase: Phase::Testing,
        }
    }

    #[test]
    fn test_trigger_and_release() {
        let mut s = SuppressionState::default();
        s.trigger(100);
        assert!(s.is_suppressed);
        assert_eq!(s.triggered_at, Some(100));
        assert_eq!(s.trigger_history, vec![100]);

        s.release(200, ReleaseReason::Recovered);
        assert!(!s.is_suppressed);
        assert_eq!(s.triggered_at, None);
        assert_eq!(s.released_at, Some(200));
        assert_eq!(s.last_release, Some(ReleaseReason::Recovered));
    }

    #[test]
    fn test_prune_drops_old_entries() {
        let mut s = SuppressionState::default();
        s.samples.push(sample(0, false));
        s.samples.push(sample(20 * HOUR, true));
        s.trigger_history.push(HOUR);
        s.trigger_history.push(23 * HOUR);

        assert!(s.prune(25 * HOUR, 24 * HOUR));
        assert_eq!(s.samples.len(), 1);
        assert_eq!(s.trigger_history, vec![23 * HOUR]);
        assert!(!s.prune(25 * HOUR, 24 * HOUR));
    }

    #[test]
    fn test_trigger_count_window() {
        let mut s = SuppressionState::default();
        s.trigger_history = vec![0, 10 * HOUR, 20 * HOUR];
        assert_eq!(s.trigger_count_24h(20 * HOUR, 24 * HOUR), 3);
        assert_eq!(s.trigger_count_24h(26 * HOUR, 24 * HOUR), 2);
    }

    #[test]
    fn test_samples_since_is_exclusive() {
        let mut s = SuppressionState::default();
        s.samples = vec![sample(10, false), sample(20, true), sample(30, true)];
        assert_eq!(s.samples_since(20).count(), 1);
        assert_eq!(s.samples_since(0).count(), 3);
    }

    #[test]
    fn test_release_reason_serde() {
        let json = serde_json::to_string(&ReleaseReason::ForceAfterRepeatedTriggers).unwrap();
        assert_eq!(json, "\"FORCE_AFTER_REPEATED_TRIGGERS\"");
        assert_eq!(ReleaseReason::Timeout.to_string(), "TIMEOUT");
    }

    #[test]
    fn test_cap_samples_keeps_newest() {
        let mut s = SuppressionState::default();
        s.samples = (0..10).map(|i| sample(i, true)).collect();
        s.cap_samples(4);
        assert_eq!(s.samples.iter().map(|x| x.at).collect::<Vec<_>>(), vec![6, 7, 8, 9]);

        s.cap_samples(10);
        assert_eq!(s.samples.len(), 4);
    }
}
