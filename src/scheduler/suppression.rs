//! Learning trigger monitor.
//!
//! A watchdog over each agent's recent collaborator outcomes. A burst of
//! failures suppresses new work generation; release follows a fixed
//! precedence: hard timeout, then the repeated-trigger valve, then recovery.
//! All timing is computed from stored timestamps, so a restart does not
//! reset a suppression.

use crate::config::SuppressionConfig;
use crate::domain::{OutcomeSample, Phase, ReleaseReason, SuppressionState};

/// What an evaluation did to the suppression flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionEvent {
    Unchanged,
    Triggered,
    Released(ReleaseReason),
}

/// Evaluates trigger and release rules against a suppression state.
#[derive(Debug, Clone)]
pub struct LearningTriggerMonitor {
    config: SuppressionConfig,
}

impl LearningTriggerMonitor {
    pub fn new(config: SuppressionConfig) -> Self {
        Self { config }
    }

    /// Add one outcome sample and drop samples outside the trailing window.
    ///
    /// At most `max_samples` are kept, so trigger and recovery rates are
    /// measured over the most recent outcomes on a busy agent.
    pub fn record_outcome(&self, state: &mut SuppressionState, success: bool, phase: Phase, now: i64) {
        state.samples.push(OutcomeSample { at: now, success, phase });
        state.prune(now, self.config.window_ms());
        state.cap_samples(self.config.max_samples);
    }

    /// Triggers within the trailing window ending at `now`.
    pub fn trigger_count_24h(&self, state: &SuppressionState, now: i64) -> usize {
        state.trigger_count_24h(now, self.config.window_ms())
    }

    /// Apply the trigger or release rules once.
    pub fn evaluate(&self, state: &mut SuppressionState, now: i64) -> SuppressionEvent {
        state.prune(now, self.config.window_ms());

        if state.is_suppressed {
            match self.release_reason(state, now) {
                Some(reason) => {
                    state.release(now, reason);
                    SuppressionEvent::Released(reason)
                }
                None => SuppressionEvent::Unchanged,
            }
        } else if self.should_trigger(state) {
            state.trigger(now);
            SuppressionEvent::Triggered
        } else {
            SuppressionEvent::Unchanged
        }
    }

    /// Enough samples since the last release, and too many of them failed.
    fn should_trigger(&self, state: &SuppressionState) -> bool {
        let since = state.released_at.unwrap_or(i64::MIN);
        let (total, failures) = state
            .samples_since(since)
            .fold((0usize, 0usize), |(t, f), s| (t + 1, f + usize::from(!s.success)));

        if total < self.config.min_samples {
            return false;
        }
        failures >= self.config.failure_count || failures as f64 / total as f64 >= self.config.failure_rate
    }

    fn release_reason(&self, state: &SuppressionState, now: i64) -> Option<ReleaseReason> {
        // A suppression with no trigger stamp cannot be reasoned about; lift it.
        let Some(triggered_at) = state.triggered_at else {
            return Some(ReleaseReason::Timeout);
        };

        // Negative elapsed time (clock skew) counts as not yet timed out.
        if now - triggered_at > self.config.timeout_ms() {
            return Some(ReleaseReason::Timeout);
        }

        let cutoff = now - self.config.window_ms();
        let prior_triggers = state
            .trigger_history
            .iter()
            .filter(|t| **t > cutoff && **t < triggered_at)
            .count();
        if prior_triggers >= self.config.max_triggers {
            return Some(ReleaseReason::ForceAfterRepeatedTriggers);
        }

        let since: Vec<&OutcomeSample> = state.samples_since(triggered_at).collect();
        let successes = since.iter().filter(|s| s.success).count();
        if since.len() >= self.config.recovery_samples
            && successes as f64 / since.len() as f64 >= self.config.recovery_rate
        {
            return Some(ReleaseReason::Recovered);
        }

        let streak = since.iter().rev().take_while(|s| s.success).count();
        if streak >= self.config.consecutive_successes {
            return Some(ReleaseReason::Recovered);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: i64 = 60 * 1000;

    fn monitor() -> LearningTriggerMonitor {
        LearningTriggerMonitor::new(SuppressionConfig::default())
    }

    fn feed(m: &LearningTriggerMonitor, state: &mut SuppressionState, outcomes: &[bool], start: i64) {
        for (i, ok) in outcomes.iter().enumerate() {
            m.record_outcome(state, *ok, Phase::Proposing, start + i as i64);
        }
    }

    #[test]
    fn test_samples_are_capped() {
        let m = monitor();
        let mut state = SuppressionState::default();
        feed(&m, &mut state, &[true; 500], 0);
        assert_eq!(state.samples.len(), SuppressionConfig::default().max_samples);
        assert_eq!(state.samples.last().map(|s| s.at), Some(499));
    }

    #[test]
    fn test_capped_history_still_triggers_on_recent_failures() {
        let m = monitor();
        let mut state = SuppressionState::default();
        feed(&m, &mut state, &[true; 300], 0);
        feed(&m, &mut state, &[false; 3], 300);
        assert_eq!(m.evaluate(&mut state, 400), SuppressionEvent::Triggered);
    }

    #[test]
    fn test_needs_minimum_samples() {
        let m = monitor();
        let mut state = SuppressionState::default();
        feed(&m, &mut state, &[false, false], 0);
        assert_eq!(m.evaluate(&mut state, 10), SuppressionEvent::Unchanged);
        assert!(!state.is_suppressed);
    }

    #[test]
    fn test_triggers_on_failure_rate() {
        let m = monitor();
        let mut state = SuppressionState::default();
        feed(&m, &mut state, &[true, false, false, true], 0);
        assert_eq!(m.evaluate(&mut state, 10), SuppressionEvent::Triggered);
        assert!(state.is_suppressed);
        assert_eq!(state.triggered_at, Some(10));
        assert_eq!(m.trigger_count_24h(&state, 10), 1);
    }

    #[test]
    fn test_triggers_on_failure_count() {
        let m = monitor();
        let mut state = SuppressionState::default();
        feed(&m, &mut state, &[true, true, true, true, false, false, false], 0);
        assert_eq!(m.evaluate(&mut state, 10), SuppressionEvent::Triggered);
    }

    #[test]
    fn test_healthy_agent_not_triggered() {
        let m = monitor();
        let mut state = SuppressionState::default();
        feed(&m, &mut state, &[true, true, false, true, true], 0);
        assert_eq!(m.evaluate(&mut state, 10), SuppressionEvent::Unchanged);
    }

    #[test]
    fn test_old_samples_fall_out_of_window() {
        let m = monitor();
        let mut state = SuppressionState::default();
        feed(&m, &mut state, &[false, false, false], 0);
        let later = 25 * 60 * MINUTE;
        assert_eq!(m.evaluate(&mut state, later), SuppressionEvent::Unchanged);
        assert!(state.samples.is_empty());
    }

    #[test]
    fn test_timeout_release_with_no_samples() {
        let m = monitor();
        let mut state = SuppressionState::default();
        state.trigger(0);

        assert_eq!(m.evaluate(&mut state, 30 * MINUTE), SuppressionEvent::Unchanged);
        assert_eq!(
            m.evaluate(&mut state, 31 * MINUTE),
            SuppressionEvent::Released(ReleaseReason::Timeout)
        );
        assert!(!state.is_suppressed);
        assert_eq!(state.last_release, Some(ReleaseReason::Timeout));
    }

    #[test]
    fn test_negative_elapsed_is_not_timeout() {
        let m = monitor();
        let mut state = SuppressionState::default();
        state.trigger(100 * MINUTE);
        assert_eq!(m.evaluate(&mut state, 0), SuppressionEvent::Unchanged);
        assert!(state.is_suppressed);
    }

    #[test]
    fn test_force_release_on_fourth_trigger() {
        let m = monitor();
        let mut state = SuppressionState::default();
        for t in [0, 5 * MINUTE, 10 * MINUTE] {
            state.trigger(t);
            state.release(t + MINUTE, ReleaseReason::Recovered);
        }
        state.trigger(20 * MINUTE);

        assert_eq!(
            m.evaluate(&mut state, 22 * MINUTE),
            SuppressionEvent::Released(ReleaseReason::ForceAfterRepeatedTriggers)
        );
    }

    #[test]
    fn test_third_trigger_is_not_forced() {
        let m = monitor();
        let mut state = SuppressionState::default();
        for t in [0, 5 * MINUTE] {
            state.trigger(t);
            state.release(t + MINUTE, ReleaseReason::Recovered);
        }
        state.trigger(20 * MINUTE);
        assert_eq!(m.evaluate(&mut state, 22 * MINUTE), SuppressionEvent::Unchanged);
    }

    #[test]
    fn test_timeout_beats_force() {
        let m = monitor();
        let mut state = SuppressionState::default();
        for t in [0, MINUTE, 2 * MINUTE] {
            state.trigger(t);
        }
        state.trigger(3 * MINUTE);
        assert_eq!(
            m.evaluate(&mut state, 40 * MINUTE),
            SuppressionEvent::Released(ReleaseReason::Timeout)
        );
    }

    #[test]
    fn test_recovered_by_rate() {
        let m = monitor();
        let mut state = SuppressionState::default();
        state.trigger(0);
        feed(&m, &mut state, &[true, false, true], MINUTE);
        assert_eq!(
            m.evaluate(&mut state, 2 * MINUTE),
            SuppressionEvent::Released(ReleaseReason::Recovered)
        );
    }

    #[test]
    fn test_recovered_by_consecutive_successes() {
        let m = monitor();
        let mut state = SuppressionState::default();
        state.trigger(0);
        feed(&m, &mut state, &[true, true], MINUTE);
        assert_eq!(
            m.evaluate(&mut state, 2 * MINUTE),
            SuppressionEvent::Released(ReleaseReason::Recovered)
        );
    }

    #[test]
    fn test_stays_suppressed_while_failing() {
        let m = monitor();
        let mut state = SuppressionState::default();
        state.trigger(0);
        feed(&m, &mut state, &[false, true, false, false], MINUTE);
        assert_eq!(m.evaluate(&mut state, 2 * MINUTE), SuppressionEvent::Unchanged);
        assert!(state.is_suppressed);
    }

    #[test]
    fn test_samples_before_release_do_not_retrigger() {
        let m = monitor();
        let mut state = SuppressionState::default();
        feed(&m, &mut state, &[false, false, false], 0);
        assert_eq!(m.evaluate(&mut state, 10), SuppressionEvent::Triggered);
        assert_eq!(
            m.evaluate(&mut state, 31 * MINUTE + 10),
            SuppressionEvent::Released(ReleaseReason::Timeout)
        );
        assert_eq!(m.evaluate(&mut state, 32 * MINUTE), SuppressionEvent::Unchanged);
    }
}
