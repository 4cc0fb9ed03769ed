//! Adaptive quota controller.
//!
//! On every closed cycle the Proposing quota for the next cycle is derived
//! from how many of this cycle's proposals the verifier approved, and from
//! how that rate moved against the last measured cycle.

use crate::config::AdaptiveConfig;
use crate::domain::{AgentRecord, QuotaHistoryEntry};

/// Baseline effectiveness meaning "no measured change".
pub const EFFECTIVENESS_BASELINE: f64 = 50.0;

/// Recomputes the Proposing quota once per completed cycle.
#[derive(Debug, Clone)]
pub struct AdaptiveQuotaController {
    config: AdaptiveConfig,
}

impl AdaptiveQuotaController {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self { config }
    }

    /// Close the record's current cycle: measure, adapt, append history.
    ///
    /// Never fails. A cycle with no processed proposals is data-starved: its
    /// success rate is 0 and the quota drops to the floor. Effectiveness is
    /// measured against the previous cycle whether or not it was starved;
    /// only an agent's first cycle has no baseline.
    pub fn close_cycle(&self, record: &mut AgentRecord, now: i64) -> QuotaHistoryEntry {
        let since = record.quota.cycle_started_at.unwrap_or(i64::MIN);
        let limit = record.quota.phase_quotas.proposing as usize;
        let (approved, processed) = record.proposals.tally(since, limit);

        // The previous cycle's rate, starved cycles included (they scored 0).
        let baseline = (record.quota.learning_cycles > 0).then_some(record.quota.success_rate);

        let entry = if processed == 0 {
            QuotaHistoryEntry {
                quota: self.config.min_proposing,
                success_rate: 0.0,
                effectiveness: effectiveness(baseline.map(|prev| -prev)),
                data_starved: true,
                timestamp: now,
            }
        } else {
            let success_rate = f64::from(approved) / f64::from(processed) * 100.0;
            let improvement = baseline.map(|prev| success_rate - prev);
            QuotaHistoryEntry {
                quota: self.next_quota(record.quota.phase_quotas.proposing, success_rate, improvement),
                success_rate,
                effectiveness: effectiveness(improvement),
                data_starved: false,
                timestamp: now,
            }
        };

        if entry.data_starved {
            tracing::warn!(
                agent = %record.agent,
                quota = entry.quota,
                "Cycle closed with no processed proposals, using quota floor"
            );
        } else {
            tracing::info!(
                agent = %record.agent,
                approved,
                processed,
                success_rate = entry.success_rate,
                effectiveness = entry.effectiveness,
                quota = entry.quota,
                "Cycle closed"
            );
        }

        record.quota.close_cycle(entry.clone(), self.config.history_limit);
        record.touch(now);
        entry
    }

    /// Next Proposing quota from the current one.
    ///
    /// Improvement over the last measured cycle earns units and regression
    /// costs them; a very high or very low absolute rate adds one more step.
    /// `improvement` is `None` when there is no earlier measurement.
    pub fn next_quota(&self, current: u32, success_rate: f64, improvement: Option<f64>) -> u32 {
        let strong = self.config.strong_improvement;
        let mut delta: i64 = match improvement {
            Some(d) if d >= strong => 2,
            Some(d) if d > 0.0 => 1,
            Some(d) if d <= -strong => -2,
            Some(d) if d < 0.0 => -1,
            _ => 0,
        };
        if success_rate >= self.config.high_success {
            delta += 1;
        } else if success_rate < self.config.low_success {
            delta -= 1;
        }

        let next = (i64::from(current) + delta)
            .clamp(i64::from(self.config.min_proposing), i64::from(self.config.max_proposing));
        next as u32
    }
}

/// `clamp(50 + improvement, 0, 100)`, or 0 without a baseline.
pub fn effectiveness(improvement: Option<f64>) -> f64 {
    match improvement {
        Some(d) => (EFFECTIVENESS_BASELINE + d).clamp(0.0, 100.0),
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Agent, PhaseCounts};

    fn controller() -> AdaptiveQuotaController {
        AdaptiveQuotaController::new(AdaptiveConfig::default())
    }

    /// Record with a cycle started at 1000 and the given verdicts.
    fn record_with(verdicts: &[Option<bool>]) -> AgentRecord {
        let mut record = AgentRecord::new(Agent::Imperium, PhaseCounts::new(3, 3, 2), 0);
        record.quota.activate(1_000);
        for (i, verdict) in verdicts.iter().enumerate() {
            let id = format!("p{}", i);
            record.proposals.record(&id, 1_000 + i as i64);
            if let Some(passed) = verdict {
                record.proposals.set_verdict(&id, *passed);
            }
        }
        record
    }

    #[test]
    fn test_effectiveness_formula() {
        assert_eq!(effectiveness(None), 0.0);
        assert_eq!(effectiveness(Some(0.0)), 50.0);
        assert_eq!(effectiveness(Some(20.0)), 70.0);
        assert_eq!(effectiveness(Some(-80.0)), 0.0);
        assert_eq!(effectiveness(Some(75.0)), 100.0);
    }

    #[test]
    fn test_next_quota_rewards_improvement() {
        let c = controller();
        assert_eq!(c.next_quota(3, 50.0, Some(15.0)), 5);
        assert_eq!(c.next_quota(3, 50.0, Some(5.0)), 4);
        assert_eq!(c.next_quota(3, 50.0, Some(0.0)), 3);
        assert_eq!(c.next_quota(3, 50.0, None), 3);
    }

    #[test]
    fn test_next_quota_penalizes_regression() {
        let c = controller();
        assert_eq!(c.next_quota(5, 50.0, Some(-5.0)), 4);
        assert_eq!(c.next_quota(5, 50.0, Some(-10.0)), 3);
        assert_eq!(c.next_quota(5, 10.0, Some(-30.0)), 2);
    }

    #[test]
    fn test_next_quota_is_monotonic_in_improvement() {
        let c = controller();
        let samples = [-40.0, -10.0, -3.0, 0.0, 3.0, 10.0, 40.0];
        let quotas: Vec<u32> = samples.iter().map(|d| c.next_quota(5, 50.0, Some(*d))).collect();
        assert!(quotas.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_next_quota_clamped() {
        let c = controller();
        assert_eq!(c.next_quota(10, 100.0, Some(50.0)), 10);
        assert_eq!(c.next_quota(1, 0.0, Some(-50.0)), 1);
    }

    #[test]
    fn test_first_cycle_has_zero_effectiveness() {
        let c = controller();
        let mut record = record_with(&[Some(true), Some(true), Some(false)]);
        let entry = c.close_cycle(&mut record, 5_000);

        assert!(!entry.data_starved);
        assert!((entry.success_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(entry.effectiveness, 0.0);
        assert_eq!(entry.quota, 3);
        assert_eq!(record.quota.learning_cycles, 1);
        assert_eq!(record.quota.quota_history.len(), 1);
    }

    #[test]
    fn test_second_cycle_measures_against_previous() {
        let c = controller();
        let mut record = record_with(&[Some(true), Some(false)]);
        c.close_cycle(&mut record, 2_000);
        assert_eq!(record.quota.success_rate, 50.0);

        record.quota.activate(10_000);
        for i in 0..3 {
            let id = format!("q{}", i);
            record.proposals.record(&id, 10_000 + i);
            record.proposals.set_verdict(&id, true);
        }
        let entry = c.close_cycle(&mut record, 20_000);

        assert_eq!(entry.success_rate, 100.0);
        assert_eq!(entry.effectiveness, 100.0);
        // +50 points is a strong improvement, and 100% is a high rate.
        assert_eq!(entry.quota, record.quota.quota_history[0].quota + 3);
        assert_eq!(record.quota.phase_quotas.proposing, entry.quota);
    }

    #[test]
    fn test_data_starved_cycle_uses_floor() {
        let c = controller();
        let mut record = record_with(&[None, None]);
        let entry = c.close_cycle(&mut record, 5_000);

        assert!(entry.data_starved);
        assert_eq!(entry.success_rate, 0.0);
        assert_eq!(entry.quota, AdaptiveConfig::default().min_proposing);
        assert!(record.quota.data_starved);
        assert_eq!(record.quota.learning_cycles, 1);
    }

    #[test]
    fn test_measured_cycle_after_starved_cycle() {
        let c = controller();
        let mut record = record_with(&[None]);
        assert!(c.close_cycle(&mut record, 2_000).data_starved);

        record.quota.activate(10_000);
        record.proposals.record("q0", 10_000);
        record.proposals.set_verdict("q0", true);
        let entry = c.close_cycle(&mut record, 20_000);

        assert!(!entry.data_starved);
        assert_eq!(entry.success_rate, 100.0);
        assert_eq!(entry.effectiveness, 100.0);
    }

    #[test]
    fn test_starved_cycle_after_measured_cycle() {
        let c = controller();
        let mut record = record_with(&[Some(true), Some(true), Some(false), Some(false)]);
        // Quota 3: the last three count, one of them passed.
        let first = c.close_cycle(&mut record, 2_000);
        assert!((first.success_rate - 100.0 / 3.0).abs() < 1e-9);

        record.quota.activate(10_000);
        let entry = c.close_cycle(&mut record, 20_000);

        assert!(entry.data_starved);
        assert!((entry.effectiveness - (50.0 - 100.0 / 3.0)).abs() < 1e-9);
        assert_eq!(record.quota.learning_effectiveness, entry.effectiveness);
    }

    #[test]
    fn test_starved_cycle_after_perfect_cycle_scores_zero() {
        let c = controller();
        let mut record = record_with(&[Some(true), Some(true)]);
        assert_eq!(c.close_cycle(&mut record, 2_000).success_rate, 100.0);

        record.quota.activate(10_000);
        let entry = c.close_cycle(&mut record, 20_000);
        assert_eq!(entry.effectiveness, 0.0);
    }

    #[test]
    fn test_proposals_from_previous_cycle_are_ignored() {
        let c = controller();
        let mut record = record_with(&[]);
        record.proposals.record("old", 10);
        record.proposals.set_verdict("old", true);

        let entry = c.close_cycle(&mut record, 5_000);
        assert!(entry.data_starved);
    }

    #[test]
    fn test_tally_bounded_by_proposing_quota() {
        let c = controller();
        // Quota 3: only the three most recent count (all failed).
        let mut record = record_with(&[Some(true), Some(false), Some(false), Some(false)]);
        let entry = c.close_cycle(&mut record, 5_000);
        assert_eq!(entry.success_rate, 0.0);
        assert!(!entry.data_starved);
    }
}
