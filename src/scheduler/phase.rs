//! Phase state machine: Proposing → Testing → Learning → rotate.
//!
//! `increment_phase_progress` is the only thing that moves a record forward,
//! and `admission` is the only gate collaborators consult before working.

use super::adaptive::AdaptiveQuotaController;
use super::turn::TurnScheduler;
use crate::domain::{Agent, Phase, PhaseStep, QuotaHistoryEntry};
use crate::gate::{GateDecision, GateReason};
use crate::store::Ledger;

/// A progress report the state machine refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// Agent does not hold the turn
    Inactive,
    /// Reported phase is not the record's current phase
    WrongPhase { current: Phase },
}

/// Result of one `increment_phase_progress` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressOutcome {
    Counted { progress: u32, quota: u32 },
    Advanced { from: Phase, to: Phase },
    /// Learning quota reached: cycle measured, turn passed on
    CycleClosed { entry: QuotaHistoryEntry, next: Agent },
    /// Protocol violation; nothing was changed
    Ignored(Violation),
}

/// Why `can_process` said no.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    Gate(GateReason),
    Inactive,
    WrongPhase,
    QuotaReached,
    Suppressed,
}

/// The admission decision for one agent and phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Denied(Denial),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Drives per-agent phase progress and closes cycles.
#[derive(Debug, Clone)]
pub struct PhaseStateMachine {
    turns: TurnScheduler,
    adaptive: AdaptiveQuotaController,
}

impl PhaseStateMachine {
    pub fn new(turns: TurnScheduler, adaptive: AdaptiveQuotaController) -> Self {
        Self { turns, adaptive }
    }

    pub fn turns(&self) -> &TurnScheduler {
        &self.turns
    }

    /// Combine the gate decision with the agent's record.
    ///
    /// Admitted only when the gate permits, the agent holds the turn, the
    /// phase is current, its quota is not yet reached, and (for Proposing)
    /// the agent is not suppressed.
    pub fn admission(&self, ledger: &Ledger, gate: GateDecision, agent: Agent, phase: Phase) -> Admission {
        if !gate.permitted {
            return Admission::Denied(Denial::Gate(gate.reason));
        }
        let Some(record) = ledger.get(agent) else {
            return Admission::Denied(Denial::Inactive);
        };
        if !record.quota.cycle_active {
            return Admission::Denied(Denial::Inactive);
        }
        if record.quota.phase != phase {
            return Admission::Denied(Denial::WrongPhase);
        }
        if record.quota.remaining(phase) == 0 {
            return Admission::Denied(Denial::QuotaReached);
        }
        if phase == Phase::Proposing && record.suppression.is_suppressed {
            return Admission::Denied(Denial::Suppressed);
        }
        Admission::Admitted
    }

    /// Count one confirmed unit of work for `agent` in `phase`.
    ///
    /// Reports for an inactive agent or a non-current phase change nothing.
    /// Reaching the Learning quota closes the cycle and rotates the turn, all
    /// within the caller's transaction.
    pub fn increment_phase_progress(&self, ledger: &mut Ledger, agent: Agent, phase: Phase, now: i64) -> ProgressOutcome {
        self.turns.ensure_roster(ledger, now);
        let record = ledger.record_mut(agent, self.turns.initial_quotas(), now);

        if !record.quota.cycle_active {
            tracing::warn!(agent = %agent, phase = %phase, "Progress reported for inactive agent, ignoring");
            return ProgressOutcome::Ignored(Violation::Inactive);
        }
        if record.quota.phase != phase {
            let current = record.quota.phase;
            tracing::warn!(
                agent = %agent,
                phase = %phase,
                current = %current,
                "Progress reported for non-current phase, ignoring"
            );
            return ProgressOutcome::Ignored(Violation::WrongPhase { current });
        }

        let step = record.quota.record_progress();
        record.touch(now);

        match step {
            PhaseStep::Counted { progress, quota } => {
                tracing::debug!(agent = %agent, phase = %phase, progress, quota, "Progress counted");
                ProgressOutcome::Counted { progress, quota }
            }
            PhaseStep::Advanced { from, to } => {
                tracing::info!(agent = %agent, from = %from, to = %to, "Phase advanced");
                ProgressOutcome::Advanced { from, to }
            }
            PhaseStep::CycleComplete => {
                let entry = self.adaptive.close_cycle(record, now);
                let next = self.turns.rotate_to_next_agent(ledger, now);
                ProgressOutcome::CycleClosed { entry, next }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdaptiveConfig;
    use crate::domain::PhaseCounts;

    fn machine() -> PhaseStateMachine {
        PhaseStateMachine::new(
            TurnScheduler::new(PhaseCounts::new(2, 2, 2)),
            AdaptiveQuotaController::new(AdaptiveConfig::default()),
        )
    }

    fn open() -> GateDecision {
        GateDecision {
            permitted: true,
            reason: GateReason::OperatingWindow,
        }
    }

    fn started(m: &PhaseStateMachine) -> (Ledger, Agent) {
        let mut ledger = Ledger::default();
        let agent = m.turns().active_agent(&mut ledger, 0);
        (ledger, agent)
    }

    #[test]
    fn test_full_cycle_rotates() {
        let m = machine();
        let (mut ledger, a) = started(&m);

        assert_eq!(
            m.increment_phase_progress(&mut ledger, a, Phase::Proposing, 1),
            ProgressOutcome::Counted { progress: 1, quota: 2 }
        );
        assert_eq!(
            m.increment_phase_progress(&mut ledger, a, Phase::Proposing, 2),
            ProgressOutcome::Advanced {
                from: Phase::Proposing,
                to: Phase::Testing
            }
        );
        let record = ledger.get(a).unwrap();
        assert_eq!(record.quota.phase, Phase::Testing);
        assert_eq!(record.quota.phase_progress, PhaseCounts::new(2, 0, 0));

        m.increment_phase_progress(&mut ledger, a, Phase::Testing, 3);
        m.increment_phase_progress(&mut ledger, a, Phase::Testing, 4);
        m.increment_phase_progress(&mut ledger, a, Phase::Learning, 5);
        let outcome = m.increment_phase_progress(&mut ledger, a, Phase::Learning, 6);

        let ProgressOutcome::CycleClosed { entry, next } = outcome else {
            panic!("expected cycle close, got {:?}", outcome);
        };
        assert_eq!(next.rotation_order(), 1);
        assert!(entry.data_starved);
        assert!(!ledger.get(a).unwrap().quota.cycle_active);
        assert_eq!(ledger.get(a).unwrap().quota.learning_cycles, 1);

        let b = ledger.get(next).unwrap();
        assert!(b.quota.cycle_active);
        assert_eq!(b.quota.phase, Phase::Proposing);
        assert!(b.quota.phase_progress.is_zero());
    }

    #[test]
    fn test_wrong_phase_is_ignored() {
        let m = machine();
        let (mut ledger, a) = started(&m);
        let before = ledger.clone();

        assert_eq!(
            m.increment_phase_progress(&mut ledger, a, Phase::Testing, 1),
            ProgressOutcome::Ignored(Violation::WrongPhase {
                current: Phase::Proposing
            })
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_inactive_agent_is_ignored() {
        let m = machine();
        let (mut ledger, a) = started(&m);
        let before = ledger.clone();

        assert_eq!(
            m.increment_phase_progress(&mut ledger, a.next(), Phase::Proposing, 1),
            ProgressOutcome::Ignored(Violation::Inactive)
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_admission_checks() {
        let m = machine();
        let (mut ledger, a) = started(&m);

        assert!(m.admission(&ledger, open(), a, Phase::Proposing).is_admitted());
        assert_eq!(
            m.admission(&ledger, open(), a, Phase::Testing),
            Admission::Denied(Denial::WrongPhase)
        );
        assert_eq!(
            m.admission(&ledger, open(), a.next(), Phase::Proposing),
            Admission::Denied(Denial::Inactive)
        );

        let closed = GateDecision {
            permitted: false,
            reason: GateReason::WarpActive,
        };
        assert_eq!(
            m.admission(&ledger, closed, a, Phase::Proposing),
            Admission::Denied(Denial::Gate(GateReason::WarpActive))
        );

        ledger.record_mut(a, PhaseCounts::new(2, 2, 2), 0).suppression.trigger(1);
        assert_eq!(
            m.admission(&ledger, open(), a, Phase::Proposing),
            Admission::Denied(Denial::Suppressed)
        );
    }

    #[test]
    fn test_suppression_does_not_block_testing() {
        let m = machine();
        let (mut ledger, a) = started(&m);
        m.increment_phase_progress(&mut ledger, a, Phase::Proposing, 1);
        m.increment_phase_progress(&mut ledger, a, Phase::Proposing, 2);
        ledger.record_mut(a, PhaseCounts::new(2, 2, 2), 0).suppression.trigger(3);

        assert!(m.admission(&ledger, open(), a, Phase::Testing).is_admitted());
    }

    #[test]
    fn test_admission_denied_at_quota() {
        let m = machine();
        let (mut ledger, a) = started(&m);
        // Simulate a record stuck at quota without having advanced.
        ledger.record_mut(a, PhaseCounts::new(2, 2, 2), 0).quota.phase_progress.proposing = 2;
        assert_eq!(
            m.admission(&ledger, open(), a, Phase::Proposing),
            Admission::Denied(Denial::QuotaReached)
        );
    }
}
