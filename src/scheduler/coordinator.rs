//! Coordinator: the scheduler's public face.
//!
//! Wraps every operation in one store transaction so check-compare-write
//! sequences are atomic, reads the time from an injected clock, and turns
//! store failures into "deny" on the admission path.

use std::sync::Arc;

use super::adaptive::AdaptiveQuotaController;
use super::phase::{Admission, PhaseStateMachine, ProgressOutcome};
use super::suppression::{LearningTriggerMonitor, SuppressionEvent};
use super::turn::TurnScheduler;
use crate::clock::Clock;
use crate::config::Config;
use crate::domain::{Agent, AgentRecord, ModeState, Phase};
use crate::error::Result;
use crate::gate::{GateDecision, ModeGate};
use crate::status::StatusSnapshot;
use crate::store::{Ledger, StateStore};

/// Turn-based admission and quota scheduler over a state store.
pub struct Coordinator<S: StateStore> {
    store: S,
    clock: Arc<dyn Clock>,
    gate: ModeGate,
    phases: PhaseStateMachine,
    monitor: LearningTriggerMonitor,
}

impl<S: StateStore> Coordinator<S> {
    /// Build a coordinator from configuration.
    pub fn new(store: S, clock: Arc<dyn Clock>, config: &Config) -> Self {
        let turns = TurnScheduler::new(config.quotas.as_counts());
        let adaptive = AdaptiveQuotaController::new(config.adaptive.clone());
        Self {
            store,
            clock,
            gate: ModeGate::new(config.window.into()),
            phases: PhaseStateMachine::new(turns, adaptive),
            monitor: LearningTriggerMonitor::new(config.suppression.clone()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn gate(&self) -> &ModeGate {
        &self.gate
    }

    fn turns(&self) -> &TurnScheduler {
        self.phases.turns()
    }

    /// The gate's decision right now, from the stored mode flags.
    pub fn is_activity_permitted(&self) -> Result<GateDecision> {
        let modes = self.store.snapshot()?.modes;
        Ok(self.gate.is_activity_permitted(&modes, self.clock.now()))
    }

    /// The agent holding the turn; cold-starts agent 0 if nobody does.
    pub fn active_agent(&self) -> Result<Agent> {
        let now = self.clock.now_ms();
        self.store.transact(|ledger| Ok(self.turns().active_agent(ledger, now)))
    }

    /// Full admission decision, with the reason on denial.
    pub fn admission(&self, agent: Agent, phase: Phase) -> Result<Admission> {
        let now = self.clock.now();
        self.store.transact(|ledger| {
            let decision = self.gate.is_activity_permitted(&ledger.modes, now);
            Ok(self.phases.admission(ledger, decision, agent, phase))
        })
    }

    /// The single gate collaborators must pass. Fails closed on store errors.
    pub fn can_process(&self, agent: Agent, phase: Phase) -> bool {
        match self.admission(agent, phase) {
            Ok(admission) => admission.is_admitted(),
            Err(e) => {
                tracing::error!(agent = %agent, phase = %phase, error = %e, "Store error during admission check, denying");
                false
            }
        }
    }

    /// Count one confirmed unit of work. Closes and rotates on cycle end.
    pub fn increment_phase_progress(&self, agent: Agent, phase: Phase) -> Result<ProgressOutcome> {
        let now = self.clock.now_ms();
        self.store
            .transact(|ledger| Ok(self.phases.increment_phase_progress(ledger, agent, phase, now)))
    }

    /// Feed one collaborator outcome to the trigger monitor.
    pub fn record_outcome(&self, agent: Agent, phase: Phase, success: bool) -> Result<()> {
        let now = self.clock.now_ms();
        self.store.transact(|ledger| {
            let record = ledger.record_mut(agent, self.turns().initial_quotas(), now);
            self.monitor.record_outcome(&mut record.suppression, success, phase, now);
            record.touch(now);
            Ok(())
        })
    }

    /// Evaluate trigger/release rules for one agent.
    pub fn evaluate_suppression(&self, agent: Agent) -> Result<SuppressionEvent> {
        let now = self.clock.now_ms();
        self.store.transact(|ledger| Ok(self.evaluate_in(ledger, agent, now)))
    }

    /// Evaluate trigger/release rules for every agent, in one transaction.
    pub fn poll_suppression(&self) -> Result<Vec<(Agent, SuppressionEvent)>> {
        let now = self.clock.now_ms();
        self.store.transact(|ledger| {
            self.turns().ensure_roster(ledger, now);
            Ok(Agent::ALL
                .iter()
                .map(|agent| (*agent, self.evaluate_in(ledger, *agent, now)))
                .collect())
        })
    }

    fn evaluate_in(&self, ledger: &mut Ledger, agent: Agent, now: i64) -> SuppressionEvent {
        let record = ledger.record_mut(agent, self.turns().initial_quotas(), now);
        let before = record.suppression.clone();
        let event = self.monitor.evaluate(&mut record.suppression, now);
        if record.suppression != before {
            record.touch(now);
        }
        match event {
            SuppressionEvent::Triggered => {
                tracing::warn!(
                    agent = %agent,
                    triggers_24h = self.monitor.trigger_count_24h(&record.suppression, now),
                    "Failure rate too high, suppressing new work"
                );
            }
            SuppressionEvent::Released(reason) => {
                tracing::info!(agent = %agent, reason = %reason, "Suppression released");
            }
            SuppressionEvent::Unchanged => {}
        }
        event
    }

    /// Record an item the producer created. False if the id was already known.
    pub fn record_proposal(&self, agent: Agent, id: &str) -> Result<bool> {
        let now = self.clock.now_ms();
        self.store.transact(|ledger| {
            let record = ledger.record_mut(agent, self.turns().initial_quotas(), now);
            let added = record.proposals.record(id, now);
            if added {
                record.touch(now);
            }
            Ok(added)
        })
    }

    /// Store the verifier's verdict. False if the id is unknown.
    pub fn set_verdict(&self, agent: Agent, id: &str, passed: bool) -> Result<bool> {
        let now = self.clock.now_ms();
        self.store.transact(|ledger| {
            let record = ledger.record_mut(agent, self.turns().initial_quotas(), now);
            let found = record.proposals.set_verdict(id, passed);
            if found {
                record.touch(now);
            }
            Ok(found)
        })
    }

    /// Mark an item as shipped. False if the id is unknown.
    pub fn mark_published(&self, agent: Agent, id: &str) -> Result<bool> {
        let now = self.clock.now_ms();
        self.store.transact(|ledger| {
            let record = ledger.record_mut(agent, self.turns().initial_quotas(), now);
            let found = record.proposals.mark_published(id);
            if found {
                record.touch(now);
            }
            Ok(found)
        })
    }

    /// Oldest unverified item of the agent's current cycle.
    pub fn next_to_verify(&self, agent: Agent) -> Result<Option<String>> {
        let ledger = self.store.snapshot()?;
        Ok(ledger.get(agent).and_then(|r| {
            let since = r.quota.cycle_started_at.unwrap_or(i64::MIN);
            r.proposals.next_to_verify(since).map(|p| p.id.clone())
        }))
    }

    /// Oldest approved, unpublished item of the agent's current cycle.
    pub fn next_to_publish(&self, agent: Agent) -> Result<Option<String>> {
        let ledger = self.store.snapshot()?;
        Ok(ledger.get(agent).and_then(|r| {
            let since = r.quota.cycle_started_at.unwrap_or(i64::MIN);
            r.proposals.next_to_publish(since).map(|p| p.id.clone())
        }))
    }

    /// A copy of one agent's stored record.
    pub fn record(&self, agent: Agent) -> Result<Option<AgentRecord>> {
        Ok(self.store.snapshot()?.get(agent).cloned())
    }

    /// Current mode flags.
    pub fn modes(&self) -> Result<ModeState> {
        Ok(self.store.snapshot()?.modes)
    }

    /// Force-enable (or stop force-enabling) activity outside the window.
    pub fn set_chaos(&self, enabled: bool) -> Result<ModeState> {
        let modes = self.store.transact(|ledger| {
            ledger.modes.chaos_enabled = enabled;
            Ok(ledger.modes)
        })?;
        tracing::info!(enabled, "Chaos mode set");
        Ok(modes)
    }

    /// Suspend (or resume) all activity.
    pub fn set_warp(&self, enabled: bool) -> Result<ModeState> {
        let modes = self.store.transact(|ledger| {
            ledger.modes.warp_enabled = enabled;
            Ok(ledger.modes)
        })?;
        tracing::info!(enabled, "Warp mode set");
        Ok(modes)
    }

    /// Deactivate every agent; the next `active_agent` cold-starts agent 0.
    pub fn reset(&self) -> Result<Vec<Agent>> {
        let now = self.clock.now_ms();
        self.store.transact(|ledger| Ok(self.turns().reset(ledger, now)))
    }

    /// Operator status: every agent plus the global gate state.
    pub fn status(&self) -> Result<StatusSnapshot> {
        let now = self.clock.now();
        self.store.transact(|ledger| {
            self.turns().ensure_roster(ledger, now.timestamp_millis());
            Ok(StatusSnapshot::build(ledger, &self.gate, &self.monitor, now))
        })
    }
}
