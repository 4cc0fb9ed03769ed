//! Turn scheduling: which single agent holds the shared resource.
//!
//! The turn passes strictly in rotation order, and only when the holder
//! finishes a full cycle. Everything here runs inside one store transaction,
//! so "find the holder, else activate agent 0" cannot race with itself.

use crate::domain::{Agent, PhaseCounts};
use crate::store::Ledger;

/// Picks and rotates the active agent.
#[derive(Debug, Clone, Copy)]
pub struct TurnScheduler {
    /// Quotas given to records created on first reference
    initial_quotas: PhaseCounts,
}

impl TurnScheduler {
    /// Create a scheduler that seeds new records with the given quotas.
    pub fn new(initial_quotas: PhaseCounts) -> Self {
        Self { initial_quotas }
    }

    /// Quotas for freshly created records.
    pub fn initial_quotas(&self) -> PhaseCounts {
        self.initial_quotas
    }

    /// Make sure every agent in the roster has a record.
    pub fn ensure_roster(&self, ledger: &mut Ledger, now: i64) {
        ledger.ensure_all(self.initial_quotas, now);
    }

    /// The agent currently holding the turn, activating agent 0 on a cold start.
    pub fn active_agent(&self, ledger: &mut Ledger, now: i64) -> Agent {
        self.ensure_roster(ledger, now);

        if let Some(agent) = ledger.active_agents().first().copied() {
            return agent;
        }

        let first = Agent::from_order(0);
        let record = ledger.record_mut(first, self.initial_quotas, now);
        record.quota.activate(now);
        record.touch(now);

        tracing::info!(agent = %first, "No active agent, cold-starting rotation");
        first
    }

    /// Pass the turn from the current holder to the next agent in order.
    ///
    /// Only the phase state machine calls this, on cycle completion. The
    /// rotation is recorded even when the mode gate currently denies activity.
    pub fn rotate_to_next_agent(&self, ledger: &mut Ledger, now: i64) -> Agent {
        let current = self.active_agent(ledger, now);

        let record = ledger.record_mut(current, self.initial_quotas, now);
        record.quota.deactivate();
        record.quota.reset_cycle();
        record.touch(now);

        let next = current.next();
        let record = ledger.record_mut(next, self.initial_quotas, now);
        record.quota.activate(now);
        record.touch(now);

        tracing::info!(from = %current, to = %next, "Rotated turn");
        next
    }

    /// Take the turn away from everyone. Counters are left untouched.
    ///
    /// Returns the agents that were active.
    pub fn reset(&self, ledger: &mut Ledger, now: i64) -> Vec<Agent> {
        let active = ledger.active_agents();
        for agent in &active {
            let record = ledger.record_mut(*agent, self.initial_quotas, now);
            record.quota.deactivate();
            record.touch(now);
        }
        if !active.is_empty() {
            tracing::info!(agents = ?active, "Reset: deactivated all agents");
        }
        active
    }
}
