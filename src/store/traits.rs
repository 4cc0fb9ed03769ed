//! Store trait definitions and the in-transaction view of state.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::domain::{Agent, AgentRecord, ModeState, PhaseCounts};
use crate::error::Result;

/// Everything the scheduler reads and writes, as seen inside one transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    /// One record per agent that has been referenced so far
    pub records: BTreeMap<Agent, AgentRecord>,
    /// Global mode flags
    pub modes: ModeState,
}

impl Ledger {
    /// Get an agent's record, if it exists yet.
    pub fn get(&self, agent: Agent) -> Option<&AgentRecord> {
        self.records.get(&agent)
    }

    /// Get an agent's record, creating it with the given quotas on first reference.
    pub fn record_mut(&mut self, agent: Agent, quotas: PhaseCounts, now: i64) -> &mut AgentRecord {
        self.records
            .entry(agent)
            .or_insert_with(|| AgentRecord::new(agent, quotas, now))
    }

    /// Make sure every agent in the roster has a record.
    pub fn ensure_all(&mut self, quotas: PhaseCounts, now: i64) {
        for agent in Agent::ALL {
            self.record_mut(agent, quotas, now);
        }
    }

    /// Agents currently holding `cycle_active`, in rotation order.
    pub fn active_agents(&self) -> Vec<Agent> {
        self.records
            .values()
            .filter(|r| r.quota.cycle_active)
            .map(|r| r.agent)
            .collect()
    }

    /// Enforce "at most one active agent".
    ///
    /// When several records claim the turn, the one activated most recently
    /// keeps it (lowest rotation order on a tie). Returns the agents demoted.
    pub fn repair_exclusion(&mut self) -> Vec<Agent> {
        let keep = self
            .records
            .values()
            .filter(|r| r.quota.cycle_active)
            .min_by_key(|r| (Reverse(r.quota.last_active_at), r.rotation_order))
            .map(|r| r.agent);

        let mut demoted = Vec::new();
        for record in self.records.values_mut() {
            if record.quota.cycle_active && Some(record.agent) != keep {
                record.quota.deactivate();
                demoted.push(record.agent);
            }
        }
        demoted
    }

    /// Records that differ from (or are missing in) `before`.
    pub fn changed_since<'a>(&'a self, before: &Ledger) -> Vec<&'a AgentRecord> {
        self.records
            .values()
            .filter(|r| before.records.get(&r.agent) != Some(*r))
            .collect()
    }
}

/// Persistence for agent records and mode flags.
///
/// `transact` is the single serialized access path: the closure runs while
/// the store's writer lock is held, and its changes are persisted only if it
/// returns `Ok`. Implementations must never run two transactions at once.
pub trait StateStore: Send + Sync {
    /// Run a read-modify-write against the current state.
    fn transact<R>(&self, f: impl FnOnce(&mut Ledger) -> Result<R>) -> Result<R>;

    /// Read-only copy of the current state.
    fn snapshot(&self) -> Result<Ledger> {
        self.transact(|ledger| Ok(ledger.clone()))
    }
}
