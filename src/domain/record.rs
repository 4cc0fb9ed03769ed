//! The persisted per-agent record and the global mode flags.
//!
//! One `AgentRecord` per agent holds the quota record, the suppression state
//! and the proposal ledger, keyed by agent identity.

use serde::{Deserialize, Serialize};

use super::agent::Agent;
use super::phase::PhaseCounts;
use super::proposal::ProposalLog;
use super::quota::QuotaRecord;
use super::suppression::SuppressionState;

/// Everything the scheduler persists about one agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRecord {
    /// Agent identity, also the record key
    pub agent: Agent,

    /// Position in the rotation
    pub rotation_order: usize,

    /// Phase, quotas, progress and cycle metrics
    pub quota: QuotaRecord,

    /// Learning suppression flag and its inputs
    #[serde(default)]
    pub suppression: SuppressionState,

    /// Produced items of recent cycles
    #[serde(default)]
    pub proposals: ProposalLog,

    /// Unix timestamp in milliseconds
    pub updated_at: i64,
}

impl AgentRecord {
    /// Create a fresh, inactive record.
    pub fn new(agent: Agent, quotas: PhaseCounts, now: i64) -> Self {
        Self {
            agent,
            rotation_order: agent.rotation_order(),
            quota: QuotaRecord::new(quotas),
            suppression: SuppressionState::default(),
            proposals: ProposalLog::default(),
            updated_at: now,
        }
    }

    /// Record key used by the store.
    pub fn key(&self) -> &'static str {
        self.agent.as_str()
    }

    /// Update the timestamp.
    pub fn touch(&mut self, now: i64) {
        self.updated_at = now;
    }
}

/// Global override flags. Both may be set; the mode gate resolves conflicts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeState {
    /// Force-enable activity regardless of the operating window
    pub chaos_enabled: bool,
    /// Suspend all activity; beats chaos
    pub warp_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::phase::Phase;

    #[test]
    fn test_new_agent_record() {
        let record = AgentRecord::new(Agent::Sandbox, PhaseCounts::new(3, 3, 2), 42);
        assert_eq!(record.rotation_order, 2);
        assert_eq!(record.key(), "sandbox");
        assert_eq!(record.quota.phase, Phase::Proposing);
        assert!(!record.quota.cycle_active);
        assert!(!record.suppression.is_suppressed);
        assert_eq!(record.updated_at, 42);
    }

    #[test]
    fn test_agent_record_json_roundtrip() {
        let mut record = AgentRecord::new(Agent::Guardian, PhaseCounts::new(2, 2, 2), 1);
        record.quota.activate(5);
        record.suppression.trigger(6);
        record.proposals.record("item-1", 7);

        let json = serde_json::to_string(&record).unwrap();
        let restored: AgentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, restored);
    }

    #[test]
    fn test_mode_state_default_is_off() {
        let modes = ModeState::default();
        assert!(!modes.chaos_enabled);
        assert!(!modes.warp_enabled);
    }
}
