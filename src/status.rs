//! Operator status snapshot.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::domain::{Agent, Phase, PhaseCounts};
use crate::gate::{GateReason, ModeGate};
use crate::scheduler::LearningTriggerMonitor;
use crate::store::Ledger;

/// One agent's row in the status report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentStatus {
    pub agent: Agent,
    pub rotation_order: usize,
    pub phase: Phase,
    pub phase_progress: PhaseCounts,
    pub phase_quotas: PhaseCounts,
    pub cycle_active: bool,
    pub is_suppressed: bool,
    pub trigger_count_24h: usize,
    pub success_rate: f64,
    pub learning_effectiveness: f64,
    pub learning_cycles: u32,
    pub data_starved: bool,
    pub last_active_at: Option<i64>,
}

/// Every agent plus the global gate state, as of `generated_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub agents: Vec<AgentStatus>,
    pub chaos_enabled: bool,
    pub warp_enabled: bool,
    pub is_within_operating_window: bool,
    pub permitted: bool,
    pub reason: GateReason,
    /// Unix timestamp in milliseconds
    pub generated_at: i64,
}

impl StatusSnapshot {
    pub fn build(ledger: &Ledger, gate: &ModeGate, monitor: &LearningTriggerMonitor, now: DateTime<Local>) -> Self {
        let now_ms = now.timestamp_millis();
        let decision = gate.is_activity_permitted(&ledger.modes, now);

        let agents = ledger
            .records
            .values()
            .map(|r| AgentStatus {
                agent: r.agent,
                rotation_order: r.rotation_order,
                phase: r.quota.phase,
                phase_progress: r.quota.phase_progress,
                phase_quotas: r.quota.phase_quotas,
                cycle_active: r.quota.cycle_active,
                is_suppressed: r.suppression.is_suppressed,
                trigger_count_24h: monitor.trigger_count_24h(&r.suppression, now_ms),
                success_rate: r.quota.success_rate,
                learning_effectiveness: r.quota.learning_effectiveness,
                learning_cycles: r.quota.learning_cycles,
                data_starved: r.quota.data_starved,
                last_active_at: r.quota.last_active_at,
            })
            .collect();

        Self {
            agents,
            chaos_enabled: ledger.modes.chaos_enabled,
            warp_enabled: ledger.modes.warp_enabled,
            is_within_operating_window: gate.is_within_operating_window(now),
            permitted: decision.permitted,
            reason: decision.reason,
            generated_at: now_ms,
        }
    }

    /// The agent holding the turn, if any.
    pub fn active_agent(&self) -> Option<&AgentStatus> {
        self.agents.iter().find(|a| a.cycle_active)
    }
}
