//! Quota records: per-agent phase, quotas, progress and cycle metrics.
//!
//! The mutators here keep two invariants local to a record: progress for the
//! current phase never exceeds its quota, and reaching the quota is the only
//! way the phase advances. The cross-agent invariant (at most one active
//! record) lives in the scheduler.

use serde::{Deserialize, Serialize};

use super::phase::{Phase, PhaseCounts};

/// One closed cycle, kept for observability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotaHistoryEntry {
    /// Proposing quota chosen for the next cycle
    pub quota: u32,
    /// Success rate of the cycle that just closed (0-100)
    pub success_rate: f64,
    /// Learning effectiveness of the cycle that just closed (0-100)
    pub effectiveness: f64,
    /// Closed without any processed proposals
    #[serde(default)]
    pub data_starved: bool,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

/// Result of recording one unit of progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStep {
    /// Progress counted, quota not yet reached
    Counted { progress: u32, quota: u32 },
    /// Quota reached, phase moved forward
    Advanced { from: Phase, to: Phase },
    /// Learning quota reached, the cycle is complete
    CycleComplete,
}

/// Durable per-agent scheduling state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotaRecord {
    /// Current phase
    pub phase: Phase,

    /// Target count per phase
    pub phase_quotas: PhaseCounts,

    /// Units processed per phase in the current cycle
    pub phase_progress: PhaseCounts,

    /// Holds the turn on the shared resource
    pub cycle_active: bool,

    /// Unix ms of the last activation
    pub last_active_at: Option<i64>,

    /// Unix ms of the current cycle's reset
    pub cycle_started_at: Option<i64>,

    /// Completed full cycles
    pub learning_cycles: u32,

    /// Success rate of the last closed cycle (0-100)
    pub success_rate: f64,

    /// Learning effectiveness of the last closed cycle (0-100)
    pub learning_effectiveness: f64,

    /// Last closed cycle had no processed proposals
    #[serde(default)]
    pub data_starved: bool,

    /// Bounded log of closed cycles, oldest first
    #[serde(default)]
    pub quota_history: Vec<QuotaHistoryEntry>,
}

impl QuotaRecord {
    /// Create an inactive record with the given quotas.
    pub fn new(phase_quotas: PhaseCounts) -> Self {
        Self {
            phase: Phase::Proposing,
            phase_quotas,
            phase_progress: PhaseCounts::zero(),
            cycle_active: false,
            last_active_at: None,
            cycle_started_at: None,
            learning_cycles: 0,
            success_rate: 0.0,
            learning_effectiveness: 0.0,
            data_starved: false,
            quota_history: Vec::new(),
        }
    }

    /// Take the turn: start a fresh cycle at Proposing.
    pub fn activate(&mut self, now: i64) {
        self.cycle_active = true;
        self.reset_cycle();
        self.last_active_at = Some(now);
        self.cycle_started_at = Some(now);
    }

    /// Give up the turn. Counters are left as they are.
    pub fn deactivate(&mut self) {
        self.cycle_active = false;
    }

    /// Back to Proposing with all progress cleared.
    pub fn reset_cycle(&mut self) {
        self.phase = Phase::Proposing;
        self.phase_progress = PhaseCounts::zero();
    }

    /// Units left before the given phase's quota is reached.
    pub fn remaining(&self, phase: Phase) -> u32 {
        self.phase_quotas.get(phase).saturating_sub(self.phase_progress.get(phase))
    }

    /// Count one unit of work in the current phase, advancing on quota.
    ///
    /// On cycle completion the phase and progress are left at Learning/full;
    /// the caller closes the cycle and then calls [`reset_cycle`](Self::reset_cycle).
    pub fn record_progress(&mut self) -> PhaseStep {
        let phase = self.phase;
        let quota = self.phase_quotas.get(phase);
        let progress = (self.phase_progress.get(phase) + 1).min(quota);
        self.phase_progress.set(phase, progress);

        if progress < quota {
            return PhaseStep::Counted { progress, quota };
        }

        match phase.next() {
            Some(next) => {
                self.phase = next;
                PhaseStep::Advanced { from: phase, to: next }
            }
            None => PhaseStep::CycleComplete,
        }
    }

    /// Record a closed cycle and adopt the next Proposing quota.
    pub fn close_cycle(&mut self, entry: QuotaHistoryEntry, history_limit: usize) {
        self.phase_quotas.proposing = entry.quota;
        self.success_rate = entry.success_rate;
        self.learning_effectiveness = entry.effectiveness;
        self.data_starved = entry.data_starved;
        self.learning_cycles += 1;

        self.quota_history.push(entry);
        if self.quota_history.len() > history_limit {
            let excess = self.quota_history.len() - history_limit;
            self.quota_history.drain(..excess);
        }
    }
}
