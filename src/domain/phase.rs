//! Cycle phases and per-phase counters.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TurnkeeperError;

/// A stage within an agent's cycle.
///
/// Proposing → Testing → Learning, then the cycle closes and the turn rotates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Producing new candidate work items
    #[default]
    Proposing,
    /// Verifying produced items
    Testing,
    /// Publishing approved items and closing the cycle
    Learning,
}

impl Phase {
    /// All phases in cycle order.
    pub const ALL: [Phase; 3] = [Phase::Proposing, Phase::Testing, Phase::Learning];

    /// The phase that follows this one, or `None` when the cycle is complete.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Proposing => Some(Phase::Testing),
            Phase::Testing => Some(Phase::Learning),
            Phase::Learning => None,
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Proposing => "proposing",
            Phase::Testing => "testing",
            Phase::Learning => "learning",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Phase {
    type Err = TurnkeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TurnkeeperError::InvalidState(format!("Unknown phase: {}", s)))
    }
}

/// One counter per phase. Used for both quotas and progress.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PhaseCounts {
    pub proposing: u32,
    pub testing: u32,
    pub learning: u32,
}

impl PhaseCounts {
    /// Create counts from explicit values.
    pub fn new(proposing: u32, testing: u32, learning: u32) -> Self {
        Self {
            proposing,
            testing,
            learning,
        }
    }

    /// All counters at zero.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Read the counter for a phase.
    pub fn get(&self, phase: Phase) -> u32 {
        match phase {
            Phase::Proposing => self.proposing,
            Phase::Testing => self.testing,
            Phase::Learning => self.learning,
        }
    }

    /// Overwrite the counter for a phase.
    pub fn set(&mut self, phase: Phase, value: u32) {
        match phase {
            Phase::Proposing => self.proposing = value,
            Phase::Testing => self.testing = value,
            Phase::Learning => self.learning = value,
        }
    }

    /// Whether every counter is zero.
    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }
}
