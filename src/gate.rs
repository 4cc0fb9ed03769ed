//! Mode gate: the global "is any activity permitted right now" decision.
//!
//! Strict override chain, first match wins:
//! 1. warp enabled → deny (`WARP_ACTIVE`)
//! 2. chaos enabled → permit (`CHAOS_OVERRIDE`), window ignored
//! 3. otherwise permit iff the local hour is inside the operating window
//!
//! The gate is a pure function of the mode flags and the time it is handed.
//! Callers evaluate it on every admission check.

use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};

use crate::config::WindowConfig;
use crate::domain::ModeState;

/// Why the gate permitted or denied activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateReason {
    WarpActive,
    ChaosOverride,
    OperatingWindow,
    OutsideWindow,
}

impl GateReason {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            GateReason::WarpActive => "WARP_ACTIVE",
            GateReason::ChaosOverride => "CHAOS_OVERRIDE",
            GateReason::OperatingWindow => "OPERATING_WINDOW",
            GateReason::OutsideWindow => "OUTSIDE_WINDOW",
        }
    }
}

impl std::fmt::Display for GateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The gate's answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateDecision {
    pub permitted: bool,
    pub reason: GateReason,
}

/// Hours of the day during which normal activity is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingWindow {
    start_hour: u32,
    end_hour: u32,
}

impl OperatingWindow {
    /// Window `[start_hour, end_hour)`. `start > end` wraps past midnight;
    /// `start == end` is never open.
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self { start_hour, end_hour }
    }

    /// Whether the given local hour falls inside the window.
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

impl From<WindowConfig> for OperatingWindow {
    fn from(config: WindowConfig) -> Self {
        Self::new(config.start_hour, config.end_hour)
    }
}

/// Evaluates mode overrides and the operating window.
#[derive(Debug, Clone, Copy)]
pub struct ModeGate {
    window: OperatingWindow,
}

impl ModeGate {
    /// Create a gate over the given operating window.
    pub fn new(window: OperatingWindow) -> Self {
        Self { window }
    }

    /// The operating window this gate checks against.
    pub fn window(&self) -> OperatingWindow {
        self.window
    }

    /// Whether `now` is inside the operating window, ignoring mode flags.
    pub fn is_within_operating_window(&self, now: DateTime<Local>) -> bool {
        self.window.contains(now.hour())
    }

    /// Decide whether activity is permitted at `now` under `modes`.
    pub fn is_activity_permitted(&self, modes: &ModeState, now: DateTime<Local>) -> GateDecision {
        self.decide(modes, now.hour())
    }

    /// Same decision, from an already-extracted local hour.
    pub fn decide(&self, modes: &ModeState, hour: u32) -> GateDecision {
        if modes.warp_enabled {
            return GateDecision {
                permitted: false,
                reason: GateReason::WarpActive,
            };
        }
        if modes.chaos_enabled {
            return GateDecision {
                permitted: true,
                reason: GateReason::ChaosOverride,
            };
        }
        if self.window.contains(hour) {
            GateDecision {
                permitted: true,
                reason: GateReason::OperatingWindow,
            }
        } else {
            GateDecision {
                permitted: false,
                reason: GateReason::OutsideWindow,
            }
        }
    }
}

impl Default for ModeGate {
    fn default() -> Self {
        Self::new(WindowConfig::default().into())
    }
}
