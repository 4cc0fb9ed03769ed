//! Agent identities.
//!
//! The agent set is closed and fixed at compile time. Each agent owns a
//! distinct rotation order in `[0, N)`, and rotation always moves to
//! `(order + 1) mod N`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TurnkeeperError;

/// One of the schedulable agents competing for the shared generation budget.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Agent {
    Imperium,
    Guardian,
    Sandbox,
    Conquest,
}

impl Agent {
    /// Every agent, indexed by rotation order.
    pub const ALL: [Agent; 4] = [Agent::Imperium, Agent::Guardian, Agent::Sandbox, Agent::Conquest];

    /// Number of agents in the rotation.
    pub const fn count() -> usize {
        Self::ALL.len()
    }

    /// Position of this agent in the rotation.
    pub fn rotation_order(&self) -> usize {
        match self {
            Agent::Imperium => 0,
            Agent::Guardian => 1,
            Agent::Sandbox => 2,
            Agent::Conquest => 3,
        }
    }

    /// Agent holding the given rotation order (wraps modulo N).
    pub fn from_order(order: usize) -> Agent {
        Self::ALL[order % Self::count()]
    }

    /// The agent that takes the turn after this one.
    pub fn next(&self) -> Agent {
        Self::from_order(self.rotation_order() + 1)
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Agent::Imperium => "imperium",
            Agent::Guardian => "guardian",
            Agent::Sandbox => "sandbox",
            Agent::Conquest => "conquest",
        }
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Agent {
    type Err = TurnkeeperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TurnkeeperError::InvalidState(format!("Unknown agent: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_orders_are_distinct_and_dense() {
        let mut orders: Vec<usize> = Agent::ALL.iter().map(|a| a.rotation_order()).collect();
        orders.sort();
        assert_eq!(orders, (0..Agent::count()).collect::<Vec<_>>());
    }

    #[test]
    fn test_all_is_indexed_by_order() {
        for (i, agent) in Agent::ALL.iter().enumerate() {
            assert_eq!(agent.rotation_order(), i);
            assert_eq!(Agent::from_order(i), *agent);
        }
    }

    #[test]
    fn test_next_wraps_around() {
        assert_eq!(Agent::Imperium.next(), Agent::Guardian);
        assert_eq!(Agent::Sandbox.next(), Agent::Conquest);
        assert_eq!(Agent::Conquest.next(), Agent::Imperium);
    }

    #[test]
    fn test_full_rotation_returns_home() {
        let mut agent = Agent::Imperium;
        for _ in 0..Agent::count() {
            agent = agent.next();
        }
        assert_eq!(agent, Agent::Imperium);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("guardian".parse::<Agent>().unwrap(), Agent::Guardian);
        assert_eq!(" Conquest ".parse::<Agent>().unwrap(), Agent::Conquest);
        assert!("horus".parse::<Agent>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Agent::Sandbox).unwrap();
        assert_eq!(json, "\"sandbox\"");
    }
}
