//! Turnkeeper - turn-based admission and quota scheduler
//!
//! Turnkeeper decides which single agent of a small fixed pool may act on a
//! shared, rate-limited resource, in which phase, how much it may do before
//! yielding, and when all activity is suspended or force-enabled.

pub mod clock;
pub mod collaborator;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod gate;
pub mod scheduler;
pub mod status;
pub mod store;

pub use error::{Result, TurnkeeperError};
