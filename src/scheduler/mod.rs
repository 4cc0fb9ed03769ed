//! Scheduler: turn-based admission and quota control.
//!
//! This module provides:
//! - **TurnScheduler**: which single agent holds the shared resource, passed on in rotation order.
//! - **PhaseStateMachine**: Proposing → Testing → Learning per agent, each bounded by a quota,
//!   plus the `admission` decision collaborators must pass.
//! - **AdaptiveQuotaController**: re-derives the Proposing quota from each closed cycle's success rate.
//! - **LearningTriggerMonitor**: suppresses new work after a burst of failures, and releases it.
//! - **Coordinator**: runs all of the above against a [`StateStore`](crate::store::StateStore),
//!   one transaction per operation.
//!
//! # Example
//!
//! ```ignore
//! use turnkeeper::scheduler::Coordinator;
//!
//! let coordinator = Coordinator::new(store, Arc::new(SystemClock), &config);
//! let agent = coordinator.active_agent()?;
//! if coordinator.can_process(agent, Phase::Proposing) {
//!     // produce one item, then:
//!     coordinator.increment_phase_progress(agent, Phase::Proposing)?;
//! }
//! ```

mod adaptive;
mod coordinator;
mod phase;
mod suppression;
mod turn;

pub use adaptive::{AdaptiveQuotaController, EFFECTIVENESS_BASELINE, effectiveness};
pub use coordinator::Coordinator;
pub use phase::{Admission, Denial, PhaseStateMachine, ProgressOutcome, Violation};
pub use suppression::{LearningTriggerMonitor, SuppressionEvent};
pub use turn::TurnScheduler;
