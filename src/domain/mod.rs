//! Domain types for Turnkeeper
//!
//! This module contains all core domain types:
//! - Agent: the fixed, ordered set of schedulable identities
//! - Phase / PhaseCounts: cycle stages and their counters
//! - QuotaRecord: per-agent phase, quotas, progress and cycle metrics
//! - SuppressionState: the orthogonal learning-suppression flag
//! - ProposalLog: produced items with verdicts, read by quota adaptation
//! - AgentRecord / ModeState: what the store persists
//! - Outcomes reported by collaborators

pub mod agent;
pub mod outcome;
pub mod phase;
pub mod proposal;
pub mod quota;
pub mod record;
pub mod suppression;

pub use agent::Agent;
pub use outcome::{ProduceOutcome, PublishOutcome, VerifyOutcome};
pub use phase::{Phase, PhaseCounts};
pub use proposal::{PROPOSAL_LOG_LIMIT, Proposal, ProposalLog, Verdict, generate_item_id};
pub use quota::{PhaseStep, QuotaHistoryEntry, QuotaRecord};
pub use record::{AgentRecord, ModeState};
pub use suppression::{OutcomeSample, ReleaseReason, SuppressionState};
