//! Collaborator outcome types.
//!
//! What the producer, verifier and publisher report back after a call.
//! Every outcome becomes one sample for the learning trigger monitor.

/// Outcome of asking the producer for a new item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProduceOutcome {
    /// A new item was accepted, with its id
    Accepted(String),
    /// The producer generated something already seen
    Duplicate,
    /// The producer failed
    Error(String),
}

impl ProduceOutcome {
    /// Whether this counts as a success sample.
    pub fn is_success(&self) -> bool {
        matches!(self, ProduceOutcome::Accepted(_))
    }
}

/// Outcome of verifying one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Passed,
    Failed(String),
}

impl VerifyOutcome {
    /// Whether the item passed.
    pub fn is_success(&self) -> bool {
        matches!(self, VerifyOutcome::Passed)
    }
}

/// Outcome of publishing one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    Failed(String),
}

impl PublishOutcome {
    /// Whether the item shipped.
    pub fn is_success(&self) -> bool {
        matches!(self, PublishOutcome::Published)
    }
}
