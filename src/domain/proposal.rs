//! Proposal ledger.
//!
//! Each agent keeps a bounded log of the items its producer created, with
//! the verifier's verdict and whether the publisher shipped them. The
//! adaptive quota controller reads its success rate from here.

use serde::{Deserialize, Serialize};

/// Maximum proposals kept per agent.
pub const PROPOSAL_LOG_LIMIT: usize = 200;

/// Verifier verdict on a proposal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    #[default]
    Pending,
    Passed,
    Failed,
}

/// A produced work item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Proposal {
    pub id: String,
    /// Unix timestamp in milliseconds
    pub created_at: i64,
    pub verdict: Verdict,
    pub published: bool,
}

/// Bounded, oldest-first log of proposals.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProposalLog {
    #[serde(default)]
    pub entries: Vec<Proposal>,
}

impl ProposalLog {
    /// Record a newly produced item. Returns false if the id is already known.
    pub fn record(&mut self, id: impl Into<String>, now: i64) -> bool {
        let id = id.into();
        if self.get(&id).is_some() {
            return false;
        }
        self.entries.push(Proposal {
            id,
            created_at: now,
            verdict: Verdict::Pending,
            published: false,
        });
        if self.entries.len() > PROPOSAL_LOG_LIMIT {
            let excess = self.entries.len() - PROPOSAL_LOG_LIMIT;
            self.entries.drain(..excess);
        }
        true
    }

    /// Look up a proposal by id.
    pub fn get(&self, id: &str) -> Option<&Proposal> {
        self.entries.iter().find(|p| p.id == id)
    }

    /// Set the verifier's verdict. Returns false if the id is unknown.
    pub fn set_verdict(&mut self, id: &str, passed: bool) -> bool {
        match self.entries.iter_mut().find(|p| p.id == id) {
            Some(p) => {
                p.verdict = if passed { Verdict::Passed } else { Verdict::Failed };
                true
            }
            None => false,
        }
    }

    /// Mark a proposal as shipped. Returns false if the id is unknown.
    pub fn mark_published(&mut self, id: &str) -> bool {
        match self.entries.iter_mut().find(|p| p.id == id) {
            Some(p) => {
                p.published = true;
                true
            }
            None => false,
        }
    }

    /// Proposals created at or after `since`, oldest first.
    pub fn since(&self, since: i64) -> impl Iterator<Item = &Proposal> {
        self.entries.iter().filter(move |p| p.created_at >= since)
    }

    /// Oldest unverified proposal of the current cycle.
    pub fn next_to_verify(&self, since: i64) -> Option<&Proposal> {
        self.since(since).find(|p| p.verdict == Verdict::Pending)
    }

    /// Oldest passed, unpublished proposal of the current cycle.
    pub fn next_to_publish(&self, since: i64) -> Option<&Proposal> {
        self.since(since)
            .find(|p| p.verdict == Verdict::Passed && !p.published)
    }

    /// `(approved, processed)` over the most recent `limit` proposals since `since`.
    ///
    /// Processed means the verifier returned a verdict; approved means it passed.
    pub fn tally(&self, since: i64, limit: usize) -> (u32, u32) {
        let window: Vec<&Proposal> = self.since(since).collect();
        let start = window.len().saturating_sub(limit);
        window[start..].iter().fold((0, 0), |(approved, processed), p| match p.verdict {
            Verdict::Passed => (approved + 1, processed + 1),
            Verdict::Failed => (approved, processed + 1),
            Verdict::Pending => (approved, processed),
        })
    }
}

/// Generate a unique item ID for producers that do not supply one.
///
/// Format: `item-{timestamp_ms}-{counter}`
pub fn generate_item_id(now: i64) -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("item-{}-{:04}", now, counter % 10000)
}
