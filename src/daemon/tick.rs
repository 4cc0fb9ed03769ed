//! Tick - one iteration of the poll loop
//!
//! Each tick:
//! - Evaluates suppression trigger/release rules for every agent
//! - Resolves the active agent (cold-starting rotation if needed)
//! - Asks for admission in the agent's current phase
//! - If admitted, performs at most one unit of work and feeds the outcome back
//!
//! Collaborator failures become samples, never errors: a tick always returns
//! a report, and the next tick runs regardless.

use crate::collaborator::Collaborators;
use crate::domain::{Agent, Phase, ProduceOutcome, PublishOutcome, VerifyOutcome};
use crate::error::Result;
use crate::scheduler::{Admission, Coordinator, Denial, ProgressOutcome, SuppressionEvent};
use crate::store::StateStore;

/// What the tick did with the active agent.
#[derive(Debug, Clone, PartialEq)]
pub enum TickAction {
    /// Admission denied; nothing was called
    Denied { agent: Agent, phase: Phase, denial: Denial },
    /// Admitted, but there is no producer to call
    Idle { agent: Agent, phase: Phase },
    Produced {
        agent: Agent,
        outcome: ProduceOutcome,
        progress: Option<ProgressOutcome>,
    },
    /// `item` is `None` when nothing was waiting for verification
    Verified {
        agent: Agent,
        item: Option<String>,
        outcome: Option<VerifyOutcome>,
        progress: ProgressOutcome,
    },
    /// `item` is `None` when nothing approved was waiting to ship
    Published {
        agent: Agent,
        item: Option<String>,
        outcome: Option<PublishOutcome>,
        progress: ProgressOutcome,
    },
    /// The store failed; the tick stopped there
    StoreError(String),
}

impl TickAction {
    /// The progress recorded this tick, if any.
    pub fn progress(&self) -> Option<&ProgressOutcome> {
        match self {
            TickAction::Produced { progress, .. } => progress.as_ref(),
            TickAction::Verified { progress, .. } | TickAction::Published { progress, .. } => Some(progress),
            _ => None,
        }
    }

    /// Whether a cycle closed (and the turn rotated) this tick.
    pub fn closed_cycle(&self) -> bool {
        matches!(self.progress(), Some(ProgressOutcome::CycleClosed { .. }))
    }
}

/// Tick report: suppression changes plus the action taken
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Tick number since start
    pub tick: u64,
    /// Agents whose suppression flag changed
    pub suppression: Vec<(Agent, SuppressionEvent)>,
    pub action: TickAction,
}

/// Tick state tracks what's happening between ticks
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickState {
    /// Number of ticks since start
    pub tick_count: u64,
    /// Items accepted from the producer
    pub total_produced: u64,
    /// Items the verifier returned a verdict on
    pub total_verified: u64,
    /// Learning units processed
    pub total_published: u64,
    /// Failed collaborator calls
    pub total_failures: u64,
    /// Cycles closed
    pub cycles_closed: u64,
    /// Ticks cut short by a store error
    pub store_errors: u64,
}

impl TickState {
    /// Create a new tick state
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one report into the counters.
    pub fn record(&mut self, report: &TickReport) {
        match &report.action {
            TickAction::Produced { outcome, .. } => {
                if outcome.is_success() {
                    self.total_produced += 1;
                } else {
                    self.total_failures += 1;
                }
            }
            TickAction::Verified { outcome, .. } => {
                if let Some(outcome) = outcome {
                    self.total_verified += 1;
                    if !outcome.is_success() {
                        self.total_failures += 1;
                    }
                }
            }
            TickAction::Published { outcome, .. } => {
                self.total_published += 1;
                if outcome.as_ref().is_some_and(|o| !o.is_success()) {
                    self.total_failures += 1;
                }
            }
            TickAction::StoreError(_) => self.store_errors += 1,
            TickAction::Denied { .. } | TickAction::Idle { .. } => {}
        }
        if report.action.closed_cycle() {
            self.cycles_closed += 1;
        }
    }
}

/// Run one poll iteration.
pub async fn tick<S: StateStore>(
    coordinator: &Coordinator<S>,
    collaborators: &Collaborators,
    state: &mut TickState,
) -> TickReport {
    state.tick_count += 1;

    let mut suppression = Vec::new();
    let action = match step(coordinator, collaborators, &mut suppression).await {
        Ok(action) => action,
        Err(e) => {
            log::error!("Tick {} aborted by store error: {}", state.tick_count, e);
            TickAction::StoreError(e.to_string())
        }
    };

    let report = TickReport {
        tick: state.tick_count,
        suppression,
        action,
    };
    state.record(&report);
    report
}

async fn step<S: StateStore>(
    coordinator: &Coordinator<S>,
    collaborators: &Collaborators,
    suppression: &mut Vec<(Agent, SuppressionEvent)>,
) -> Result<TickAction> {
    suppression.extend(
        coordinator
            .poll_suppression()?
            .into_iter()
            .filter(|(_, event)| *event != SuppressionEvent::Unchanged),
    );

    let agent = coordinator.active_agent()?;
    let phase = coordinator
        .record(agent)?
        .map(|r| r.quota.phase)
        .unwrap_or_default();

    if let Admission::Denied(denial) = coordinator.admission(agent, phase)? {
        log::debug!("{} denied in {}: {:?}", agent, phase, denial);
        return Ok(TickAction::Denied { agent, phase, denial });
    }

    match phase {
        Phase::Proposing => propose(coordinator, collaborators, agent).await,
        Phase::Testing => verify(coordinator, collaborators, agent).await,
        Phase::Learning => publish(coordinator, collaborators, agent).await,
    }
}

async fn propose<S: StateStore>(
    coordinator: &Coordinator<S>,
    collaborators: &Collaborators,
    agent: Agent,
) -> Result<TickAction> {
    let Some(producer) = &collaborators.producer else {
        log::debug!("{} admitted to propose, but no producer is configured", agent);
        return Ok(TickAction::Idle {
            agent,
            phase: Phase::Proposing,
        });
    };

    let outcome = match producer.produce(agent).await {
        ProduceOutcome::Accepted(id) => {
            if coordinator.record_proposal(agent, &id)? {
                ProduceOutcome::Accepted(id)
            } else {
                log::info!("{} produced known item {}, counting as duplicate", agent, id);
                ProduceOutcome::Duplicate
            }
        }
        other => other,
    };

    coordinator.record_outcome(agent, Phase::Proposing, outcome.is_success())?;

    let progress = match &outcome {
        ProduceOutcome::Accepted(_) => Some(coordinator.increment_phase_progress(agent, Phase::Proposing)?),
        ProduceOutcome::Duplicate => None,
        ProduceOutcome::Error(e) => {
            log::warn!("{} producer failed: {}", agent, e);
            None
        }
    };

    Ok(TickAction::Produced {
        agent,
        outcome,
        progress,
    })
}

async fn verify<S: StateStore>(
    coordinator: &Coordinator<S>,
    collaborators: &Collaborators,
    agent: Agent,
) -> Result<TickAction> {
    let Some(item) = coordinator.next_to_verify(agent)? else {
        log::info!("{} has nothing to verify, counting an empty testing unit", agent);
        let progress = coordinator.increment_phase_progress(agent, Phase::Testing)?;
        return Ok(TickAction::Verified {
            agent,
            item: None,
            outcome: None,
            progress,
        });
    };

    let outcome = collaborators.verifier.verify(agent, &item).await;
    if let VerifyOutcome::Failed(reason) = &outcome {
        log::info!("{} item {} failed verification: {}", agent, item, reason);
    }
    coordinator.set_verdict(agent, &item, outcome.is_success())?;
    coordinator.record_outcome(agent, Phase::Testing, outcome.is_success())?;
    let progress = coordinator.increment_phase_progress(agent, Phase::Testing)?;

    Ok(TickAction::Verified {
        agent,
        item: Some(item),
        outcome: Some(outcome),
        progress,
    })
}

async fn publish<S: StateStore>(
    coordinator: &Coordinator<S>,
    collaborators: &Collaborators,
    agent: Agent,
) -> Result<TickAction> {
    let Some(item) = coordinator.next_to_publish(agent)? else {
        log::info!("{} has nothing approved to publish, counting an empty learning unit", agent);
        let progress = coordinator.increment_phase_progress(agent, Phase::Learning)?;
        return Ok(TickAction::Published {
            agent,
            item: None,
            outcome: None,
            progress,
        });
    };

    let outcome = collaborators.publisher.publish(agent, &item).await;
    match &outcome {
        PublishOutcome::Published => {
            coordinator.mark_published(agent, &item)?;
        }
        PublishOutcome::Failed(reason) => {
            log::warn!("{} failed to publish {}: {}", agent, item, reason);
        }
    }
    coordinator.record_outcome(agent, Phase::Learning, outcome.is_success())?;
    let progress = coordinator.increment_phase_progress(agent, Phase::Learning)?;

    Ok(TickAction::Published {
        agent,
        item: Some(item),
        outcome: Some(outcome),
        progress,
    })
}
