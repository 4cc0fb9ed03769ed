//! Daemon - the interval-driven poll loop
//!
//! The daemon is the long-running process that calls [`tick`] on a fixed
//! interval until it is told to stop. All scheduling decisions live in the
//! coordinator; the daemon only supplies time and collaborators.

pub mod tick;

pub use tick::{TickAction, TickReport, TickState, tick};

use std::future::Future;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::MissedTickBehavior;

use crate::collaborator::Collaborators;
use crate::scheduler::Coordinator;
use crate::store::StateStore;

/// Tick every `poll_interval` until ctrl-c.
pub async fn run<S: StateStore>(
    coordinator: &Coordinator<S>,
    collaborators: &Collaborators,
    poll_interval: Duration,
) -> TickState {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };
    run_until(coordinator, collaborators, poll_interval, shutdown).await
}

/// Tick every `poll_interval` until `shutdown` completes.
///
/// A tick in progress is finished before shutdown is honored, and a
/// pending shutdown wins over a due tick.
pub async fn run_until<S: StateStore>(
    coordinator: &Coordinator<S>,
    collaborators: &Collaborators,
    poll_interval: Duration,
    shutdown: impl Future<Output = ()>,
) -> TickState {
    let mut state = TickState::new();
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!("Poll loop started, interval {:?}", poll_interval);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested after {} ticks", state.tick_count);
                break;
            }
            _ = interval.tick() => {
                let report = tick(coordinator, collaborators, &mut state).await;
                for (agent, event) in &report.suppression {
                    info!("{}: suppression {:?}", agent, event);
                }
                debug!("Tick {}: {:?}", report.tick, report.action);
            }
        }
    }

    state
}
