//! Collaborator ports.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::command::{CommandConfig, CommandProducer, CommandPublisher, CommandVerifier};
use crate::config::CollaboratorsConfig;
use crate::domain::{Agent, ProduceOutcome, PublishOutcome, VerifyOutcome};

/// Creates candidate work items.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Produce one item for `agent`.
    async fn produce(&self, agent: Agent) -> ProduceOutcome;
}

/// Tests one produced item.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, agent: Agent, item: &str) -> VerifyOutcome;
}

/// Ships one approved item.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, agent: Agent, item: &str) -> PublishOutcome;
}

/// Stand-in for an unconfigured verifier or publisher: everything passes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl Verifier for AutoApprove {
    async fn verify(&self, _agent: Agent, _item: &str) -> VerifyOutcome {
        VerifyOutcome::Passed
    }
}

#[async_trait]
impl Publisher for AutoApprove {
    async fn publish(&self, _agent: Agent, _item: &str) -> PublishOutcome {
        PublishOutcome::Published
    }
}

/// The set of collaborators one tick works with.
///
/// Without a producer nothing new is ever proposed, so the active agent
/// waits in Proposing.
#[derive(Clone)]
pub struct Collaborators {
    pub producer: Option<Arc<dyn Producer>>,
    pub verifier: Arc<dyn Verifier>,
    pub publisher: Arc<dyn Publisher>,
}

impl Collaborators {
    pub fn new(producer: Arc<dyn Producer>, verifier: Arc<dyn Verifier>, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            producer: Some(producer),
            verifier,
            publisher,
        }
    }

    /// Shell-command collaborators from configuration, run in `work_dir`.
    ///
    /// An empty command disables the producer, and auto-approves for the
    /// verifier and publisher.
    pub fn from_config(config: &CollaboratorsConfig, work_dir: &Path) -> Self {
        let command = |cmd: &str| {
            CommandConfig::new(cmd)
                .timeout_ms(config.timeout_ms)
                .work_dir(work_dir)
        };

        let producer: Option<Arc<dyn Producer>> = if config.produce.trim().is_empty() {
            None
        } else {
            Some(Arc::new(CommandProducer::new(command(&config.produce))))
        };
        let verifier: Arc<dyn Verifier> = if config.verify.trim().is_empty() {
            Arc::new(AutoApprove)
        } else {
            Arc::new(CommandVerifier::new(command(&config.verify)))
        };
        let publisher: Arc<dyn Publisher> = if config.publish.trim().is_empty() {
            Arc::new(AutoApprove)
        } else {
            Arc::new(CommandPublisher::new(command(&config.publish)))
        };

        Self {
            producer,
            verifier,
            publisher,
        }
    }
}
