//! Shell-command collaborators.
//!
//! Each call runs `sh -c <command>` with the agent, phase and (for verify and
//! publish) the item id in the environment. Exit status 0 means success.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::traits::{Producer, Publisher, Verifier};
use crate::domain::{Agent, Phase, ProduceOutcome, PublishOutcome, VerifyOutcome, generate_item_id};

/// Producer exit status meaning "generated something already seen".
pub const DUPLICATE_EXIT_CODE: i32 = 3;

const ENV_AGENT: &str = "TURNKEEPER_AGENT";
const ENV_PHASE: &str = "TURNKEEPER_PHASE";
const ENV_ITEM: &str = "TURNKEEPER_ITEM";

/// Configuration for a command collaborator
#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// The command to execute
    pub command: String,
    /// Working directory (inherited when unset)
    pub work_dir: Option<PathBuf>,
    /// Timeout in milliseconds
    pub timeout_ms: u64,
}

impl CommandConfig {
    /// Create a new command config with the given command
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            work_dir: None,
            timeout_ms: 300_000,
        }
    }

    /// Set the timeout in milliseconds
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the working directory
    pub fn work_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.work_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Execute the command with the given environment.
    async fn run(&self, env: &[(&str, &str)]) -> std::io::Result<std::process::Output> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&self.command);
        if let Some(dir) = &self.work_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn()?;

        let timeout = tokio::time::Duration::from_millis(self.timeout_ms);
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("Command timed out after {}ms", self.timeout_ms),
            )),
        }
    }
}

/// Describe a failed run: exit code plus trimmed stderr.
fn failure_message(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exit code {:?}", output.status.code())
    } else {
        format!("exit code {:?}: {}", output.status.code(), stderr)
    }
}

/// Producer backed by a shell command. The first stdout line is the item id.
pub struct CommandProducer {
    config: CommandConfig,
}

impl CommandProducer {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Producer for CommandProducer {
    async fn produce(&self, agent: Agent) -> ProduceOutcome {
        let env = [(ENV_AGENT, agent.as_str()), (ENV_PHASE, Phase::Proposing.as_str())];
        match self.config.run(&env).await {
            Ok(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let id = stdout.lines().next().map(str::trim).unwrap_or_default();
                if id.is_empty() {
                    ProduceOutcome::Accepted(generate_item_id(crate::clock::now_ms()))
                } else {
                    ProduceOutcome::Accepted(id.to_string())
                }
            }
            Ok(output) if output.status.code() == Some(DUPLICATE_EXIT_CODE) => ProduceOutcome::Duplicate,
            Ok(output) => ProduceOutcome::Error(failure_message(&output)),
            Err(e) => ProduceOutcome::Error(e.to_string()),
        }
    }
}

/// Verifier backed by a shell command.
pub struct CommandVerifier {
    config: CommandConfig,
}

impl CommandVerifier {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Verifier for CommandVerifier {
    async fn verify(&self, agent: Agent, item: &str) -> VerifyOutcome {
        let env = [
            (ENV_AGENT, agent.as_str()),
            (ENV_PHASE, Phase::Testing.as_str()),
            (ENV_ITEM, item),
        ];
        match self.config.run(&env).await {
            Ok(output) if output.status.success() => VerifyOutcome::Passed,
            Ok(output) => VerifyOutcome::Failed(failure_message(&output)),
            Err(e) => VerifyOutcome::Failed(e.to_string()),
        }
    }
}

/// Publisher backed by a shell command.
pub struct CommandPublisher {
    config: CommandConfig,
}

impl CommandPublisher {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Publisher for CommandPublisher {
    async fn publish(&self, agent: Agent, item: &str) -> PublishOutcome {
        let env = [
            (ENV_AGENT, agent.as_str()),
            (ENV_PHASE, Phase::Learning.as_str()),
            (ENV_ITEM, item),
        ];
        match self.config.run(&env).await {
            Ok(output) if output.status.success() => PublishOutcome::Published,
            Ok(output) => PublishOutcome::Failed(failure_message(&output)),
            Err(e) => PublishOutcome::Failed(e.to_string()),
        }
    }
}
