//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - status: per-agent scheduler state and the gate decision
//! - chaos / warp: operator mode overrides
//! - reset: take the turn away from every agent
//! - tick: run one poll iteration
//! - run: poll until ctrl-c

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Turnkeeper - turn-based admission and quota scheduler
#[derive(Parser, Debug)]
#[command(name = "turnkeeper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Project directory whose state to use (defaults to the current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// On/off switch for mode overrides
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn enabled(self) -> bool {
        self == Switch::On
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show every agent's phase, progress and quotas, and the gate decision
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Force-enable activity outside the operating window
    Chaos {
        #[arg(value_enum)]
        state: Switch,
    },

    /// Suspend all activity (beats chaos)
    Warp {
        #[arg(value_enum)]
        state: Switch,
    },

    /// Deactivate every agent; the next tick restarts rotation at the first agent
    Reset,

    /// Run a single poll iteration
    Tick,

    /// Run the poll loop until ctrl-c
    Run {
        /// Override the configured poll interval (milliseconds)
        #[arg(short, long)]
        interval_ms: Option<u64>,
    },
}
