use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use turnkeeper::clock::SystemClock;
use turnkeeper::collaborator::Collaborators;
use turnkeeper::config::Config;
use turnkeeper::daemon::{self, TickAction, TickReport};
use turnkeeper::scheduler::{Coordinator, ProgressOutcome};
use turnkeeper::status::StatusSnapshot;
use turnkeeper::store::SqliteStore;

fn setup_logging(config: &Config) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("turnkeeper")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("turnkeeper.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let default_level = config.log_level.as_deref().unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn project_dir(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().context("Failed to determine current directory"),
    }
}

fn open_coordinator(cli: &Cli, config: &Config) -> Result<Coordinator<SqliteStore>> {
    let project = project_dir(cli)?;
    let store = SqliteStore::open(&config.storage.state_dir, &project)
        .with_context(|| format!("Failed to open state store for {}", project.display()))?;
    info!("Using state store at {}", store.base_dir().display());
    Ok(Coordinator::new(store, Arc::new(SystemClock), config))
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    let coordinator = open_coordinator(cli, config)?;

    match &cli.command {
        Commands::Status { json } => handle_status_command(&coordinator, *json),
        Commands::Chaos { state } => {
            let modes = coordinator.set_chaos(state.enabled())?;
            println!("{} chaos {}", "Mode:".green(), on_off(modes.chaos_enabled));
            Ok(())
        }
        Commands::Warp { state } => {
            let modes = coordinator.set_warp(state.enabled())?;
            println!("{} warp {}", "Mode:".green(), on_off(modes.warp_enabled));
            Ok(())
        }
        Commands::Reset => {
            let reset = coordinator.reset()?;
            if reset.is_empty() {
                println!("{}", "No agent was active".dimmed());
            } else {
                for agent in reset {
                    println!("{} {}", "Deactivated:".yellow(), agent);
                }
            }
            Ok(())
        }
        Commands::Tick => {
            let project = project_dir(cli)?;
            let collaborators = Collaborators::from_config(&config.collaborators, &project);
            let mut state = daemon::TickState::new();
            let report = daemon::tick(&coordinator, &collaborators, &mut state).await;
            print_report(&report);
            Ok(())
        }
        Commands::Run { interval_ms } => {
            let project = project_dir(cli)?;
            let collaborators = Collaborators::from_config(&config.collaborators, &project);
            let interval = Duration::from_millis(interval_ms.unwrap_or(config.daemon.poll_interval_ms).max(1));
            println!("{} every {:?} (ctrl-c to stop)", "Polling".cyan(), interval);

            let state = daemon::run(&coordinator, &collaborators, interval).await;
            println!(
                "{} {} ticks, {} produced, {} verified, {} published, {} cycles closed, {} failures",
                "Stopped:".cyan(),
                state.tick_count,
                state.total_produced,
                state.total_verified,
                state.total_published,
                state.cycles_closed,
                state.total_failures
            );
            Ok(())
        }
    }
}

fn handle_status_command(coordinator: &Coordinator<SqliteStore>, json: bool) -> Result<()> {
    let status = coordinator.status()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

fn on_off(enabled: bool) -> ColoredString {
    if enabled { "on".green() } else { "off".dimmed() }
}

fn print_status(status: &StatusSnapshot) {
    let gate = if status.permitted {
        format!("permitted ({})", status.reason).green()
    } else {
        format!("denied ({})", status.reason).red()
    };
    println!("{} {}", "Gate:".bold(), gate);
    println!(
        "  chaos {}  warp {}  window {}",
        on_off(status.chaos_enabled),
        on_off(status.warp_enabled),
        if status.is_within_operating_window { "open".green() } else { "closed".dimmed() }
    );
    println!();

    println!(
        "{:<2} {:<10} {:<10} {:>9} {:>9} {:>9} {:>7} {:>7} {:>7}",
        "", "AGENT", "PHASE", "PROPOSING", "TESTING", "LEARNING", "SUCCESS", "EFFECT", "CYCLES"
    );
    for a in &status.agents {
        let marker = if a.cycle_active { "▶".green() } else { " ".normal() };
        let name = if a.is_suppressed {
            format!("{}*", a.agent).red()
        } else {
            a.agent.to_string().normal()
        };
        println!(
            "{:<2} {:<10} {:<10} {:>9} {:>9} {:>9} {:>6.1}% {:>7.1} {:>7}",
            marker,
            name,
            a.phase,
            format!("{}/{}", a.phase_progress.proposing, a.phase_quotas.proposing),
            format!("{}/{}", a.phase_progress.testing, a.phase_quotas.testing),
            format!("{}/{}", a.phase_progress.learning, a.phase_quotas.learning),
            a.success_rate,
            a.learning_effectiveness,
            a.learning_cycles
        );
    }
    if status.agents.iter().any(|a| a.is_suppressed) {
        println!();
        println!("{}", "* suppressed: new work generation paused".red());
    }
}

fn print_report(report: &TickReport) {
    for (agent, event) in &report.suppression {
        println!("{} {} {:?}", "Suppression:".yellow(), agent, event);
    }
    match &report.action {
        TickAction::Denied { agent, phase, denial } => {
            println!("{} {} in {}: {:?}", "Denied:".yellow(), agent, phase, denial);
        }
        TickAction::Idle { agent, phase } => {
            println!("{} {} admitted to {} but no collaborator is configured", "Idle:".dimmed(), agent, phase);
        }
        TickAction::Produced { agent, outcome, .. } => {
            println!("{} {} {:?}", "Produced:".green(), agent, outcome);
        }
        TickAction::Verified { agent, item, outcome, .. } => {
            println!("{} {} {:?} {:?}", "Verified:".green(), agent, item, outcome);
        }
        TickAction::Published { agent, item, outcome, .. } => {
            println!("{} {} {:?} {:?}", "Published:".green(), agent, item, outcome);
        }
        TickAction::StoreError(e) => {
            println!("{} {}", "Store error:".red(), e);
        }
    }
    if let Some(ProgressOutcome::CycleClosed { entry, next }) = report.action.progress() {
        println!(
            "{} success {:.1}%, next proposing quota {}, turn passes to {}",
            "Cycle closed:".cyan(),
            entry.success_rate,
            entry.quota,
            next
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(&config).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
