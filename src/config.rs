//! Configuration for Turnkeeper.
//!
//! Loaded from YAML with a fallback chain:
//! 1. Explicit path if provided
//! 2. ./turnkeeper.yml
//! 3. ~/.config/turnkeeper/turnkeeper.yml
//! 4. Defaults

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::PhaseCounts;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub log_level: Option<String>,
    pub window: WindowConfig,
    pub quotas: QuotaConfig,
    pub adaptive: AdaptiveConfig,
    pub suppression: SuppressionConfig,
    pub daemon: DaemonConfig,
    pub storage: StorageConfig,
    pub collaborators: CollaboratorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            window: WindowConfig::default(),
            quotas: QuotaConfig::default(),
            adaptive: AdaptiveConfig::default(),
            suppression: SuppressionConfig::default(),
            daemon: DaemonConfig::default(),
            storage: StorageConfig::default(),
            collaborators: CollaboratorsConfig::default(),
        }
    }
}

/// Local-time operating window, `[start_hour, end_hour)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct WindowConfig {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start_hour: 6,
            end_hour: 22,
        }
    }
}

/// Initial per-phase quotas. Proposing adapts after every cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct QuotaConfig {
    pub proposing: u32,
    pub testing: u32,
    pub learning: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            proposing: 3,
            testing: 3,
            learning: 2,
        }
    }
}

impl QuotaConfig {
    /// Quotas as phase counts.
    pub fn as_counts(&self) -> PhaseCounts {
        PhaseCounts::new(self.proposing, self.testing, self.learning)
    }
}

/// Tunable coefficients for Proposing quota adaptation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct AdaptiveConfig {
    /// Floor for the Proposing quota; also used for data-starved cycles
    pub min_proposing: u32,
    /// Ceiling for the Proposing quota
    pub max_proposing: u32,
    /// Closed cycles kept in quota history
    pub history_limit: usize,
    /// Success-rate change (points) that counts as a strong move
    pub strong_improvement: f64,
    /// Success rate (percent) that earns an extra unit
    pub high_success: f64,
    /// Success rate (percent) that costs a unit
    pub low_success: f64,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            min_proposing: 1,
            max_proposing: 10,
            history_limit: 20,
            strong_improvement: 10.0,
            high_success: 80.0,
            low_success: 20.0,
        }
    }
}

/// Thresholds for the learning trigger monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct SuppressionConfig {
    /// Trailing window for samples and trigger counting
    pub window_hours: u32,
    /// Samples needed before a trigger is considered
    pub min_samples: usize,
    /// Failures that trigger suppression
    pub failure_count: usize,
    /// Failure rate that triggers suppression
    pub failure_rate: f64,
    /// Hard timeout after which suppression always lifts
    pub timeout_minutes: u32,
    /// Prior triggers in the window that force a release
    pub max_triggers: usize,
    /// Samples since the trigger needed for rate-based recovery
    pub recovery_samples: usize,
    /// Success rate since the trigger that counts as recovered
    pub recovery_rate: f64,
    /// Trailing consecutive successes that count as recovered
    pub consecutive_successes: usize,
    /// Most recent samples kept per agent, whatever the window
    pub max_samples: usize,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            min_samples: 3,
            failure_count: 3,
            failure_rate: 0.5,
            timeout_minutes: 30,
            max_triggers: 3,
            recovery_samples: 3,
            recovery_rate: 0.5,
            consecutive_successes: 2,
            max_samples: 100,
        }
    }
}

impl SuppressionConfig {
    /// Trailing window in milliseconds.
    pub fn window_ms(&self) -> i64 {
        i64::from(self.window_hours) * 60 * 60 * 1000
    }

    /// Hard timeout in milliseconds.
    pub fn timeout_ms(&self) -> i64 {
        i64::from(self.timeout_minutes) * 60 * 1000
    }
}

/// Poll loop settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct DaemonConfig {
    pub poll_interval_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 5000 }
    }
}

/// Where state lives on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("turnkeeper"),
        }
    }
}

/// Shell commands backing the external collaborators. Empty disables one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct CollaboratorsConfig {
    pub produce: String,
    pub verify: String,
    pub publish: String,
    pub timeout_ms: u64,
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            produce: String::new(),
            verify: String::new(),
            publish: String::new(),
            timeout_ms: 300_000,
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        Self::load_with_dirs(config_path, Path::new("."), dirs::config_dir().as_deref())
    }

    /// Fallback chain rooted at `project_dir` and `user_config_dir`.
    ///
    /// An explicit path must load. A project or user file that fails to load
    /// is logged and skipped.
    fn load_with_dirs(config_path: Option<&PathBuf>, project_dir: &Path, user_config_dir: Option<&Path>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");
        let file_name = format!("{}.yml", project_name);

        // Try project config: ./<project>.yml, then ~/.config/<project>/<project>.yml
        let candidates = std::iter::once(project_dir.join(&file_name))
            .chain(user_config_dir.map(|dir| dir.join(project_name).join(&file_name)));
        for candidate in candidates {
            if !candidate.exists() {
                continue;
            }
            match Self::load_from_file(&candidate) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {:#}", candidate.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Parse a config from YAML text and validate it.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config = Self::from_yaml(&content)?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.window.start_hour > 23 || self.window.end_hour > 23 {
            eyre::bail!("window hours must be in 0..=23");
        }
        if self.quotas.proposing == 0 || self.quotas.testing == 0 || self.quotas.learning == 0 {
            eyre::bail!("quotas must all be > 0");
        }
        if self.adaptive.min_proposing == 0 {
            eyre::bail!("adaptive.min-proposing must be > 0");
        }
        if self.adaptive.min_proposing > self.adaptive.max_proposing {
            eyre::bail!("adaptive.min-proposing must not exceed adaptive.max-proposing");
        }
        if self.adaptive.history_limit == 0 {
            eyre::bail!("adaptive.history-limit must be > 0");
        }
        for (name, rate) in [
            ("suppression.failure-rate", self.suppression.failure_rate),
            ("suppression.recovery-rate", self.suppression.recovery_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                eyre::bail!("{} must be within 0.0..=1.0", name);
            }
        }
        let needed = self
            .suppression
            .min_samples
            .max(self.suppression.recovery_samples)
            .max(self.suppression.consecutive_successes);
        if self.suppression.max_samples < needed {
            eyre::bail!("suppression.max-samples must be at least {}", needed);
        }
        if self.suppression.window_hours == 0 {
            eyre::bail!("suppression.window-hours must be > 0");
        }
        if self.daemon.poll_interval_ms == 0 {
            eyre::bail!("daemon.poll-interval-ms must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window.start_hour, 6);
        assert_eq!(config.window.end_hour, 22);
        assert_eq!(config.quotas.as_counts(), PhaseCounts::new(3, 3, 2));
        assert_eq!(config.suppression.timeout_minutes, 30);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
window:
  start-hour: 8
quotas:
  proposing: 5
suppression:
  timeout-minutes: 45
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.window.start_hour, 8);
        assert_eq!(config.window.end_hour, 22);
        assert_eq!(config.quotas.proposing, 5);
        assert_eq!(config.quotas.testing, 3);
        assert_eq!(config.suppression.timeout_ms(), 45 * 60 * 1000);
        assert_eq!(config.suppression.failure_count, 3);
    }

    #[test]
    fn test_rejects_zero_quota() {
        let yaml = "quotas:\n  testing: 0\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_bad_hours() {
        let yaml = "window:\n  end-hour: 24\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_inverted_adaptive_bounds() {
        let yaml = "adaptive:\n  min-proposing: 5\n  max-proposing: 2\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_rate_out_of_range() {
        let yaml = "suppression:\n  failure-rate: 1.5\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_rejects_sample_cap_below_thresholds() {
        let yaml = "suppression:\n  max-samples: 2\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.yml");
        fs::write(&path, "daemon:\n  poll-interval-ms: 250\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.daemon.poll_interval_ms, 250);
    }

    #[test]
    fn test_load_explicit_path_missing() {
        let path = PathBuf::from("/nonexistent/turnkeeper.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    fn write_user_config(user_dir: &Path, content: &str) {
        let dir = user_dir.join("turnkeeper");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("turnkeeper.yml"), content).unwrap();
    }

    #[test]
    fn test_load_prefers_project_config() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(project.path().join("turnkeeper.yml"), "quotas:\n  proposing: 7\n").unwrap();
        write_user_config(user.path(), "quotas:\n  proposing: 9\n");

        let config = Config::load_with_dirs(None, project.path(), Some(user.path())).unwrap();
        assert_eq!(config.quotas.proposing, 7);
    }

    #[test]
    fn test_load_falls_back_to_user_config() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        write_user_config(user.path(), "quotas:\n  proposing: 9\n");

        let config = Config::load_with_dirs(None, project.path(), Some(user.path())).unwrap();
        assert_eq!(config.quotas.proposing, 9);
    }

    #[test]
    fn test_malformed_project_config_falls_through() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(project.path().join("turnkeeper.yml"), "quotas: [not, a, map\n").unwrap();
        write_user_config(user.path(), "daemon:\n  poll-interval-ms: 750\n");

        let config = Config::load_with_dirs(None, project.path(), Some(user.path())).unwrap();
        assert_eq!(config.daemon.poll_interval_ms, 750);
    }

    #[test]
    fn test_invalid_configs_fall_back_to_defaults() {
        let project = TempDir::new().unwrap();
        let user = TempDir::new().unwrap();
        fs::write(project.path().join("turnkeeper.yml"), "quotas: [not, a, map\n").unwrap();
        write_user_config(user.path(), "quotas:\n  testing: 0\n");

        let config = Config::load_with_dirs(None, project.path(), Some(user.path())).unwrap();
        assert_eq!(config.quotas.as_counts(), QuotaConfig::default().as_counts());
        assert_eq!(config.daemon.poll_interval_ms, 5000);
    }

    #[test]
    fn test_no_config_files_uses_defaults() {
        let project = TempDir::new().unwrap();
        let config = Config::load_with_dirs(None, project.path(), None).unwrap();
        assert_eq!(config.window.start_hour, 6);
    }
}
