//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/migraine-insight/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/migraine-insight/` (~/.config/migraine-insight/)
//! - State/Logs: `$XDG_STATE_HOME/migraine-insight/` (~/.local/state/migraine-insight/)

use crate::analytics::clinical::AverageIntensityPolicy;
use crate::analytics::correlation::CorrelationWindows;
use crate::analytics::cycle::PhaseWindows;
use crate::calendar::Calendar;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "migraine-insight";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Analytics configuration
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Menstrual cycle phase windows
    #[serde(default)]
    pub cycle: CycleConfig,

    /// Background recompute scheduling
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Analytics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// Number of medications kept in top-N rankings
    #[serde(default = "default_top_medications")]
    pub top_medications: usize,

    /// Days before a treatment start compared in correlation analysis
    #[serde(default = "default_correlation_days")]
    pub correlation_before_days: u32,

    /// Days after a treatment start compared in correlation analysis
    #[serde(default = "default_correlation_days")]
    pub correlation_after_days: u32,

    /// Which attacks count towards average pain intensity
    #[serde(default)]
    pub average_intensity: AverageIntensityPolicy,

    /// Fixed UTC offset for day boundaries; host offset when absent
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            top_medications: default_top_medications(),
            correlation_before_days: default_correlation_days(),
            correlation_after_days: default_correlation_days(),
            average_intensity: AverageIntensityPolicy::default(),
            utc_offset_minutes: None,
        }
    }
}

impl AnalyticsConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.top_medications == 0 {
            return Err(Error::Config(
                "analytics.top_medications must be at least 1".to_string(),
            ));
        }
        if self.correlation_before_days == 0 || self.correlation_after_days == 0 {
            return Err(Error::Config(
                "analytics correlation windows must be at least 1 day".to_string(),
            ));
        }
        if let Some(minutes) = self.utc_offset_minutes {
            Calendar::from_offset_minutes(minutes)?;
        }
        Ok(())
    }

    /// Calendar for day boundaries.
    pub fn calendar(&self) -> Result<Calendar> {
        match self.utc_offset_minutes {
            Some(minutes) => Calendar::from_offset_minutes(minutes),
            None => Ok(Calendar::local()),
        }
    }

    /// Default correlation windows.
    pub fn correlation_windows(&self) -> CorrelationWindows {
        CorrelationWindows {
            before_days: self.correlation_before_days,
            after_days: self.correlation_after_days,
        }
    }
}

fn default_top_medications() -> usize {
    5
}

fn default_correlation_days() -> u32 {
    30
}

/// Menstrual cycle phase configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CycleConfig {
    /// Menstrual phase length when a sample has no flow data
    #[serde(default = "default_flow_days")]
    pub default_flow_days: u32,

    /// Days immediately before the next cycle counted as premenstrual
    #[serde(default = "default_premenstrual_days")]
    pub premenstrual_days: u32,

    /// Days either side of the cycle midpoint counted as ovulatory
    #[serde(default = "default_ovulation_half_window")]
    pub ovulation_half_window_days: u32,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            default_flow_days: default_flow_days(),
            premenstrual_days: default_premenstrual_days(),
            ovulation_half_window_days: default_ovulation_half_window(),
        }
    }
}

/// Longest menstrual or premenstrual window accepted from config.
const MAX_PHASE_WINDOW_DAYS: u32 = 14;

/// Widest ovulation half-window accepted from config.
const MAX_OVULATION_HALF_WINDOW_DAYS: u32 = 7;

impl CycleConfig {
    /// Validate phase windows, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_PHASE_WINDOW_DAYS).contains(&self.default_flow_days) {
            return Err(Error::Config(format!(
                "cycle.default_flow_days must be between 1 and {}",
                MAX_PHASE_WINDOW_DAYS
            )));
        }
        if !(1..=MAX_PHASE_WINDOW_DAYS).contains(&self.premenstrual_days) {
            return Err(Error::Config(format!(
                "cycle.premenstrual_days must be between 1 and {}",
                MAX_PHASE_WINDOW_DAYS
            )));
        }
        if self.ovulation_half_window_days > MAX_OVULATION_HALF_WINDOW_DAYS {
            return Err(Error::Config(format!(
                "cycle.ovulation_half_window_days must be at most {}",
                MAX_OVULATION_HALF_WINDOW_DAYS
            )));
        }
        Ok(())
    }

    pub fn phase_windows(&self) -> PhaseWindows {
        PhaseWindows {
            default_flow_days: self.default_flow_days,
            premenstrual_days: self.premenstrual_days,
            ovulation_half_window_days: self.ovulation_half_window_days,
        }
    }
}

fn default_flow_days() -> u32 {
    5
}

fn default_premenstrual_days() -> u32 {
    2
}

fn default_ovulation_half_window() -> u32 {
    1
}

/// Recompute scheduler configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Quiet period after the last request before recomputing
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl SchedulerConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_debounce_ms() -> u64 {
    300
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.analytics.validate()?;
        config.cycle.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/migraine-insight/config.toml`
    pub fn config_path() -> PathBuf {
        xdg_config_home().join(APP_DIR).join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/migraine-insight/`
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join(APP_DIR)
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("migraine-insight.log")
    }
}
