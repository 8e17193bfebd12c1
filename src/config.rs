//! Configuration management for corebench
//!
//! Config file location:
//! - Linux: ~/.config/corebench/config.toml
//! - macOS: ~/Library/Application Support/corebench/config.toml
//! - Windows: %APPDATA%/corebench/config.toml
//!
//! You can override the config location by setting `COREBENCH_CONFIG_PATH`.
//!
//! Every value has a default, so a missing file or a partial one is fine. The
//! defaults are the calibration set the published scores are based on.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::calibration::Calibration;
use crate::cpu_suite::SuiteConfig;
use crate::kernels::ProblemSizes;
use crate::memory::MemoryConfig;
use crate::render::RenderConfig;
use crate::thermal::{GateAction, ThermalMonitor};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Iteration counts and worker threads
    #[serde(default)]
    pub suite: SuiteConfig,

    /// Thermal gate behavior
    #[serde(default)]
    pub gate: GateConfig,

    /// Reference timings and score scaling
    #[serde(default)]
    pub calibration: Calibration,

    /// Kernel problem sizes
    #[serde(default)]
    pub sizes: ProblemSizes,

    /// Memory probe tiers
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Optional rendering suite
    #[serde(default)]
    pub render: RenderConfig,
}

impl Config {
    /// Load configuration from file or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from an explicit path; a missing file yields the defaults.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", config_path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config in {}", config_path.display()))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(config_path, toml)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("COREBENCH_CONFIG_PATH") {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed));
            }
        }

        let proj_dirs = ProjectDirs::from("com", "pcbuilder", "corebench")
            .context("Could not determine project directories")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Create default config file if it doesn't exist
    pub fn init() -> Result<Self> {
        let config = Self::load()?;

        // Save default config if file doesn't exist
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            config.save()?;
        }

        Ok(config)
    }

    /// Reject values no run could score meaningfully with.
    pub fn validate(&self) -> Result<()> {
        self.suite.validate().context("Invalid [suite] section")?;
        self.calibration
            .validate()
            .context("Invalid [calibration] section")?;
        self.memory.validate().context("Invalid [memory] section")?;
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_monitor_interval_ms() -> u64 {
    ThermalMonitor::DEFAULT_INTERVAL.as_millis() as u64
}

/// Thermal gate configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// What to do when the device is already warm
    #[serde(default)]
    pub action: GateAction,

    /// Sample temperatures in the background while the benchmark runs
    #[serde(default = "default_true")]
    pub monitor: bool,

    /// Sampling interval for the temperature monitor
    #[serde(default = "default_monitor_interval_ms")]
    pub monitor_interval_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            action: GateAction::default(),
            monitor: default_true(),
            monitor_interval_ms: default_monitor_interval_ms(),
        }
    }
}

/// Get configuration file path for display purposes
pub fn get_config_path() -> Result<String> {
    let path = Config::config_path()?;
    Ok(path.display().to_string())
}
