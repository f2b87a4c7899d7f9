//! Bootstrap configuration loading
//!
//! Configuration is resolved in priority order:
//! 1. Command-line arguments (applied as [`ConfigOverrides`])
//! 2. Explicit config file (`--config` / `JUKEBOX_CONFIG`)
//! 3. `~/.config/jukebox/config.toml`
//! 4. `/etc/jukebox/config.toml`
//! 5. Built-in defaults
//!
//! A missing config file is not fatal: a warning is logged and built-in
//! defaults are used. A file that exists but cannot be read or parsed is a
//! configuration error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Bootstrap configuration loaded from TOML
///
/// These settings are read once at startup. The supervised child re-reads the
/// same file when it is (re)started.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Reshuffle the playlist each time it wraps around
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,

    /// Start playing as soon as the player is ready
    #[serde(default)]
    pub autoplay: bool,

    /// Hardware input file polled for play/pause (e.g. a GPIO `value` file)
    #[serde(default)]
    pub input_path: Option<PathBuf>,

    /// Event loop tick: bounded wait per iteration
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Watchdog: how long to wait for a heartbeat before killing the child
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,

    /// Watchdog: pause between a failed child and its replacement (0 restarts
    /// immediately)
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input_path: Option<PathBuf>,
    pub no_shuffle: bool,
    pub autoplay: bool,
}

fn default_shuffle() -> bool {
    true
}

fn default_tick_interval_ms() -> u64 {
    500
}

fn default_heartbeat_timeout_ms() -> u64 {
    2500
}

fn default_restart_delay_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            shuffle: default_shuffle(),
            autoplay: false,
            input_path: None,
            tick_interval_ms: default_tick_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            restart_delay_ms: default_restart_delay_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// # Errors
    /// - File cannot be read
    /// - TOML cannot be parsed
    /// - Values fail validation
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve and load configuration following the documented priority order
    ///
    /// An explicitly requested file must exist. When no explicit file is
    /// given, the standard locations are tried and built-in defaults are used
    /// if none exists.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match default_config_paths().into_iter().find(|p| p.exists()) {
            Some(path) => Self::load(&path),
            None => {
                warn!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Apply command-line overrides on top of file values
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(path) = overrides.input_path {
            self.input_path = Some(path);
        }
        if overrides.no_shuffle {
            self.shuffle = false;
        }
        if overrides.autoplay {
            self.autoplay = true;
        }
    }

    /// Check timing values for consistency
    ///
    /// The heartbeat timeout must be longer than one loop tick, otherwise a
    /// healthy child would be killed between two heartbeats.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(Error::InvalidInput(
                "tick_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.heartbeat_timeout_ms <= self.tick_interval_ms {
            return Err(Error::InvalidInput(format!(
                "heartbeat_timeout_ms ({}) must exceed tick_interval_ms ({})",
                self.heartbeat_timeout_ms, self.tick_interval_ms
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// Standard config file locations, highest priority first
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("jukebox").join("config.toml"));
    }
    if cfg!(unix) {
        paths.push(PathBuf::from("/etc/jukebox/config.toml"));
    }
    paths
}
