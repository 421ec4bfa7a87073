//! Configuration file support for rehastim.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (REHASTIM_*)
//! 3. Local config file (./rehastim.toml)
//! 4. Global config file (~/.config/rehastim/config.toml)

use directories::ProjectDirs;
use log::{debug, warn};
use rehastim::{SessionConfig, Verbosity, WatchdogConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub serial: Option<String>,
    /// Whether a MOTOmed is attached.
    pub with_motomed: Option<bool>,
}

/// Session tuning, all times in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Acknowledgement timeout.
    pub ack_timeout_ms: Option<u64>,
    /// Wait for the device `Init` packet.
    pub init_timeout_ms: Option<u64>,
    /// Heartbeat tick.
    pub watchdog_tick_ms: Option<u64>,
    /// Retained telemetry samples.
    pub max_samples: Option<usize>,
    /// Traffic logging level.
    pub verbosity: Option<Verbosity>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Session configuration.
    #[serde(default)]
    pub session: SessionSettings,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new("rehastim.toml")) {
            debug!("Loaded local config from rehastim.toml");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "rehastim").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other.connection.serial.is_some() {
            self.connection.serial = other.connection.serial;
        }
        if other.connection.with_motomed.is_some() {
            self.connection.with_motomed = other.connection.with_motomed;
        }

        let session = other.session;
        if session.ack_timeout_ms.is_some() {
            self.session.ack_timeout_ms = session.ack_timeout_ms;
        }
        if session.init_timeout_ms.is_some() {
            self.session.init_timeout_ms = session.init_timeout_ms;
        }
        if session.watchdog_tick_ms.is_some() {
            self.session.watchdog_tick_ms = session.watchdog_tick_ms;
        }
        if session.max_samples.is_some() {
            self.session.max_samples = session.max_samples;
        }
        if session.verbosity.is_some() {
            self.session.verbosity = session.verbosity;
        }
    }

    /// Build the library session configuration.
    pub fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::default()
            .with_motomed(self.connection.with_motomed.unwrap_or(false));
        let settings = &self.session;
        if let Some(ms) = settings.ack_timeout_ms {
            config = config.with_ack_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = settings.init_timeout_ms {
            config = config.with_init_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = settings.watchdog_tick_ms {
            let tick = Duration::from_millis(ms);
            config = config.with_watchdog(WatchdogConfig {
                tick,
                idle_threshold: tick,
                ..WatchdogConfig::default()
            });
        }
        if let Some(max) = settings.max_samples {
            config = config.with_max_samples(max);
        }
        if let Some(verbosity) = settings.verbosity {
            config = config.with_verbosity(verbosity);
        }
        config
    }
}
