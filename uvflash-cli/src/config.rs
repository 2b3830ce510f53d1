//! Configuration file support for uvflash.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (UVFLASH_*)
//! 3. Local config file (./uvflash.toml)
//! 4. Global config file (~/.config/uvflash/config.toml)

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uvflash::{DeviceConfig, Port};

/// Image file used when nothing else is configured.
pub const DEFAULT_IMAGE: &str = "uvflash.bin";

/// Emulated radio settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSection {
    /// Ports that accept flash commands.
    pub ports: Option<Vec<Port>>,
    /// Tuner countdown reload value (omit if the radio has no tuner).
    pub tuner_countdown: Option<u16>,
}

/// Session defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Flash image file.
    pub image: Option<PathBuf>,
    /// Port to send commands on.
    pub port: Option<Port>,
    /// Session timestamp.
    pub timestamp: Option<u32>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Emulated radio settings.
    #[serde(default)]
    pub device: DeviceSection,
    /// Session defaults.
    #[serde(default)]
    pub session: SessionConfig,
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
        if let Some(local_config) = Self::load_from_file(Path::new("uvflash.toml")) {
            debug!("Loaded local config from uvflash.toml");
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
        ProjectDirs::from("", "", "uvflash").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other.device.ports.is_some() {
            self.device.ports = other.device.ports;
        }
        if other.device.tuner_countdown.is_some() {
            self.device.tuner_countdown = other.device.tuner_countdown;
        }

        if other.session.image.is_some() {
            self.session.image = other.session.image;
        }
        if other.session.port.is_some() {
            self.session.port = other.session.port;
        }
        if other.session.timestamp.is_some() {
            self.session.timestamp = other.session.timestamp;
        }
    }

    /// Radio configuration for the emulator.
    pub fn device_config(&self) -> DeviceConfig {
        let defaults = DeviceConfig::default();
        DeviceConfig {
            ports: self.device.ports.clone().unwrap_or(defaults.ports),
            tuner_countdown: self.device.tuner_countdown,
        }
    }
}
