use crate::error::config::ConfigError;
use crate::identity::ServerIdentity;
use crate::pump::{MAX_CONSECUTIVE_FAILURES_DEFAULT, PumpSettings};
use crate::registrar::default_socket_dir;
use crate::APP_DIRECTORY;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::{LevelFilter, info, warn};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "vimserver.toml";
const CONFIG_VERSION: u32 = 1;

const DEFAULT_SERVER_NAME: &str = "VIMSERVER";
const DEFAULT_LOG_LEVEL: &str = "info";
const CONNECT_TIMEOUT_DEFAULT: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT_MAX: Duration = Duration::from_secs(300);
const MAX_CONSECUTIVE_FAILURES_LIMIT: u32 = 10_000;

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Directory holding Unix endpoint sockets.
    #[serde(default = "default_socket_dir")]
    pub socket_dir: PathBuf,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            socket_dir: default_socket_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpSection {
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for PumpSection {
    fn default() -> Self {
        Self {
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSection {
    /// How long a sender waits for the endpoint to appear, e.g. `"2s"`.
    #[serde(default = "default_connect_timeout", with = "humantime_duration")]
    pub connect_timeout: Duration,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
        }
    }
}

/// Settings for the listener and its command-line client, stored as TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub pump: PumpSection,

    #[serde(default)]
    pub client: ClientSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: ServerSection::default(),
            pump: PumpSection::default(),
            client: ClientSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}
fn default_max_consecutive_failures() -> u32 {
    MAX_CONSECUTIVE_FAILURES_DEFAULT
}
fn default_connect_timeout() -> Duration {
    CONNECT_TIMEOUT_DEFAULT
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIRECTORY)
}

mod humantime_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

// ============================================
// IMPLEMENTATION
// ============================================

impl ListenerConfig {
    /// Load config from `{config_dir}/vimserver.toml`.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read, parsed,
    /// or validated.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {e}");
            ConfigError::Read {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: ListenerConfig = toml::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config TOML: {e}");
            ConfigError::Parse {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to `{config_dir}/vimserver.toml` using temp file + rename.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation, directory creation,
    /// serialization, the write, or the rename fails.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{CONFIG_FILE_NAME}.tmp"));

        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, contents).map_err(|e| ConfigError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::Write {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::Validation {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{CONFIG_VERSION})",
                    self.version
                ),
            });
        }

        if let Err(e) = ServerIdentity::new(self.server.name.as_str()) {
            return Err(ConfigError::Validation {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Invalid server name: {e}"),
            });
        }

        let failures = self.pump.max_consecutive_failures;
        if failures == 0 || failures > MAX_CONSECUTIVE_FAILURES_LIMIT {
            return Err(ConfigError::Validation {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid max_consecutive_failures: {failures} (must be 1-{MAX_CONSECUTIVE_FAILURES_LIMIT})"
                ),
            });
        }

        let timeout = self.client.connect_timeout;
        if timeout.is_zero() || timeout > CONNECT_TIMEOUT_MAX {
            return Err(ConfigError::Validation {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid connect_timeout: {} (must be above 0 and at most {})",
                    humantime::format_duration(timeout),
                    humantime::format_duration(CONNECT_TIMEOUT_MAX)
                ),
            });
        }

        if LevelFilter::from_str(&self.logging.level).is_err() {
            return Err(ConfigError::Validation {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Invalid log level: {}", self.logging.level),
            });
        }

        Ok(())
    }

    /// The configured server name as a validated identity.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the name is invalid.
    pub fn identity(&self) -> Result<ServerIdentity, ConfigError> {
        ServerIdentity::new(self.server.name.as_str()).map_err(|e| {
            ConfigError::Validation {
                location: ErrorLocation::from(Location::caller()),
                reason: format!("Invalid server name: {e}"),
            }
        })
    }

    pub fn pump_settings(&self) -> PumpSettings {
        PumpSettings {
            max_consecutive_failures: self.pump.max_consecutive_failures,
        }
    }

    /// Parsed log level; `info` if the configured one is unknown.
    pub fn log_level(&self) -> LevelFilter {
        LevelFilter::from_str(&self.logging.level).unwrap_or(LevelFilter::Info)
    }
}
