//! TOML configuration for the client binary.
//!
//! ```toml
//! [client]
//! log_level = "info"
//!
//! [device]
//! name_prefixes = ["QY-QYSC", "WCU_MY32"]
//! notification_buffer = 64
//!
//! [replay]
//! device_name = "QY-QYSC-S-1234"
//! notifications = ["f72aa42b...", "..."]
//! ```
//!
//! # Serde default values
//!
//! Every field has a `#[serde(default = "...")]` function, so a missing file,
//! an empty file, or a file from an older version all load to something
//! usable.  `RUST_LOG`, when set, takes precedence over `log_level`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cube_core::DeviceModel;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// A replay notification is not valid hex.
    #[error("replay notification {index} is not valid hex: {source}")]
    InvalidHex {
        index: usize,
        #[source]
        source: hex::FromHexError,
    },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSection,
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub replay: ReplaySection,
}

/// General client behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientSection {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Device discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// Advertised-name prefixes to look for.
    #[serde(default = "default_name_prefixes")]
    pub name_prefixes: Vec<String>,
    /// Notifications that may queue before the transport applies backpressure.
    #[serde(default = "default_notification_buffer")]
    pub notification_buffer: usize,
}

/// A recorded session to replay through the in-memory transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplaySection {
    /// Name the replayed device advertises.
    #[serde(default = "default_replay_device")]
    pub device_name: String,
    /// Raw notification payloads, hex encoded, in arrival order.
    #[serde(default)]
    pub notifications: Vec<String>,
}

impl ReplaySection {
    /// Decodes the hex notification payloads.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHex`] naming the first bad entry.
    pub fn decode_notifications(&self) -> Result<Vec<Vec<u8>>, ConfigError> {
        self.notifications
            .iter()
            .enumerate()
            .map(|(index, text)| {
                hex::decode(text.trim()).map_err(|source| ConfigError::InvalidHex { index, source })
            })
            .collect()
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}

fn default_name_prefixes() -> Vec<String> {
    DeviceModel::ALL
        .iter()
        .map(|m| m.name_prefix().to_string())
        .collect()
}

fn default_notification_buffer() -> usize {
    64
}

fn default_replay_device() -> String {
    "QY-QYSC-S-1234".to_string()
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            name_prefixes: default_name_prefixes(),
            notification_buffer: default_notification_buffer(),
        }
    }
}

impl Default for ReplaySection {
    fn default() -> Self {
        Self {
            device_name: default_replay_device(),
            notifications: Vec::new(),
        }
    }
}

// ── Loading and saving ────────────────────────────────────────────────────────

/// Parses configuration from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] if the TOML is malformed.
pub fn parse_config(text: &str) -> Result<ClientConfig, ConfigError> {
    Ok(toml::from_str(text)?)
}

/// Loads configuration from `path`, returning defaults if the file does not
/// exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let text = toml::to_string_pretty(config)?;
    std::fs::write(path, text).map_err(io_err)
}
