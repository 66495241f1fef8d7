//! Configuration management (`config.toml`)
//!
//! Tunables for the session layer. Settings are stored in TOML format in the
//! platform-specific config directory; anything missing falls back to its
//! default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::net::messages::{FILE_CHUNK_HEADER_SIZE, MAX_FILE_NAME_LEN};
use crate::net::codec::MAX_PAYLOAD_SIZE;

/// Session layer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NetConfig {
    /// Map transfer settings
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Deferred event queue settings
    #[serde(default)]
    pub queue: QueueConfig,
    /// Obfuscation and version checks
    #[serde(default)]
    pub security: SecurityConfig,
    /// Session housekeeping
    #[serde(default)]
    pub session: SessionSettings,
}

/// Map transfer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Bytes per file chunk (default: 2048)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Minimum time between chunks in milliseconds (default: 200)
    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,
    /// Re-request a map after this long without progress (default: 10000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Directory maps are served from and downloaded into (default: "maps")
    #[serde(default = "default_maps_dir")]
    pub maps_dir: PathBuf,
}

/// Deferred event queue configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum parked events (default: 100)
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
    /// Events fired per simulation tick (default: 1)
    #[serde(default = "default_events_per_tick")]
    pub events_per_tick: usize,
}

/// Obfuscation and integrity configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Payload obfuscation key; unset sends payloads in the clear
    #[serde(default)]
    pub obfuscation_key: Option<u32>,
    /// Host kicks peers whose build hash differs (default: true)
    #[serde(default = "default_true")]
    pub kick_on_version_mismatch: bool,
}

/// Session housekeeping configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Lines kept in the console display queue (default: 64)
    #[serde(default = "default_console_capacity")]
    pub console_capacity: usize,
    /// Host pings everyone this often in milliseconds (default: 2000)
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// UDP peers silent for this long are dropped (default: 5000)
    #[serde(default = "default_udp_timeout_ms")]
    pub udp_timeout_ms: u64,
}

fn default_chunk_size() -> usize {
    2048
}
fn default_send_interval_ms() -> u64 {
    200
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_maps_dir() -> PathBuf {
    PathBuf::from("maps")
}

fn default_queue_capacity() -> usize {
    crate::net::msg_queue::DEFAULT_QUEUE_CAPACITY
}
fn default_events_per_tick() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_console_capacity() -> usize {
    64
}
fn default_ping_interval_ms() -> u64 {
    2000
}
fn default_udp_timeout_ms() -> u64 {
    5000
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            send_interval_ms: default_send_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            maps_dir: default_maps_dir(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            events_per_tick: default_events_per_tick(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            obfuscation_key: None,
            kick_on_version_mismatch: default_true(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            console_capacity: default_console_capacity(),
            ping_interval_ms: default_ping_interval_ms(),
            udp_timeout_ms: default_udp_timeout_ms(),
        }
    }
}

/// Largest chunk that still fits an envelope with a maximal file name
pub const MAX_CHUNK_SIZE: usize = MAX_PAYLOAD_SIZE - FILE_CHUNK_HEADER_SIZE - MAX_FILE_NAME_LEN;

impl TransferConfig {
    /// Chunk size clamped to what one envelope can carry
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(1, MAX_CHUNK_SIZE)
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl SessionSettings {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn udp_timeout(&self) -> Duration {
        Duration::from_millis(self.udp_timeout_ms)
    }
}

/// Errors reading or writing a config file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\Skirmish\config`
/// On macOS: `~/Library/Application Support/net.skirmish.Skirmish`
/// On Linux: `~/.config/skirmish`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("net", "skirmish", "Skirmish")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Loads the configuration from disk.
///
/// Reads `config.toml` from the platform's configuration directory.
/// Returns default values if the file doesn't exist or cannot be parsed.
pub fn load() -> NetConfig {
    match config_dir().map(|dir| load_from(&dir.join("config.toml"))) {
        Some(Ok(config)) => config,
        Some(Err(ConfigError::Io { .. })) | None => NetConfig::default(),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Ignoring unreadable config, using defaults");
            NetConfig::default()
        }
    }
}

/// Loads a configuration from a specific file.
pub fn load_from(path: &Path) -> Result<NetConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Saves the configuration to disk.
///
/// Writes `config.toml` to the platform's configuration directory.
/// Creates the directory if it doesn't exist.
pub fn save(config: &NetConfig) -> Result<(), ConfigError> {
    match config_dir() {
        Some(dir) => save_to(config, &dir.join("config.toml")),
        None => Ok(()),
    }
}

/// Saves a configuration to a specific file, creating parent directories.
pub fn save_to(config: &NetConfig, path: &Path) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(io_err)
}
