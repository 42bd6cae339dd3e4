//! TOML configuration for the remote.
//!
//! Read from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\PhoneMouse\config.toml`
//! - Linux:    `~/.config/phonemouse/config.toml` (or `$XDG_CONFIG_HOME`)
//! - macOS:    `~/Library/Application Support/PhoneMouse/config.toml`
//!
//! The file is optional and read-only: the remote never writes it.  Every
//! field carries a serde default, so a missing file, a missing section or a
//! missing key all fall back to the built-in value.
//!
//! ```toml
//! [general]
//! log_level = "debug"
//!
//! [discovery]
//! port = 2856
//! probe_count = 5
//! interval_ms = 1000
//! default_reliable_port = 2855
//! response_buffer = 512
//!
//! [connection]
//! connect_timeout_ms = 5000   # 0 disables the timeout
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use phonemouse_core::{DEFAULT_DISCOVERY_PORT, DEFAULT_RELIABLE_PORT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::DiscoveryConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

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
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub connection: ConnectionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// `[discovery]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoverySettings {
    /// UDP port hosts listen on for probes.
    #[serde(default = "default_discovery_port")]
    pub port: u16,
    #[serde(default = "default_probe_count")]
    pub probe_count: u32,
    /// Gap after each probe, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Reliable port assumed when a host's answer does not carry one.
    #[serde(default = "default_reliable_port")]
    pub default_reliable_port: u16,
    /// Receive buffer for answers, in bytes.
    #[serde(default = "default_response_buffer")]
    pub response_buffer: usize,
}

/// `[connection]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSettings {
    /// TCP connect timeout in milliseconds; `0` waits for the OS.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_discovery_port() -> u16 {
    DEFAULT_DISCOVERY_PORT
}
fn default_probe_count() -> u32 {
    5
}
fn default_interval_ms() -> u64 {
    1000
}
fn default_reliable_port() -> u16 {
    DEFAULT_RELIABLE_PORT
}
fn default_response_buffer() -> usize {
    512
}
fn default_connect_timeout_ms() -> u64 {
    5000
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            port: default_discovery_port(),
            probe_count: default_probe_count(),
            interval_ms: default_interval_ms(),
            default_reliable_port: default_reliable_port(),
            response_buffer: default_response_buffer(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl DiscoverySettings {
    pub fn to_discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            port: self.port,
            probe_count: self.probe_count,
            interval: Duration::from_millis(self.interval_ms),
            default_reliable_port: self.default_reliable_port,
            response_buffer: self.response_buffer,
        }
    }
}

impl ConnectionSettings {
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_ms > 0).then(|| Duration::from_millis(self.connect_timeout_ms))
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `AppConfig` from the platform location, returning defaults when the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `AppConfig` from an explicit path, returning defaults when the file
/// does not exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("PhoneMouse"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("phonemouse"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("PhoneMouse")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
