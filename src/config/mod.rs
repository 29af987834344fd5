//! Configuration module for packetscope
//!
//! This module handles the application configuration:
//! - Pipeline sizing (worker threads)
//! - Capture parameters passed to the live capture backend
//! - Logging filter and optional log directory
//!
//! # Config Location
//!
//! The default configuration file lives in the platform data directory:
//! - **Linux**: `~/.local/share/packetscope/config.toml`
//! - **macOS**: `~/Library/Application Support/packetscope/config.toml`
//! - **Windows**: `%APPDATA%\packetscope\config.toml`
//!
//! # Formats
//!
//! Files ending in `.json` are read and written as JSON; everything else is
//! TOML. Missing fields take their defaults, so a partial file is valid.
//!
//! # Example
//!
//! ```ignore
//! use packetscope::config::AppConfig;
//!
//! let config = AppConfig::load_or_default(AppConfig::default_path().unwrap());
//! println!("{} workers", config.pipeline.worker_count);
//! ```

use crate::error::{PacketScopeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "packetscope";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default number of decode workers
pub const DEFAULT_WORKER_COUNT: usize = 2;

/// Default snapshot length (bytes captured per frame)
pub const DEFAULT_SNAPLEN: u32 = 65535;

/// Default capture read timeout in milliseconds
pub const DEFAULT_READ_TIMEOUT_MS: u32 = 100;

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

// ==================== Sections ====================

/// Pipeline sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of decode worker threads (0 is treated as 1)
    pub worker_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
        }
    }
}

/// Live capture parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Maximum bytes captured per frame
    pub snaplen: u32,
    /// Capture frames not addressed to this host
    pub promiscuous: bool,
    /// How long a read may wait before the stop flag is checked again
    pub read_timeout_ms: u32,
    /// Deliver frames as soon as they arrive instead of buffering
    pub immediate_mode: bool,
    /// Device used when none is given on the command line
    pub default_device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            snaplen: DEFAULT_SNAPLEN,
            promiscuous: true,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            immediate_mode: true,
            default_device: None,
        }
    }
}

/// Logging output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `"info"` or `"packetscope=debug"`
    pub filter: String,
    /// Directory for daily-rotated log files; console only when unset
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file_dir: None,
        }
    }
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub capture: CaptureConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        app_data_dir().map(|p| p.join(CONFIG_FILE))
    }

    /// Load a config file, choosing the format by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PacketScopeError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = if is_json(path) {
            serde_json::from_str(&content).map_err(|e| {
                PacketScopeError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        } else {
            toml::from_str(&content).map_err(|e| {
                PacketScopeError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Load a config file, falling back to defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config, choosing the format by extension
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PacketScopeError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = if is_json(path) {
            serde_json::to_string_pretty(self)
                .map_err(|e| PacketScopeError::Config(format!("Failed to serialize config: {}", e)))?
        } else {
            toml::to_string_pretty(self)
                .map_err(|e| PacketScopeError::Config(format!("Failed to serialize config: {}", e)))?
        };

        std::fs::write(path, content).map_err(|e| {
            PacketScopeError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject values the capture backend cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.capture.snaplen == 0 {
            return Err(PacketScopeError::Config(
                "capture.snaplen must be greater than zero".to_string(),
            ));
        }
        if self.capture.read_timeout_ms == 0 {
            return Err(PacketScopeError::Config(
                "capture.read_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.worker_count, 2);
        assert_eq!(config.capture.snaplen, 65535);
        assert!(config.capture.promiscuous);
        assert_eq!(config.capture.read_timeout_ms, 100);
        assert!(config.capture.immediate_mode);
        assert!(config.capture.default_device.is_none());
        assert_eq!(config.logging.filter, "info");
        assert!(config.logging.file_dir.is_none());
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.pipeline.worker_count = 6;
        config.capture.default_device = Some("eth0".to_string());
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_json_is_chosen_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.JSON");

        let mut config = AppConfig::default();
        config.logging.filter = "debug".to_string();
        config.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.trim_start().starts_with('{'));
        assert_eq!(AppConfig::load(&path).unwrap().logging.filter, "debug");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[pipeline]\nworker_count = 8\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.pipeline.worker_count, 8);
        assert_eq!(config.capture, CaptureConfig::default());
    }

    #[test]
    fn test_zero_snaplen_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[capture]\nsnaplen = 0\n").unwrap();

        assert!(matches!(
            AppConfig::load(&path),
            Err(PacketScopeError::Config(_))
        ));
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
    }

    #[test]
    fn test_zero_read_timeout_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[capture]\nread_timeout_ms = 0\n").unwrap();

        assert!(matches!(
            AppConfig::load(&path),
            Err(PacketScopeError::Config(msg)) if msg.contains("read_timeout_ms")
        ));

        let mut config = AppConfig::default();
        config.capture.read_timeout_ms = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_or_default(dir.path().join("absent.toml"));
        assert_eq!(config, AppConfig::default());
    }
}
