//! Configuration loading traits and types.
//!
//! mlockd is normally driven from the command line, but the same settings
//! can be kept in a TOML file and passed with `--config`. Command-line
//! values are merged on top of the file by the binary.
//!
//! # TOML Example
//!
//! ```toml
//! log_level = "debug"
//! lazy = true
//! list_file = "/etc/mlockd/files.txt"
//! pid_file = "/run/mlockd.pid"
//! files = ["/srv/tables/geo.idx", "/srv/tables/asn.idx"]
//! max_files = 4096
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

/// Settings of one mlockd invocation, as read from a TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MlockdConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Keep loading the remaining files after a failure.
    #[serde(default)]
    pub lazy: bool,

    /// Newline-delimited file listing paths to pin, loaded first.
    #[serde(default)]
    pub list_file: Option<PathBuf>,

    /// Pid file for the background instance. Setting it selects background mode.
    #[serde(default)]
    pub pid_file: Option<PathBuf>,

    /// Paths to pin, loaded after the list file.
    #[serde(default)]
    pub files: Vec<PathBuf>,

    /// Maximum number of files to hold; loading more is an allocation failure.
    #[serde(default)]
    pub max_files: Option<usize>,
}

impl MlockdConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - neither `files` nor `list_file` names anything to load
    /// - `pid_file` is set to an empty path
    /// - `max_files` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.files.is_empty() && self.list_file.is_none() {
            return Err(ConfigError::ValidationError(
                "no files to lock: pass file paths or a list file".to_string(),
            ));
        }
        if self
            .pid_file
            .as_deref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(ConfigError::ValidationError(
                "pid_file cannot be empty".to_string(),
            ));
        }
        if self.max_files == Some(0) {
            return Err(ConfigError::ValidationError(
                "max_files must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if the file cannot be read or the TOML is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.to_path_buf())
            } else {
                ConfigError::ParseError(format!("{}: {}", path.display(), e))
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Any serde-deserializable struct can be loaded from TOML.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
