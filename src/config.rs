//! Configuration types for extract-orchestrator

use crate::error::{Error, Result};
use crate::overwrite::OverwriteMode;
use crate::utils::MAX_RENAME_ATTEMPTS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How raw item paths are mapped below the destination root
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PathMode {
    /// Keep every component of the archive path (default)
    #[default]
    Full,
    /// Strip a leading run of components that must match `remove_prefix`
    /// case-insensitively
    Current {
        /// Components to strip from the front of every item path
        remove_prefix: Vec<String>,
    },
    /// Keep only the final (file name) component
    Flat,
}

/// Which item timestamps are written to extracted files and directories
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampConfig {
    /// Write creation time (default: false)
    #[serde(default)]
    pub creation: bool,

    /// Write access time (default: false)
    #[serde(default)]
    pub access: bool,

    /// Write modification time (default: true)
    #[serde(default = "default_true")]
    pub modification: bool,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            creation: false,
            access: false,
            modification: true,
        }
    }
}

/// Configuration for one extraction run
///
/// Every field has a default, so an empty JSON object is a valid
/// configuration that extracts into the current directory and asks before
/// overwriting.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Destination root directory (default: ".")
    #[serde(default = "default_destination_dir")]
    pub destination_dir: PathBuf,

    /// Path handling mode (default: full)
    #[serde(default)]
    pub path_mode: PathMode,

    /// Conflict handling for files that already exist (default: ask_before)
    #[serde(default)]
    pub overwrite_mode: OverwriteMode,

    /// Write decoded bytes to standard output instead of files
    #[serde(default)]
    pub stdout: bool,

    /// Verify-only mode: decode everything, persist nothing
    #[serde(default)]
    pub test: bool,

    /// Track a CRC-32 and byte count for every item
    #[serde(default)]
    pub checksum: bool,

    /// Timestamp write flags
    #[serde(default)]
    pub timestamps: TimestampConfig,

    /// Treat AppleDouble `._name` items and the `__MACOSX` container as
    /// sidecar metadata (default: true on macOS, false elsewhere)
    ///
    /// Only takes effect once a merger that supports merging is installed
    /// with `ExtractSession::with_metadata_merger`.
    #[serde(default = "default_sidecar_metadata")]
    pub sidecar_metadata: bool,

    /// Upper bound for the numbered-suffix search when auto-renaming (default: 9999)
    #[serde(default = "default_max_rename_attempts")]
    pub max_rename_attempts: u32,

    /// Password tried before the callback is asked
    #[serde(default)]
    pub password: Option<String>,

    /// Report progress in packed bytes across a multi-volume set
    #[serde(default)]
    pub multi_volume: bool,

    /// Packed size of the whole volume set, used when `multi_volume` is on
    #[serde(default)]
    pub packed_size: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            destination_dir: default_destination_dir(),
            path_mode: PathMode::default(),
            overwrite_mode: OverwriteMode::default(),
            stdout: false,
            test: false,
            checksum: false,
            timestamps: TimestampConfig::default(),
            sidecar_metadata: default_sidecar_metadata(),
            max_rename_attempts: default_max_rename_attempts(),
            password: None,
            multi_volume: false,
            packed_size: 0,
        }
    }
}

impl ExtractionConfig {
    /// Create a configuration with defaults that extracts into `destination_dir`
    pub fn new(destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            destination_dir: destination_dir.into(),
            ..Default::default()
        }
    }

    /// Parse and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations the session cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.stdout && self.test {
            return Err(Error::Config {
                message: "stdout and test modes are mutually exclusive".to_string(),
                key: Some("stdout".to_string()),
            });
        }

        if self.max_rename_attempts == 0 {
            return Err(Error::Config {
                message: "max_rename_attempts must be at least 1".to_string(),
                key: Some("max_rename_attempts".to_string()),
            });
        }

        if let PathMode::Current { remove_prefix } = &self.path_mode {
            if remove_prefix.is_empty() || remove_prefix.iter().any(|c| c.is_empty()) {
                return Err(Error::Config {
                    message: "current path mode needs a non-empty prefix".to_string(),
                    key: Some("path_mode".to_string()),
                });
            }
        }

        Ok(())
    }

    /// Whether bytes are actually written to the destination directory
    pub fn writes_files(&self) -> bool {
        !self.stdout && !self.test
    }
}

fn default_destination_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_sidecar_metadata() -> bool {
    cfg!(target_os = "macos")
}

fn default_max_rename_attempts() -> u32 {
    MAX_RENAME_ATTEMPTS
}
