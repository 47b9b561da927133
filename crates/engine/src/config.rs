//! Engine configuration via `metavault.toml`
//!
//! One file carries the settings every engine component reads: where exports
//! and offline archives land, where imports unpack, how large query pages are
//! and how hard a revert retries. Each component takes its own slice of the
//! config through an options struct.

use crate::export::ExportOptions;
use crate::import::ImportOptions;
use crate::offline::OfflineOptions;
use crate::retry::RetryPolicy;
use metavault_archive::Compression;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "metavault.toml";

/// Default number of records fetched per catalog query page
pub const DEFAULT_PAGE_SIZE: usize = 64;

/// Configuration failures
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        /// Config file
        path: PathBuf,
        /// Cause
        source: io::Error,
    },

    /// The file is not valid TOML for this config
    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        /// Config file
        path: PathBuf,
        /// Cause
        source: toml::de::Error,
    },

    /// The config could not be rendered as TOML
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The file could not be written
    #[error("Failed to write config file '{}': {source}", .path.display())]
    Write {
        /// Config file
        path: PathBuf,
        /// Cause
        source: io::Error,
    },

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Revert retry settings, persisted under `[revert]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertConfig {
    /// Update attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Pause between attempts in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> usize {
    4
}

fn default_delay_ms() -> u64 {
    350
}

impl Default for RevertConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

/// Engine configuration loaded from `metavault.toml`.
///
/// # Example
///
/// ```toml
/// export_directory = "/data/exports"
/// offline_root_path = "/data/offline"
/// page_size = 64
/// compression = "deflated"
///
/// [revert]
/// max_attempts = 4
/// delay_ms = 350
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetavaultConfig {
    /// Directory that receives exports requested without an output path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_directory: Option<PathBuf>,
    /// Root directory for offline archives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offline_root_path: Option<PathBuf>,
    /// Parent of temporary import directories; the system temp dir when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_work_dir: Option<PathBuf>,
    /// Records fetched per catalog query page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Entry compression for written archives
    #[serde(default)]
    pub compression: Compression,
    /// Revert retry settings
    #[serde(default)]
    pub revert: RevertConfig,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for MetavaultConfig {
    fn default() -> Self {
        Self {
            export_directory: None,
            offline_root_path: None,
            import_work_dir: None,
            page_size: default_page_size(),
            compression: Compression::default(),
            revert: RevertConfig::default(),
        }
    }
}

impl MetavaultConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Metavault configuration
#
# Directory that receives exports requested without an explicit output path.
# export_directory = "/data/exports"

# Root directory for offline archives. Moving records offline fails until
# this is set to an existing directory.
# offline_root_path = "/data/offline"

# Parent of the temporary directories imports unpack into.
# Defaults to the system temp directory.
# import_work_dir = "/var/tmp"

# Records fetched per catalog query page (default: 64)
page_size = 64

# Entry compression for written archives: "deflated" (default) or "stored"
compression = "deflated"

[revert]
# Update attempts while the catalog index catches up (default: 4)
max_attempts = 4
# Pause between attempts in milliseconds (default: 350)
delay_ms = 350
"#
    }

    /// Check values that parse but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid(
                "page_size must be at least 1".to_string(),
            ));
        }
        if self.revert.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "revert.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: MetavaultConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|source| ConfigError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    // ========================================================================
    // Component options
    // ========================================================================

    /// Settings for [`Exporter`](crate::Exporter)
    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            page_size: self.page_size,
            compression: self.compression,
            export_directory: self.export_directory.clone(),
        }
    }

    /// Settings for [`Importer`](crate::Importer)
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            work_dir: self.import_work_dir.clone(),
            page_size: self.page_size,
        }
    }

    /// Settings for [`OfflineArchiver`](crate::OfflineArchiver)
    pub fn offline_options(&self) -> OfflineOptions {
        OfflineOptions {
            root_path: self.offline_root_path.clone(),
            compression: self.compression,
            page_size: self.page_size,
        }
    }

    /// Retry policy for [`VersionRevertEngine`](crate::VersionRevertEngine)
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.revert.max_attempts,
            Duration::from_millis(self.revert.delay_ms),
        )
    }
}
