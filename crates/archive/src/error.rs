//! Archive error types

use std::io;
use thiserror::Error;
use zip::result::ZipError;

/// Errors that can occur while building, extracting or walking an archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Zip container error
    #[error("Zip error: {0}")]
    Zip(String),

    /// Metacard encoding or decoding failed
    #[error("Codec error: {0}")]
    Codec(String),

    /// The extracted tree does not follow the archive layout
    #[error("Invalid archive layout: {0}")]
    InvalidLayout(String),

    /// The same entry path was added twice
    #[error("Duplicate archive entry: {0}")]
    DuplicateEntry(String),
}

impl ArchiveError {
    /// Create a codec error
    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    /// Create an invalid layout error
    pub fn invalid_layout(msg: impl Into<String>) -> Self {
        Self::InvalidLayout(msg.into())
    }
}

impl From<ZipError> for ArchiveError {
    fn from(e: ZipError) -> Self {
        match e {
            ZipError::Io(io) => ArchiveError::Io(io),
            other => ArchiveError::Zip(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ArchiveError {
    fn from(e: serde_json::Error) -> Self {
        ArchiveError::Codec(e.to_string())
    }
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;
