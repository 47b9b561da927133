//! Error types shared by catalog collaborators
//!
//! Catalog writes report per-record problems as [`ProcessingError`] data in a
//! [`WriteResponse`](crate::WriteResponse) rather than failing the call; the
//! error enums here cover whole-call failures.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for catalog operations
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Result type alias for content storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A per-record problem reported by a catalog write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingError {
    /// Record the problem applies to, if known
    pub id: Option<String>,
    /// Description
    pub message: String,
}

impl ProcessingError {
    /// Problem with a specific record
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        ProcessingError {
            id: Some(id.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}: {}", id, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Catalog query and write failures
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The filter cannot be evaluated
    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    /// The catalog cannot be reached
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// A create, update or delete was refused
    #[error("Ingest failed: {0}")]
    Ingest(String),

    /// No record with the given id
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The write completed with per-record errors
    #[error("Processing errors: {}", join(.0))]
    Processing(Vec<ProcessingError>),
}

impl CatalogError {
    /// Create an ingest error
    pub fn ingest(msg: impl Into<String>) -> Self {
        CatalogError::Ingest(msg.into())
    }
}

fn join(errors: &[ProcessingError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failures fetching a resource
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Nothing stored under the locator
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The locator's scheme is not served locally
    #[error("Resource not supported: {0}")]
    NotSupported(String),

    /// Reading the resource failed
    #[error("Resource I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Content storage failures
#[derive(Debug, Error)]
pub enum StorageError {
    /// Nothing stored at the address
    #[error("Content not found: {0}")]
    NotFound(String),

    /// Commit or rollback of a request that was never staged
    #[error("Unknown staged request: {0}")]
    UnknownRequest(String),

    /// Reading the incoming stream failed
    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other storage failure
    #[error("Storage error: {0}")]
    Storage(String),
}
