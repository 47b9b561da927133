//! Metacard encoding inside archives
//!
//! Archives store one encoded record per `metacard/<id>.xml` entry. The codec
//! is pluggable so deployments can swap in the catalog's own transformer; the
//! default writes pretty-printed JSON.

use crate::error::{ArchiveError, ArchiveResult};
use metavault_core::Metacard;
use std::fs;
use std::path::Path;

/// Encodes records for archive entries and decodes them back
pub trait MetacardCodec: Send + Sync {
    /// Encode a record
    fn encode(&self, metacard: &Metacard) -> ArchiveResult<Vec<u8>>;

    /// Decode a record
    fn decode(&self, bytes: &[u8]) -> ArchiveResult<Metacard>;

    /// Decode a record stored in a file
    fn decode_file(&self, path: &Path) -> ArchiveResult<Metacard> {
        let bytes = fs::read(path)?;
        self.decode(&bytes).map_err(|e| match e {
            ArchiveError::Codec(msg) => {
                ArchiveError::codec(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }
}

/// Pretty-printed JSON codec
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MetacardCodec for JsonCodec {
    fn encode(&self, metacard: &Metacard) -> ArchiveResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(metacard)?)
    }

    fn decode(&self, bytes: &[u8]) -> ArchiveResult<Metacard> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
