//! Offline archive locations
//!
//! Archives land under `<root>/<shard>/<id>.zip`, where `<shard>` is the first
//! three characters of the id. An existing file is never reused: later
//! archives for the same id take `<id>-1.zip`, `<id>-2.zip`, ...

use metavault_archive::paths::shard;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const ARCHIVE_EXTENSION: &str = "zip";

/// A reserved archive location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflinePath {
    /// Location relative to the offline root, `/`-separated
    pub relative: String,
    /// Location on disk
    pub absolute: PathBuf,
}

/// Pick an unused archive path for `id`, creating its shard directory
pub fn generate(root: &Path, id: &str) -> io::Result<OfflinePath> {
    let shard = shard(id);
    let dir = root.join(shard);
    fs::create_dir_all(&dir)?;

    let mut suffix = 0u32;
    loop {
        let file_name = if suffix == 0 {
            format!("{}.{}", id, ARCHIVE_EXTENSION)
        } else {
            format!("{}-{}.{}", id, suffix, ARCHIVE_EXTENSION)
        };
        let absolute = dir.join(&file_name);
        if !absolute.exists() {
            return Ok(OfflinePath {
                relative: format!("{}/{}", shard, file_name),
                absolute,
            });
        }
        suffix += 1;
    }
}
