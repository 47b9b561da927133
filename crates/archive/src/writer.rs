//! Streaming zip archive writer
//!
//! Entries are streamed straight from their source into the zip container,
//! one at a time, so no entry is ever held in memory as a whole. The archive
//! is written to a temporary sibling file and renamed into place by
//! [`ArchiveWriter::finish`]; a writer dropped before `finish` removes the
//! temporary file, leaving nothing behind.

use crate::error::{ArchiveError, ArchiveResult};
use crate::types::{xxh3_file_hex, ArchiveInfo, WriterOptions};
use rustc_hash::FxHashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::ZipWriter;

/// Writer for entry-by-entry archive construction
pub struct ArchiveWriter {
    path: PathBuf,
    temp_path: PathBuf,
    zip: Option<ZipWriter<BufWriter<File>>>,
    options: FileOptions,
    entries: FxHashSet<String>,
}

impl ArchiveWriter {
    /// Start a new archive that will land at `path`
    pub fn create(path: &Path, options: &WriterOptions) -> ArchiveResult<Self> {
        let temp_path = path.with_extension("tmp");

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(&temp_path)?;
        Ok(Self {
            path: path.to_path_buf(),
            temp_path,
            zip: Some(ZipWriter::new(BufWriter::new(file))),
            options: FileOptions::default().compression_method(options.compression.method()),
            entries: FxHashSet::default(),
        })
    }

    /// Final path of the archive
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if an entry with this path was already added
    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    /// Number of entries added so far
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Stream an entry from a reader, returning the number of bytes copied
    ///
    /// The reader is drained to its end before this returns.
    pub fn add_stream(&mut self, entry: &str, reader: &mut dyn Read) -> ArchiveResult<u64> {
        if !self.entries.insert(entry.to_string()) {
            return Err(ArchiveError::DuplicateEntry(entry.to_string()));
        }
        let options = self.options;
        let zip = self.zip_mut()?;
        zip.start_file(entry, options)?;
        let copied = io::copy(reader, zip)?;
        debug!(target: "metavault::archive", entry, bytes = copied, "Added archive entry");
        Ok(copied)
    }

    /// Add an entry from memory
    pub fn add_bytes(&mut self, entry: &str, data: &[u8]) -> ArchiveResult<u64> {
        let mut reader = data;
        self.add_stream(entry, &mut reader)
    }

    /// Finish the archive and move it into place
    pub fn finish(mut self) -> ArchiveResult<ArchiveInfo> {
        let mut zip = self
            .zip
            .take()
            .ok_or_else(|| ArchiveError::Zip("archive already finished".to_string()))?;

        // Try to finish, clean up on failure
        let finished = zip
            .finish()
            .map_err(ArchiveError::from)
            .and_then(|mut inner| inner.flush().map_err(ArchiveError::from))
            .and_then(|()| fs::rename(&self.temp_path, &self.path).map_err(ArchiveError::from));
        if let Err(e) = finished {
            drop(zip);
            let _ = fs::remove_file(&self.temp_path);
            return Err(e);
        }
        drop(zip);

        let size_bytes = fs::metadata(&self.path)?.len();
        let checksum = xxh3_file_hex(&self.path)?;
        Ok(ArchiveInfo {
            path: self.path.clone(),
            entry_count: self.entries.len(),
            size_bytes,
            checksum,
        })
    }

    fn zip_mut(&mut self) -> ArchiveResult<&mut ZipWriter<BufWriter<File>>> {
        self.zip
            .as_mut()
            .ok_or_else(|| ArchiveError::Zip("archive already finished".to_string()))
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if let Some(zip) = self.zip.take() {
            drop(zip);
            if let Err(e) = fs::remove_file(&self.temp_path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(
                        target: "metavault::archive",
                        path = %self.temp_path.display(),
                        error = %e,
                        "Failed to remove unfinished archive"
                    );
                }
            }
        }
    }
}
