//! Archive extraction

use crate::error::{ArchiveError, ArchiveResult};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

/// Unpack a zip archive into `into`, returning the number of files written
///
/// Entries whose names would escape `into` (absolute paths, `..` segments)
/// fail the whole extraction.
pub fn extract_archive(zip_path: &Path, into: &Path) -> ArchiveResult<u64> {
    let file = File::open(zip_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file))?;
    fs::create_dir_all(into)?;

    let mut written = 0u64;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let relative = entry.enclosed_name().map(Path::to_path_buf).ok_or_else(|| {
            ArchiveError::invalid_layout(format!("unsafe entry name '{}'", entry.name()))
        })?;
        let out_path = into.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut entry, &mut out)?;
        written += 1;
    }

    debug!(
        target: "metavault::archive",
        archive = %zip_path.display(),
        files = written,
        "Extracted archive"
    );
    Ok(written)
}
