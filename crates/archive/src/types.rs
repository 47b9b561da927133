//! Archive writer options and results

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::Xxh3;

/// Compression applied to archive entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Deflate every entry
    #[default]
    Deflated,
    /// Store entries uncompressed
    Stored,
}

impl Compression {
    pub(crate) fn method(self) -> zip::CompressionMethod {
        match self {
            Compression::Deflated => zip::CompressionMethod::Deflated,
            Compression::Stored => zip::CompressionMethod::Stored,
        }
    }
}

/// Options for creating an archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterOptions {
    /// Entry compression
    pub compression: Compression,
}

/// Information about a finished archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    /// Final path of the archive
    pub path: PathBuf,
    /// Number of entries written
    pub entry_count: usize,
    /// Size of the archive file
    pub size_bytes: u64,
    /// xxh3 checksum of the archive file (hex)
    pub checksum: String,
}

/// Compute the xxh3 checksum of a file without loading it into memory
pub fn xxh3_file_hex(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Xxh3::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:016x}", hasher.digest()))
}
