//! Walk an extracted archive tree
//!
//! The walker turns the directory layout described in [`crate::paths`] into a
//! flat, ordered sequence of [`WalkEvent`]s. For every record directory it
//! yields the record's metacard, then its content (if any), then its derived
//! entries in role order, then the same sequence for each history snapshot.
//!
//! Directories are listed only when the walk reaches them and entries are
//! sorted by name, so a walk is deterministic. A walker is single pass: once
//! it has returned `None` or an error it yields nothing more.

use crate::error::{ArchiveError, ArchiveResult};
use crate::paths::{
    DerivedRole, CONTENT_DIR, DERIVED_DIR, HISTORY_DIR, METACARDS, METACARD_DIR,
    METACARD_EXTENSION,
};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

/// One step of an archive walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEvent {
    /// Primary record metadata
    Metacard {
        /// Record id, taken from the directory name
        id: String,
        /// Encoded record file
        path: PathBuf,
    },
    /// Primary content of the current record
    Content {
        /// Content file
        path: PathBuf,
    },
    /// Derived content of the current record
    Derived {
        /// Role directory the file was found in
        role: DerivedRole,
        /// Content file
        path: PathBuf,
    },
    /// History snapshot metadata of the current record
    HistoryMetacard {
        /// Snapshot id, taken from the directory name
        id: String,
        /// Encoded snapshot file
        path: PathBuf,
    },
    /// Content of the current history snapshot
    HistoryContent {
        /// Content file
        path: PathBuf,
    },
    /// Derived content of the current history snapshot
    HistoryDerived {
        /// Role directory the file was found in
        role: DerivedRole,
        /// Content file
        path: PathBuf,
    },
}

/// Lazy, single-pass iterator over an extracted archive
pub struct ArchiveWalker {
    shards: std::vec::IntoIter<PathBuf>,
    records: std::vec::IntoIter<PathBuf>,
    pending: VecDeque<WalkEvent>,
    done: bool,
}

impl ArchiveWalker {
    /// Walk the archive extracted under `root`
    ///
    /// A tree without a `metacards` directory walks as empty.
    pub fn new(root: &Path) -> ArchiveResult<Self> {
        let metacards = root.join(METACARDS);
        let shards = if metacards.is_dir() {
            list_dirs(&metacards)?
                .into_iter()
                .filter(|p| name_of(p).map(|n| n.chars().count() == 3).unwrap_or(false))
                .collect()
        } else {
            Vec::new()
        };
        Ok(Self {
            shards: shards.into_iter(),
            records: Vec::new().into_iter(),
            pending: VecDeque::new(),
            done: false,
        })
    }

    fn visit_record(&mut self, record_dir: &Path) -> ArchiveResult<()> {
        self.visit_group(record_dir, false)?;

        let history = record_dir.join(HISTORY_DIR);
        if history.is_dir() {
            for snapshot_dir in list_dirs(&history)? {
                self.visit_group(&snapshot_dir, true)?;
            }
        }
        Ok(())
    }

    fn visit_group(&mut self, dir: &Path, history: bool) -> ArchiveResult<()> {
        let id = name_of(dir)
            .ok_or_else(|| {
                ArchiveError::invalid_layout(format!("non UTF-8 directory {}", dir.display()))
            })?
            .to_string();

        let metacard = dir
            .join(METACARD_DIR)
            .join(format!("{}.{}", id, METACARD_EXTENSION));
        if !metacard.is_file() {
            return Err(ArchiveError::invalid_layout(format!(
                "missing metacard {}",
                metacard.display()
            )));
        }
        self.pending.push_back(if history {
            WalkEvent::HistoryMetacard { id, path: metacard }
        } else {
            WalkEvent::Metacard { id, path: metacard }
        });

        let content_dir = dir.join(CONTENT_DIR);
        if content_dir.is_dir() {
            if let Some(path) = list_files(&content_dir)?.into_iter().next() {
                self.pending.push_back(if history {
                    WalkEvent::HistoryContent { path }
                } else {
                    WalkEvent::Content { path }
                });
            }
        }

        let derived_dir = dir.join(DERIVED_DIR);
        if derived_dir.is_dir() {
            let mut roles = Vec::new();
            for role_dir in list_dirs(&derived_dir)? {
                let role: DerivedRole = name_of(&role_dir)
                    .unwrap_or_default()
                    .parse()
                    .map_err(ArchiveError::InvalidLayout)?;
                if let Some(path) = list_files(&role_dir)?.into_iter().next() {
                    roles.push((role, path));
                }
            }
            roles.sort_by_key(|(role, _)| *role);
            for (role, path) in roles {
                self.pending.push_back(if history {
                    WalkEvent::HistoryDerived { role, path }
                } else {
                    WalkEvent::Derived { role, path }
                });
            }
        }
        Ok(())
    }

    fn advance(&mut self) -> ArchiveResult<bool> {
        if let Some(record_dir) = self.records.next() {
            self.visit_record(&record_dir)?;
            return Ok(true);
        }
        match self.shards.next() {
            Some(shard) => {
                self.records = list_dirs(&shard)?.into_iter();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl Iterator for ArchiveWalker {
    type Item = ArchiveResult<WalkEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }
            match self.advance() {
                Ok(true) => continue,
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Count the top-level records in an extracted archive
pub fn count_units(root: &Path) -> ArchiveResult<usize> {
    let mut count = 0;
    for event in ArchiveWalker::new(root)? {
        if let WalkEvent::Metacard { .. } = event? {
            count += 1;
        }
    }
    Ok(count)
}

fn name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn list_dirs(dir: &Path) -> ArchiveResult<Vec<PathBuf>> {
    list(dir, true)
}

fn list_files(dir: &Path) -> ArchiveResult<Vec<PathBuf>> {
    list(dir, false)
}

fn list(dir: &Path, dirs: bool) -> ArchiveResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() == dirs {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}
