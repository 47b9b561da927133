//! Folding walk events into import units
//!
//! [`UnitFolder`] is a small state machine over a [`WalkEvent`] stream. It
//! keeps the unit under construction, attaches content and history to it as
//! events arrive, and emits it when the next primary metacard starts a new
//! unit (or the stream ends). Content files are referenced by path and are
//! not opened here.

use crate::codec::MetacardCodec;
use crate::error::{ArchiveError, ArchiveResult};
use crate::paths::DerivedRole;
use crate::walker::WalkEvent;
use metavault_core::{Metacard, DEFAULT_MIME_TYPE};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// A content file found in an extracted archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlob {
    /// Location of the bytes
    pub path: PathBuf,
    /// File name to present
    pub filename: String,
    /// MIME type guessed from the file extension
    pub mime_type: String,
}

impl ContentBlob {
    /// Describe the file at `path`
    pub fn from_path(path: PathBuf) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(&path)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        ContentBlob {
            path,
            filename,
            mime_type,
        }
    }

    /// Open the bytes for a single read
    pub fn open(&self) -> io::Result<File> {
        File::open(&self.path)
    }
}

/// One record from an archive with everything stored beneath it
#[derive(Debug, Clone, PartialEq)]
pub struct ImportUnit {
    /// The archived record
    pub metacard: Metacard,
    /// Primary content
    pub content: Option<ContentBlob>,
    /// Derived content by role
    pub derived: BTreeMap<DerivedRole, ContentBlob>,
    /// History snapshots, each a unit of its own without further history
    pub history: Vec<ImportUnit>,
}

impl ImportUnit {
    /// A unit with no content
    pub fn new(metacard: Metacard) -> Self {
        ImportUnit {
            metacard,
            content: None,
            derived: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    /// True if the unit carries primary or derived content
    pub fn has_content(&self) -> bool {
        self.content.is_some() || !self.derived.is_empty()
    }
}

/// Iterator adapter that folds walk events into units
pub struct UnitFolder<'a, I> {
    events: I,
    codec: &'a dyn MetacardCodec,
    current: Option<ImportUnit>,
    done: bool,
}

impl<'a, I> UnitFolder<'a, I>
where
    I: Iterator<Item = ArchiveResult<WalkEvent>>,
{
    /// Fold `events`, decoding metacards with `codec`
    pub fn new(events: I, codec: &'a dyn MetacardCodec) -> Self {
        UnitFolder {
            events,
            codec,
            current: None,
            done: false,
        }
    }

    /// Apply one event; returns a finished unit when one is complete
    fn apply(&mut self, event: WalkEvent) -> ArchiveResult<Option<ImportUnit>> {
        match event {
            WalkEvent::Metacard { path, .. } => {
                let metacard = self.codec.decode_file(&path)?;
                Ok(self.current.replace(ImportUnit::new(metacard)))
            }
            WalkEvent::Content { path } => {
                let unit = self.current_unit(&path)?;
                unit.content = Some(ContentBlob::from_path(path));
                Ok(None)
            }
            WalkEvent::Derived { role, path } => {
                self.current_unit(&path)?
                    .derived
                    .insert(role, ContentBlob::from_path(path));
                Ok(None)
            }
            WalkEvent::HistoryMetacard { path, .. } => {
                let metacard = self.codec.decode_file(&path)?;
                self.current_unit(&path)?
                    .history
                    .push(ImportUnit::new(metacard));
                Ok(None)
            }
            WalkEvent::HistoryContent { path } => {
                let unit = self.current_history(&path)?;
                unit.content = Some(ContentBlob::from_path(path));
                Ok(None)
            }
            WalkEvent::HistoryDerived { role, path } => {
                self.current_history(&path)?
                    .derived
                    .insert(role, ContentBlob::from_path(path));
                Ok(None)
            }
        }
    }

    fn current_unit(&mut self, path: &Path) -> ArchiveResult<&mut ImportUnit> {
        self.current.as_mut().ok_or_else(|| orphan(path))
    }

    fn current_history(&mut self, path: &Path) -> ArchiveResult<&mut ImportUnit> {
        self.current
            .as_mut()
            .and_then(|unit| unit.history.last_mut())
            .ok_or_else(|| orphan(path))
    }
}

fn orphan(path: &Path) -> ArchiveError {
    ArchiveError::invalid_layout(format!("{} precedes its metacard", path.display()))
}

impl<I> Iterator for UnitFolder<'_, I>
where
    I: Iterator<Item = ArchiveResult<WalkEvent>>,
{
    type Item = ArchiveResult<ImportUnit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match self.events.next() {
                None => {
                    self.done = true;
                    return self.current.take().map(Ok);
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                Some(Ok(event)) => match self.apply(event) {
                    Ok(Some(unit)) => return Some(Ok(unit)),
                    Ok(None) => continue,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                },
            }
        }
    }
}

/// Fold walk events into import units
pub fn fold_units<'a, I>(events: I, codec: &'a dyn MetacardCodec) -> UnitFolder<'a, I::IntoIter>
where
    I: IntoIterator<Item = ArchiveResult<WalkEvent>>,
{
    UnitFolder::new(events.into_iter(), codec)
}
