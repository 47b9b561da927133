//! Moving record content offline
//!
//! An offline move packs a record, its version history and all of their
//! content into one zip archive under the configured offline root, removes
//! the content from primary storage and leaves a catalog entry that records
//! where the archive went.
//!
//! ## Ordering
//!
//! Every check runs before anything is written: the root path, the record
//! lookup and the already-offline test. The archive is then written in full
//! and renamed into place before any content is deleted, so a failure while
//! packing leaves the record untouched.
//!
//! Bulk calls never stop early. Each id gets an outcome: an empty string on
//! success or a reason a person can read.

mod attributes;
mod path;
mod policy;

pub use attributes::{strip_resource_pointers, OfflineStamp};
pub use path::{generate as generate_offline_path, OfflinePath};
pub use policy::OfflineEditPolicy;

use crate::config::DEFAULT_PAGE_SIZE;
use metavault_archive::paths::{
    content_path, derived_path, history_content_path, history_derived_path,
    history_metacard_path, metacard_path,
};
use metavault_archive::{
    assign_derived_roles, ArchiveError, ArchiveInfo, ArchiveWriter, Compression, MetacardCodec,
    WriterOptions,
};
use metavault_core::attributes::{self as attr, tags};
use metavault_core::{
    pretty_bytes, query_all, Catalog, CatalogError, Clock, ContentRef, ContentStore, Filter,
    Metacard, PagedResults, Principal, QueryRequest, Resource, ResourceError, ResourceUri,
    StorageError, SystemClock,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Outcome per requested id; an empty reason means the move succeeded
pub type OfflineOutcomes = BTreeMap<String, String>;

/// Why a single record could not be moved offline
///
/// The display text of each variant is the reason reported for the id.
#[derive(Debug, Error)]
pub enum OfflineError {
    /// No usable offline root
    #[error("Root output path must be configured and exist.")]
    RootPathUnavailable,

    /// Nothing in the local catalog under the id
    #[error("The metacard was not found.")]
    NotFound,

    /// The record already carries an offline date
    #[error("The metacard is already offlined.")]
    AlreadyOffline,

    /// The archive location could not be prepared
    #[error("Unable to create zip file.")]
    Location(#[source] io::Error),

    /// Writing an archive entry failed
    #[error("Offline failed during zip creation")]
    Archive(#[from] ArchiveError),

    /// Content could not be read for packing
    #[error("Offline failed during zip creation")]
    Resource(#[from] ResourceError),

    /// The catalog lookup failed
    #[error("Unable to query the catalog: {0}")]
    Catalog(#[from] CatalogError),

    /// Content could not be removed from primary storage
    #[error("Unable to delete content: {0}")]
    Storage(#[from] StorageError),

    /// The stripped record could not be written back
    #[error("Unable to update the metacard: {0}")]
    Update(#[source] CatalogError),

    /// An edit to an offline record was refused
    #[error("Edits to offline metacard {0} are restricted")]
    Restricted(String),
}

/// Offline settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineOptions {
    /// Directory receiving offline archives; moves fail until it is set
    pub root_path: Option<PathBuf>,
    /// Entry compression
    pub compression: Compression,
    /// Records fetched per catalog query page
    pub page_size: usize,
}

impl Default for OfflineOptions {
    fn default() -> Self {
        Self {
            root_path: None,
            compression: Compression::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Moves records and their history into offline archives
pub struct OfflineArchiver {
    catalog: Arc<dyn Catalog>,
    content: Arc<dyn ContentStore>,
    principal: Arc<dyn Principal>,
    codec: Arc<dyn MetacardCodec>,
    clock: Arc<dyn Clock>,
    options: OfflineOptions,
}

impl OfflineArchiver {
    /// Archiver writing with the wall clock
    pub fn new(
        catalog: Arc<dyn Catalog>,
        content: Arc<dyn ContentStore>,
        principal: Arc<dyn Principal>,
        codec: Arc<dyn MetacardCodec>,
        options: OfflineOptions,
    ) -> Self {
        Self {
            catalog,
            content,
            principal,
            codec,
            clock: Arc::new(SystemClock),
            options,
        }
    }

    /// Builder: time source for offline dates
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Move each id offline independently
    pub fn move_offline(&self, ids: &[String], comment: &str) -> OfflineOutcomes {
        let mut outcomes = OfflineOutcomes::new();
        for id in ids {
            let reason = match self.move_resource_offline(id, comment) {
                Ok(_) => String::new(),
                Err(e) => {
                    warn!(target: "metavault::offline", id = %id, error = ?e, "Failed to move metacard offline");
                    e.to_string()
                }
            };
            outcomes.insert(id.clone(), reason);
        }
        outcomes
    }

    /// Move every local record matching `filter` offline
    ///
    /// Revisions are carried along with their record and are not moved on
    /// their own.
    pub fn move_offline_matching(
        &self,
        filter: Filter,
        comment: &str,
    ) -> Result<OfflineOutcomes, CatalogError> {
        let request = QueryRequest::new(filter, self.options.page_size).local();
        let mut seen = BTreeSet::new();
        let mut ids = Vec::new();
        for result in PagedResults::new(self.catalog.as_ref(), request) {
            let metacard = result?;
            if !metacard.is_revision() && seen.insert(metacard.id.clone()) {
                ids.push(metacard.id);
            }
        }
        debug!(target: "metavault::offline", matched = ids.len(), "Resolved offline filter");
        Ok(self.move_offline(&ids, comment))
    }

    /// Move one record offline, returning the archive written
    pub fn move_resource_offline(
        &self,
        id: &str,
        comment: &str,
    ) -> Result<ArchiveInfo, OfflineError> {
        let started = Instant::now();
        let root = self.root_path()?;

        let filter = Filter::any_of([Filter::id(id), Filter::equals(attr::VERSION_OF_ID, id)]);
        let records = query_all(
            self.catalog.as_ref(),
            QueryRequest::new(filter, self.options.page_size).local(),
        )?;
        let primary = records
            .iter()
            .find(|m| m.id == id && !m.is_revision())
            .ok_or(OfflineError::NotFound)?;
        if primary.offline_date().is_some() {
            return Err(OfflineError::AlreadyOffline);
        }
        let history: Vec<&Metacard> = records
            .iter()
            .filter(|m| m.is_revision() && m.version_of_id() == Some(id))
            .collect();

        let location = path::generate(&root, id).map_err(OfflineError::Location)?;
        let mut writer = ArchiveWriter::create(
            &location.absolute,
            &WriterOptions {
                compression: self.options.compression,
            },
        )?;
        let mut written = vec![(primary, self.pack(&mut writer, primary, None)?)];
        for revision in history {
            let refs = self.pack(&mut writer, revision, Some(id))?;
            written.push((revision, refs));
        }
        let info = writer.finish()?;

        let stamp = OfflineStamp {
            comment: comment.to_string(),
            location: location.relative.clone(),
            offlined_by: self.principal.whoami(),
            date: self.clock.now(),
        };
        for (record, refs) in written {
            self.delete_content(&record.id, refs)?;
            if !record.is_revision() {
                let mut updated = record.clone();
                stamp.apply(&mut updated);
                self.catalog
                    .update(&record.id, updated)
                    .and_then(|r| r.into_result())
                    .map_err(OfflineError::Update)?;
            }
        }

        info!(
            target: "metavault::offline",
            id,
            path = %location.relative,
            entries = info.entry_count,
            size = %pretty_bytes(info.size_bytes),
            duration_ms = started.elapsed().as_millis() as u64,
            "Moved metacard offline"
        );
        Ok(info)
    }

    fn root_path(&self) -> Result<PathBuf, OfflineError> {
        let root = self
            .options
            .root_path
            .as_ref()
            .ok_or(OfflineError::RootPathUnavailable)?;
        let writable = fs::metadata(root)
            .map(|m| m.is_dir() && !m.permissions().readonly())
            .unwrap_or(false);
        if !writable {
            return Err(OfflineError::RootPathUnavailable);
        }
        Ok(root.clone())
    }

    // ========================================================================
    // Packing
    // ========================================================================

    /// Write a record and its content; returns the content addresses packed
    fn pack(
        &self,
        writer: &mut ArchiveWriter,
        record: &Metacard,
        history_of: Option<&str>,
    ) -> Result<BTreeSet<ContentRef>, OfflineError> {
        let entry = match history_of {
            None => metacard_path(&record.id),
            Some(primary) => history_metacard_path(primary, &record.id),
        };
        writer.add_bytes(&entry, &self.codec.encode(record)?)?;

        let mut packed = BTreeSet::new();
        if record.has_tag(tags::DELETED) {
            return Ok(packed);
        }

        if let Some(uri) = record.resource_uri.as_deref().and_then(local_uri) {
            if let Some(mut resource) = self.fetch(&uri)? {
                let filename = resource_name(&resource, &record.id);
                let entry = match history_of {
                    None => content_path(&record.id, &filename),
                    Some(primary) => history_content_path(primary, &record.id, &filename),
                };
                writer.add_stream(&entry, &mut resource.stream)?;
                packed.insert(ContentRef::from_uri(&uri));
            }
        }

        for (role, raw) in assign_derived_roles(&record.derived_resource_uris) {
            let Some(uri) = local_uri(raw) else {
                debug!(target: "metavault::offline", id = %record.id, uri = raw, "Skipping derived locator");
                continue;
            };
            if let Some(mut resource) = self.fetch(&uri)? {
                let filename = resource_name(&resource, &record.id);
                let entry = match history_of {
                    None => derived_path(&record.id, role, &filename),
                    Some(primary) => history_derived_path(primary, &record.id, role, &filename),
                };
                writer.add_stream(&entry, &mut resource.stream)?;
                packed.insert(ContentRef::from_uri(&uri));
            }
        }
        Ok(packed)
    }

    fn fetch(&self, uri: &ResourceUri) -> Result<Option<Resource>, OfflineError> {
        match self.catalog.local_resource(uri) {
            Ok(resource) => Ok(Some(resource)),
            Err(ResourceError::NotFound(_)) => {
                debug!(target: "metavault::offline", uri = %uri, "No local content to pack");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn delete_content(&self, id: &str, refs: BTreeSet<ContentRef>) -> Result<(), OfflineError> {
        if refs.is_empty() {
            return Ok(());
        }
        let request = self.content.stage_delete(refs.into_iter().collect())?;
        if let Err(e) = self.content.commit(&request) {
            if let Err(rollback) = self.content.rollback(&request) {
                warn!(target: "metavault::offline", id, error = %rollback, "Failed to roll back content delete");
            }
            return Err(e.into());
        }
        debug!(target: "metavault::offline", id, "Deleted content from primary storage");
        Ok(())
    }
}

/// A `content:` locator, or `None` for anything not held locally
fn local_uri(raw: &str) -> Option<ResourceUri> {
    ResourceUri::parse(raw).ok().filter(ResourceUri::is_content)
}

fn resource_name(resource: &Resource, fallback: &str) -> String {
    if resource.name.is_empty() {
        fallback.to_string()
    } else {
        resource.name.clone()
    }
}
