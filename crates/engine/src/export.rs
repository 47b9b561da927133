//! Catalog export
//!
//! Writes every record matching a filter, the version history of each, and
//! the locally held content of all of them into one zip archive.
//!
//! ## Phases
//!
//! 1. **Metadata**: results are paged lazily; each record not seen before is
//!    encoded into the archive, followed by its history. Records that fail to
//!    encode are skipped and listed in `errors.json`.
//! 2. **Association check**: when the export deletes what it wrote, any
//!    `metacard.related` / `metacard.derived` reference to an exported id
//!    would dangle afterwards. The request's [`AssociationPolicy`] decides
//!    whether that aborts the export.
//! 3. **Content**: primary content is fetched once per content address, then
//!    derived content for non-revision records.
//! 4. **Delete** (optional): content, records and cache entries go, each
//!    failure reported without stopping the rest.
//! 5. **Tombstone** (optional): one summary record is created describing
//!    what was exported and where it went.

use crate::config::DEFAULT_PAGE_SIZE;
use metavault_archive::paths::{content_path, derived_path, metacard_path, ERRORS_FILE};
use metavault_archive::{
    assign_derived_roles, ArchiveError, ArchiveInfo, ArchiveWriter, Compression, MetacardCodec,
    WriterOptions,
};
use metavault_core::attributes::{self as attr, tags};
use metavault_core::{
    pretty_bytes, Attribute, Catalog, CatalogError, Clock, ContentRef, ContentStore, Filter,
    Metacard, PagedResults, QueryRequest, ResourceError, ResourceUri, SystemClock,
};
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

// ============================================================================
// Errors
// ============================================================================

/// Failures that abort an export
#[derive(Debug, Error)]
pub enum ExportError {
    /// The output file is already there
    #[error("File [{}] already exists!", .0.display())]
    OutputExists(PathBuf),

    /// The output's directory is missing
    #[error("Directory [{}] must exist.", .0.display())]
    MissingDirectory(PathBuf),

    /// The output name is not a zip file name
    #[error("Filename must end with '.zip' and not be blank: {}", .0.display())]
    InvalidFileName(PathBuf),

    /// No output path was given and no export directory is configured
    #[error("No output path given and no export directory configured")]
    NoOutput,

    /// Deleting the exported records would leave references dangling
    #[error("This export will break {} associations currently in the catalog", .0.len())]
    BrokenAssociations(BTreeSet<String>),

    /// A catalog query failed
    #[error("Catalog query failed: {0}")]
    Catalog(#[from] CatalogError),

    /// Writing the archive failed
    #[error("Archive write failed: {0}")]
    Archive(#[from] ArchiveError),

    /// Primary content could not be read
    #[error("Unable to retrieve resource for {id}: {source}")]
    Resource {
        /// Record whose content failed
        id: String,
        /// Cause
        source: ResourceError,
    },
}

/// Result type alias for exports
pub type ExportResult<T> = std::result::Result<T, ExportError>;

// ============================================================================
// Request and summary
// ============================================================================

/// What to do when deleting exported records would break associations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssociationPolicy {
    /// Stop before anything is deleted
    #[default]
    Abort,
    /// Log the broken associations and carry on
    Continue,
}

/// An export to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    /// Records to export
    pub filter: Filter,
    /// Archive file, or a directory to generate a name in; the configured
    /// export directory when `None`
    pub output: Option<PathBuf>,
    /// Free text recorded on the tombstone describing where the archive goes
    pub location: String,
    /// Delete exported records and content once the archive is written
    pub delete_after: bool,
    /// Do not create a tombstone record
    pub skip_tombstone: bool,
    /// Restrict the filter to deletion markers
    pub deleted_only: bool,
    /// Handling of associations broken by `delete_after`
    pub association_policy: AssociationPolicy,
}

impl ExportRequest {
    /// Export everything matching `filter` into the configured directory
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            output: None,
            location: String::new(),
            delete_after: false,
            skip_tombstone: false,
            deleted_only: false,
            association_policy: AssociationPolicy::default(),
        }
    }

    /// Builder: archive file or directory
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Builder: tombstone location text
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    /// Builder: delete what was exported
    pub fn delete_after(mut self) -> Self {
        self.delete_after = true;
        self
    }

    /// Builder: skip the tombstone
    pub fn skip_tombstone(mut self) -> Self {
        self.skip_tombstone = true;
        self
    }

    /// Builder: deletion markers only
    pub fn deleted_only(mut self) -> Self {
        self.deleted_only = true;
        self
    }

    /// Builder: association handling
    pub fn with_association_policy(mut self, policy: AssociationPolicy) -> Self {
        self.association_policy = policy;
        self
    }
}

/// Kind of exported record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemClass {
    /// Deletion marker
    Deleted,
    /// Version snapshot
    Revision,
    /// Anything else
    NonHistory,
}

impl ItemClass {
    /// Classify by tag; `deleted` wins over `revision`
    pub fn of(metacard: &Metacard) -> Self {
        if metacard.has_tag(tags::DELETED) {
            ItemClass::Deleted
        } else if metacard.has_tag(tags::REVISION) {
            ItemClass::Revision
        } else {
            ItemClass::NonHistory
        }
    }
}

/// A record written to the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportItem {
    /// Record id
    pub id: String,
    /// Kind of record
    pub class: ItemClass,
    /// Primary content locator
    pub resource_uri: Option<String>,
    /// Derived content locators
    pub derived_uris: Vec<String>,
    /// Title
    pub title: Option<String>,
}

impl ExportItem {
    fn from_metacard(metacard: &Metacard) -> Self {
        Self {
            id: metacard.id.clone(),
            class: ItemClass::of(metacard),
            resource_uri: metacard.resource_uri.clone(),
            derived_uris: metacard.derived_resource_uris.clone(),
            title: metacard.title.clone(),
        }
    }

    /// `<id>:<title>` as listed on the tombstone
    pub fn tombstone_entry(&self) -> String {
        format!("{}:{}", self.id, self.title.as_deref().unwrap_or_default())
    }

    /// Parsed `content:` locator of the primary content
    fn content_uri(&self) -> Option<ResourceUri> {
        self.resource_uri
            .as_deref()
            .and_then(|u| ResourceUri::parse(u).ok())
            .filter(ResourceUri::is_content)
    }

    /// True if the primary content should be written for this item
    ///
    /// Deletion markers own no content; revisions only when the content
    /// address is their own.
    fn owns_content(&self, uri: &ResourceUri) -> bool {
        match self.class {
            ItemClass::Deleted => false,
            ItemClass::Revision => uri.scheme_specific_part() == self.id,
            ItemClass::NonHistory => true,
        }
    }
}

/// A record the export could not handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFailure {
    /// Record id
    pub id: String,
    /// Title, when known
    pub title: Option<String>,
    /// What went wrong
    pub message: String,
}

/// What an export did
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// The finished archive
    pub archive: ArchiveInfo,
    /// Records written, in archive order
    pub items: Vec<ExportItem>,
    /// Records whose primary content was written
    pub content_items: Vec<ExportItem>,
    /// Records that could not be encoded (also listed in `errors.json`)
    pub failures: Vec<ExportFailure>,
    /// Ids removed from the catalog
    pub deleted_ids: Vec<String>,
    /// Deletions of records or content that failed
    pub delete_failures: Vec<ExportFailure>,
    /// Exported ids still referenced by exported records
    pub broken_associations: BTreeSet<String>,
    /// Id of the tombstone record, when one was created
    pub tombstone_id: Option<String>,
    /// False when a tombstone was wanted but could not be created
    pub tombstone_created: bool,
}

impl ExportSummary {
    /// True if every step fully succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.delete_failures.is_empty() && self.tombstone_created
    }
}

// ============================================================================
// Exporter
// ============================================================================

/// Export settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Records fetched per catalog query page
    pub page_size: usize,
    /// Entry compression
    pub compression: Compression,
    /// Directory used when a request names no output
    pub export_directory: Option<PathBuf>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            compression: Compression::default(),
            export_directory: None,
        }
    }
}

/// Records seen during the metadata walk
#[derive(Default)]
struct Walk {
    seen: FxHashSet<String>,
    associations: FxHashSet<String>,
    items: Vec<ExportItem>,
    failures: Vec<ExportFailure>,
}

/// Writes catalog records and content to archives
pub struct Exporter {
    catalog: Arc<dyn Catalog>,
    content: Arc<dyn ContentStore>,
    codec: Arc<dyn MetacardCodec>,
    clock: Arc<dyn Clock>,
    options: ExportOptions,
}

impl Exporter {
    /// Exporter using the wall clock
    pub fn new(
        catalog: Arc<dyn Catalog>,
        content: Arc<dyn ContentStore>,
        codec: Arc<dyn MetacardCodec>,
        options: ExportOptions,
    ) -> Self {
        Self {
            catalog,
            content,
            codec,
            clock: Arc::new(SystemClock),
            options,
        }
    }

    /// Builder: time source for generated names and tombstones
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run an export
    pub fn export(&self, request: &ExportRequest) -> ExportResult<ExportSummary> {
        let started = Instant::now();
        let output = self.resolve_output(request)?;
        let filter = if request.deleted_only {
            Filter::all_of([request.filter.clone(), Filter::tag(tags::DELETED)])
        } else {
            request.filter.clone()
        };
        info!(target: "metavault::export", path = %output.display(), "Starting export");

        let mut writer = ArchiveWriter::create(
            &output,
            &WriterOptions {
                compression: self.options.compression,
            },
        )?;

        let walk = self.export_metadata(&mut writer, filter)?;
        info!(
            target: "metavault::export",
            records = walk.items.len(),
            failures = walk.failures.len(),
            "Metacards exported"
        );

        let broken_associations: BTreeSet<String> = walk
            .associations
            .iter()
            .filter(|id| walk.seen.contains(*id))
            .cloned()
            .collect();
        if request.delete_after && !broken_associations.is_empty() {
            warn!(
                target: "metavault::export",
                count = broken_associations.len(),
                "Export will break associations currently in the catalog"
            );
            if request.association_policy == AssociationPolicy::Abort {
                return Err(ExportError::BrokenAssociations(broken_associations));
            }
        }

        if !walk.failures.is_empty() {
            let listing = serde_json::to_vec_pretty(&walk.failures).map_err(ArchiveError::from)?;
            writer.add_bytes(ERRORS_FILE, &listing)?;
        }

        let content_items = self.export_content(&mut writer, &walk.items)?;
        let archive = writer.finish()?;
        info!(
            target: "metavault::export",
            content = content_items.len(),
            size = %pretty_bytes(archive.size_bytes),
            "Content exported"
        );

        let mut summary = ExportSummary {
            archive,
            items: walk.items,
            content_items,
            failures: walk.failures,
            deleted_ids: Vec::new(),
            delete_failures: Vec::new(),
            broken_associations,
            tombstone_id: None,
            tombstone_created: true,
        };

        if request.delete_after {
            self.delete_exported(&mut summary);
        }
        if !request.skip_tombstone {
            self.create_tombstone(request, &mut summary);
        }

        info!(
            target: "metavault::export",
            path = %summary.archive.path.display(),
            records = summary.items.len(),
            deleted = summary.deleted_ids.len(),
            tombstone = summary.tombstone_created,
            duration_ms = started.elapsed().as_millis() as u64,
            "Export complete"
        );
        Ok(summary)
    }

    /// Settle the archive path and check it before any work is done
    fn resolve_output(&self, request: &ExportRequest) -> ExportResult<PathBuf> {
        let requested = match &request.output {
            Some(path) => path.clone(),
            None => self
                .options
                .export_directory
                .clone()
                .ok_or(ExportError::NoOutput)?,
        };
        let output = if requested.is_dir() {
            requested.join(generated_name(self.clock.as_ref()))
        } else {
            requested
        };

        if output.exists() {
            return Err(ExportError::OutputExists(output));
        }
        let parent = match output.parent() {
            Some(p) if p.as_os_str().is_empty() => Path::new("."),
            Some(p) => p,
            None => return Err(ExportError::MissingDirectory(output)),
        };
        if !parent.is_dir() {
            return Err(ExportError::MissingDirectory(parent.to_path_buf()));
        }
        let valid_name = output
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.len() > ".zip".len() && n.ends_with(".zip"))
            .unwrap_or(false);
        if !valid_name {
            return Err(ExportError::InvalidFileName(output));
        }
        Ok(output)
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    fn export_metadata(&self, writer: &mut ArchiveWriter, filter: Filter) -> ExportResult<Walk> {
        let mut walk = Walk::default();
        let request = QueryRequest::new(filter, self.options.page_size);
        for result in PagedResults::new(self.catalog.as_ref(), request) {
            let metacard = result?;
            self.write_record(writer, &metacard, &mut walk)?;

            let Some(key) = history_key(&metacard) else {
                continue;
            };
            let history = QueryRequest::new(Filter::history_of(key), self.options.page_size);
            for revision in PagedResults::new(self.catalog.as_ref(), history) {
                self.write_record(writer, &revision?, &mut walk)?;
            }
        }
        Ok(walk)
    }

    fn write_record(
        &self,
        writer: &mut ArchiveWriter,
        metacard: &Metacard,
        walk: &mut Walk,
    ) -> ExportResult<()> {
        if walk.seen.contains(&metacard.id) {
            return Ok(());
        }
        let encoded = match self.codec.encode(metacard) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(target: "metavault::export", id = %metacard.id, error = %e, "Could not encode metacard, skipping");
                walk.failures.push(ExportFailure {
                    id: metacard.id.clone(),
                    title: metacard.title.clone(),
                    message: e.to_string(),
                });
                return Ok(());
            }
        };
        writer.add_bytes(&metacard_path(&metacard.id), &encoded)?;

        walk.seen.insert(metacard.id.clone());
        walk.associations
            .extend(metacard.associations().map(str::to_string));
        walk.items.push(ExportItem::from_metacard(metacard));
        Ok(())
    }

    // ========================================================================
    // Content
    // ========================================================================

    fn export_content(
        &self,
        writer: &mut ArchiveWriter,
        items: &[ExportItem],
    ) -> ExportResult<Vec<ExportItem>> {
        let mut addresses = FxHashSet::default();
        let mut exported = Vec::new();
        for item in items {
            let Some(uri) = item.content_uri() else {
                continue;
            };
            if !item.owns_content(&uri) || !addresses.insert(uri.scheme_specific_part().to_string()) {
                continue;
            }

            let mut resource = match self.catalog.local_resource(&uri) {
                Ok(resource) => resource,
                Err(ResourceError::NotFound(_)) => {
                    debug!(target: "metavault::export", id = %item.id, uri = %uri, "No local content, skipping");
                    continue;
                }
                Err(source) => {
                    return Err(ExportError::Resource {
                        id: item.id.clone(),
                        source,
                    })
                }
            };
            writer.add_stream(&content_path(&item.id, &resource.name), &mut resource.stream)?;
            exported.push(item.clone());

            if item.class != ItemClass::Revision {
                self.export_derived(writer, item)?;
            }
        }
        Ok(exported)
    }

    fn export_derived(&self, writer: &mut ArchiveWriter, item: &ExportItem) -> ExportResult<()> {
        for (role, raw) in assign_derived_roles(&item.derived_uris) {
            let uri = match ResourceUri::parse(raw) {
                Ok(uri) => uri,
                Err(e) => {
                    debug!(target: "metavault::export", id = %item.id, uri = raw, error = %e, "Invalid derived locator, skipping");
                    continue;
                }
            };
            let mut resource = match self.catalog.local_resource(&uri) {
                Ok(resource) => resource,
                Err(e @ (ResourceError::NotFound(_) | ResourceError::NotSupported(_))) => {
                    warn!(target: "metavault::export", id = %item.id, uri = %uri, error = %e, "Unable to retrieve derived resource");
                    continue;
                }
                Err(source) => {
                    return Err(ExportError::Resource {
                        id: item.id.clone(),
                        source,
                    })
                }
            };
            writer.add_stream(
                &derived_path(&item.id, role, &resource.name),
                &mut resource.stream,
            )?;
        }
        Ok(())
    }

    // ========================================================================
    // Delete and tombstone
    // ========================================================================

    fn delete_exported(&self, summary: &mut ExportSummary) {
        for item in &summary.content_items {
            let Some(uri) = item.content_uri() else {
                continue;
            };
            let mut refs = vec![ContentRef::from_uri(&uri)];
            refs.extend(
                item.derived_uris
                    .iter()
                    .filter_map(|u| ResourceUri::parse(u).ok())
                    .filter(ResourceUri::is_content)
                    .map(|u| ContentRef::from_uri(&u)),
            );
            if let Err(message) = self.delete_content(refs) {
                warn!(target: "metavault::export", id = %item.id, error = %message, "Could not delete content");
                summary.delete_failures.push(ExportFailure {
                    id: item.id.clone(),
                    title: item.title.clone(),
                    message,
                });
            }
        }

        for item in &summary.items {
            let ids = [item.id.clone()];
            match self.catalog.delete(&ids).and_then(|r| r.into_result()) {
                Ok(_) => summary.deleted_ids.push(item.id.clone()),
                Err(e) => {
                    warn!(target: "metavault::export", id = %item.id, error = %e, "Could not delete metacard");
                    summary.delete_failures.push(ExportFailure {
                        id: item.id.clone(),
                        title: item.title.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let ids: Vec<String> = summary.items.iter().map(|i| i.id.clone()).collect();
        if let Err(e) = self.catalog.evict_cached(&ids) {
            warn!(
                target: "metavault::export",
                error = %e,
                "Could not delete all exported items from cache (results will eventually expire)"
            );
        }
        info!(
            target: "metavault::export",
            metacards = summary.deleted_ids.len(),
            content = summary.content_items.len(),
            failures = summary.delete_failures.len(),
            "Deleted exported records"
        );
    }

    fn delete_content(&self, refs: Vec<ContentRef>) -> Result<(), String> {
        let request = self.content.stage_delete(refs).map_err(|e| e.to_string())?;
        self.content.commit(&request).map_err(|e| {
            if let Err(rollback) = self.content.rollback(&request) {
                debug!(target: "metavault::export", error = %rollback, "Rollback of content delete failed");
            }
            e.to_string()
        })
    }

    fn create_tombstone(&self, request: &ExportRequest, summary: &mut ExportSummary) {
        let file_name = summary
            .archive
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let entries = summary
            .items
            .iter()
            .filter(|i| i.class != ItemClass::Revision)
            .map(ExportItem::tombstone_entry);

        let mut tombstone = Metacard::new(uuid::Uuid::new_v4().simple().to_string())
            .with_title(file_name)
            .with_tag(tags::EXPORT_TOMBSTONE);
        tombstone.set_attribute(attr::EXPORTED_DATA, Attribute::multi(entries));
        tombstone.set(attr::EXPORTED_LOCATION, request.location.clone());
        tombstone.set(attr::EXPORTED_TIME, self.clock.now());

        let id = tombstone.id.clone();
        match self
            .catalog
            .create(vec![tombstone])
            .and_then(|r| r.into_result())
        {
            Ok(_) => {
                debug!(target: "metavault::export", id = %id, "Created export tombstone");
                summary.tombstone_id = Some(id);
            }
            Err(e) => {
                warn!(target: "metavault::export", error = %e, "Could not create the tombstone metacard");
                summary.tombstone_created = false;
            }
        }
    }
}

/// Id whose history accompanies a record; revisions carry none
fn history_key(metacard: &Metacard) -> Option<&str> {
    if metacard.has_tag(tags::REVISION) {
        return None;
    }
    if metacard.has_tag(tags::DELETED) {
        return metacard.deletion_of_id();
    }
    Some(&metacard.id)
}

/// `export-<UTC yyyy-MM-ddTHH-mm-ss.SSSZ>.zip`
fn generated_name(clock: &dyn Clock) -> String {
    format!(
        "export-{}.zip",
        clock.now().format("%Y-%m-%dT%H-%M-%S%.3fZ")
    )
}
