//! Archive import
//!
//! Unpacks an archive into a scoped temporary directory, folds its walk
//! into units and reconciles each unit against the catalog (see
//! [`classify`] for the rules). Units fail one at a time: a failure is
//! recorded against the unit's id and the run moves on. History units are
//! processed after their record whatever happened to it.
//!
//! Only whole-run problems are errors: the work directory cannot be created,
//! or the archive cannot be extracted, walked or decoded.

mod classify;

pub use classify::{ArchivedState, ExistingState, ImportAction, NoOpReason, Reconciliation};

use crate::config::DEFAULT_PAGE_SIZE;
use crate::revert::{RevertError, VersionRevertEngine};
use metavault_archive::{
    assign_derived_roles, count_units, extract_archive, fold_units, ArchiveError, ArchiveWalker,
    ImportUnit, MetacardCodec,
};
use metavault_core::{
    Catalog, CatalogError, ContentItem, ContentStore, Filter, Metacard, QueryRequest,
    ResourceUri, StorageError,
};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failures that stop an import run
#[derive(Debug, Error)]
pub enum ImportError {
    /// The temporary work directory could not be created
    #[error("Unable to create import work directory in '{}': {source}", .path.display())]
    WorkDir {
        /// Parent directory
        path: PathBuf,
        /// Cause
        source: io::Error,
    },

    /// The archive could not be extracted or read
    #[error("Unable to read archive: {0}")]
    Archive(#[from] ArchiveError),
}

/// Failure of a single unit
#[derive(Debug, Error)]
enum UnitError {
    #[error("no import rule for {archived:?} archived record against {existing:?} catalog record")]
    Ambiguous {
        archived: ArchivedState,
        existing: ExistingState,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Revert(#[from] RevertError),

    #[error("content storage failed: {0}")]
    Storage(#[from] StorageError),

    #[error("unable to read archived content: {0}")]
    Io(#[from] io::Error),
}

/// Receives import progress
pub trait ProgressListener {
    /// `completed` of `total` top-level units are done
    fn on_progress(&mut self, completed: usize, total: usize);
}

impl<F: FnMut(usize, usize)> ProgressListener for F {
    fn on_progress(&mut self, completed: usize, total: usize) {
        self(completed, total)
    }
}

/// Discards progress
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressListener for NoProgress {
    fn on_progress(&mut self, _completed: usize, _total: usize) {}
}

/// What happened to one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOutcome {
    /// Id of the archived record
    pub id: String,
    /// Action chosen; `None` when the catalog lookup itself failed
    pub action: Option<ImportAction>,
    /// Failure reason, `None` on success
    pub error: Option<String>,
}

/// Result of an import run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Ids of units that failed, history units included
    pub failed_ids: BTreeSet<String>,
    /// Top-level units processed
    pub processed: usize,
    /// Top-level units in the archive
    pub total: usize,
    /// Per-unit outcomes in processing order
    pub outcomes: Vec<UnitOutcome>,
}

impl ImportReport {
    /// True if no unit failed
    pub fn is_success(&self) -> bool {
        self.failed_ids.is_empty()
    }

    /// Outcome recorded for an id
    pub fn outcome(&self, id: &str) -> Option<&UnitOutcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }
}

/// Import settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    /// Parent of temporary extraction directories; the system temp dir when `None`
    pub work_dir: Option<PathBuf>,
    /// Records fetched per catalog query page
    pub page_size: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            work_dir: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Reconciles archives into a catalog
pub struct Importer {
    catalog: Arc<dyn Catalog>,
    content: Arc<dyn ContentStore>,
    revert: VersionRevertEngine,
    codec: Arc<dyn MetacardCodec>,
    options: ImportOptions,
}

impl Importer {
    /// Importer restoring deleted records with a default revert engine
    pub fn new(
        catalog: Arc<dyn Catalog>,
        content: Arc<dyn ContentStore>,
        codec: Arc<dyn MetacardCodec>,
        options: ImportOptions,
    ) -> Self {
        let revert = VersionRevertEngine::new(Arc::clone(&catalog)).with_page_size(options.page_size);
        Self {
            catalog,
            content,
            revert,
            codec,
            options,
        }
    }

    /// Builder: engine used to restore deleted records
    pub fn with_revert_engine(mut self, revert: VersionRevertEngine) -> Self {
        self.revert = revert;
        self
    }

    /// Import an archive file
    ///
    /// Returns the report of every unit; partial failure is reported in
    /// [`ImportReport::failed_ids`], never as an error.
    pub fn import_archive(
        &self,
        archive: &Path,
        progress: &mut dyn ProgressListener,
    ) -> Result<ImportReport, ImportError> {
        let parent = self
            .options
            .work_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let work = tempfile::Builder::new()
            .prefix("metavault-import-")
            .tempdir_in(&parent)
            .map_err(|source| ImportError::WorkDir {
                path: parent.clone(),
                source,
            })?;

        let result = self.import_extracted(archive, work.path(), progress);

        let work_path = work.path().to_path_buf();
        if let Err(e) = work.close() {
            warn!(target: "metavault::import", path = %work_path.display(), error = %e, "Failed to remove import work directory");
        }
        result
    }

    fn import_extracted(
        &self,
        archive: &Path,
        work: &Path,
        progress: &mut dyn ProgressListener,
    ) -> Result<ImportReport, ImportError> {
        let started = Instant::now();
        let files = extract_archive(archive, work)?;
        let total = count_units(work)?;
        info!(target: "metavault::import", archive = %archive.display(), files, units = total, "Starting import");

        let mut report = ImportReport {
            total,
            ..ImportReport::default()
        };
        progress.on_progress(0, total);

        for unit in fold_units(ArchiveWalker::new(work)?, self.codec.as_ref()) {
            let unit = unit?;
            self.process(&unit, &mut report);
            report.processed += 1;
            progress.on_progress(report.processed, total);
        }

        info!(
            target: "metavault::import",
            processed = report.processed,
            failed = report.failed_ids.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Import complete"
        );
        Ok(report)
    }

    /// Apply a unit, then each of its history units
    fn process(&self, unit: &ImportUnit, report: &mut ImportReport) {
        let id = unit.metacard.id.clone();
        let (action, result) = self.apply(unit);
        let error = match result {
            Ok(()) => None,
            Err(e) => {
                warn!(target: "metavault::import", id = %id, error = %e, "Failed to import a metacard");
                report.failed_ids.insert(id.clone());
                Some(e.to_string())
            }
        };
        report.outcomes.push(UnitOutcome { id, action, error });

        for history in &unit.history {
            self.process(history, report);
        }
    }

    fn apply(&self, unit: &ImportUnit) -> (Option<ImportAction>, Result<(), UnitError>) {
        let archived = &unit.metacard;
        let existing = match self.lookup(archived.primary_id()) {
            Ok(existing) => existing,
            Err(e) => return (None, Err(e.into())),
        };
        let action = Reconciliation::classify(archived, existing.as_ref());
        debug!(target: "metavault::import", id = %archived.id, action = %action, "Classified archived metacard");

        let result = match &action {
            ImportAction::Create => self.create(unit),
            ImportAction::Update { existing_id } => self.update(existing_id, unit),
            ImportAction::RestoreThenUpdate {
                deleted_id,
                version_id,
            } => self
                .revert
                .revert(deleted_id, version_id)
                .map_err(UnitError::from)
                .and_then(|_| self.update(deleted_id, unit)),
            ImportAction::Delete { existing_id } => self
                .catalog
                .delete(&[existing_id.clone()])
                .and_then(|r| r.into_result())
                .map(|_| ())
                .map_err(UnitError::from),
            ImportAction::NoOp(_) => Ok(()),
            ImportAction::Ambiguous { archived, existing } => Err(UnitError::Ambiguous {
                archived: *archived,
                existing: *existing,
            }),
        };
        (Some(action), result)
    }

    /// The live record or deletion marker held under `primary_id`
    fn lookup(&self, primary_id: &str) -> Result<Option<Metacard>, CatalogError> {
        let request =
            QueryRequest::new(Filter::record_or_deletion(primary_id), self.options.page_size).local();
        let results = self.catalog.query(&request)?.results;
        let exact = results.iter().position(|m| m.id == primary_id);
        Ok(match exact {
            Some(index) => results.into_iter().nth(index),
            None => results.into_iter().next(),
        })
    }

    fn create(&self, unit: &ImportUnit) -> Result<(), UnitError> {
        self.catalog
            .create(vec![unit.metacard.clone()])?
            .into_result()?;
        self.store_content(unit)
    }

    fn update(&self, id: &str, unit: &ImportUnit) -> Result<(), UnitError> {
        let mut metacard = unit.metacard.clone();
        metacard.id = id.to_string();
        self.catalog.update(id, metacard)?.into_result()?;
        self.store_content(unit)
    }

    fn store_content(&self, unit: &ImportUnit) -> Result<(), UnitError> {
        if !unit.has_content() {
            return Ok(());
        }
        let items = content_items(unit)?;
        let request = self.content.stage_create(items)?;
        if let Err(e) = self.content.commit(&request) {
            if let Err(rollback) = self.content.rollback(&request) {
                warn!(target: "metavault::import", id = %unit.metacard.id, error = %rollback, "Failed to roll back content");
            }
            return Err(e.into());
        }
        Ok(())
    }
}

/// Content items for a unit's primary and derived files
///
/// Derived content lands at the qualifier its record's locator names, so
/// the imported record resolves it again; the role name is the fallback.
fn content_items(unit: &ImportUnit) -> io::Result<Vec<ContentItem>> {
    let id = &unit.metacard.id;
    let mut items = Vec::with_capacity(1 + unit.derived.len());
    if let Some(blob) = &unit.content {
        let size = blob.path.metadata()?.len();
        items.push(
            ContentItem::new(id.as_str(), blob.filename.clone(), blob.mime_type.clone(), blob.open()?)
                .with_size(size),
        );
    }

    let roles = assign_derived_roles(&unit.metacard.derived_resource_uris);
    for (role, blob) in &unit.derived {
        let qualifier = roles
            .iter()
            .find(|(r, _)| r == role)
            .and_then(|(_, uri)| ResourceUri::parse(uri).ok())
            .and_then(|uri| uri.fragment().map(str::to_string))
            .unwrap_or_else(|| role.to_string());
        let size = blob.path.metadata()?.len();
        items.push(
            ContentItem::new(id.as_str(), blob.filename.clone(), blob.mime_type.clone(), blob.open()?)
                .with_qualifier(qualifier)
                .with_size(size),
        );
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metavault_archive::paths::{content_path, derived_path, history_metacard_path, metacard_path};
    use metavault_archive::{ArchiveWriter, DerivedRole, JsonCodec, MetacardCodec, WriterOptions};
    use metavault_core::attributes::{self as attr, tags};
    use metavault_core::ContentRef;
    use metavault_storage::{CatalogCall, ContentCall, MemoryCatalog};
    use tempfile::TempDir;

    /// Builds small archives entry by entry
    struct Fixture {
        dir: TempDir,
        writer: ArchiveWriter,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let writer =
                ArchiveWriter::create(&dir.path().join("in.zip"), &WriterOptions::default())
                    .unwrap();
            Self { dir, writer }
        }

        fn record(mut self, entry: &str, metacard: &Metacard) -> Self {
            self.writer
                .add_bytes(entry, &JsonCodec.encode(metacard).unwrap())
                .unwrap();
            self
        }

        fn file(mut self, entry: &str, data: &[u8]) -> Self {
            self.writer.add_bytes(entry, data).unwrap();
            self
        }

        fn finish(self) -> (TempDir, PathBuf) {
            let info = self.writer.finish().unwrap();
            (self.dir, info.path)
        }
    }

    fn importer(catalog: &Arc<MemoryCatalog>, work: &Path) -> Importer {
        Importer::new(
            catalog.clone(),
            catalog.content_store(),
            Arc::new(JsonCodec),
            ImportOptions {
                work_dir: Some(work.to_path_buf()),
                ..ImportOptions::default()
            },
        )
    }

    #[test]
    fn test_metadata_only_into_empty_catalog() {
        let record = Metacard::new("0123456789").with_tag(tags::RESOURCE);
        let (_dir, archive) = Fixture::new()
            .record("metacards/012/0123456789/metacard/0123456789.xml", &record)
            .finish();
        let work = TempDir::new().unwrap();
        let catalog = Arc::new(MemoryCatalog::new());

        let report = importer(&catalog, work.path())
            .import_archive(&archive, &mut NoProgress)
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.processed, 1);
        assert_eq!(
            catalog.write_calls(),
            vec![CatalogCall::Create(vec!["0123456789".into()])]
        );
        assert!(catalog.content_store().calls().is_empty());
        assert_eq!(catalog.get("0123456789"), Some(record));
    }

    #[test]
    fn test_content_lands_where_locators_point() {
        let record = Metacard::new("abcdef")
            .with_resource_uri("content:abcdef")
            .with_derived_uri("content:abcdef#overview")
            .with_derived_uri("content:abcdef#preview");
        let (_dir, archive) = Fixture::new()
            .record(&metacard_path("abcdef"), &record)
            .file(&content_path("abcdef", "report.pdf"), b"pdf")
            .file(&derived_path("abcdef", DerivedRole::Overview, "thumb.png"), b"png")
            .file(&derived_path("abcdef", DerivedRole::Other(1), "p.jpg"), b"jpg")
            .finish();
        let work = TempDir::new().unwrap();
        let catalog = Arc::new(MemoryCatalog::new());

        let report = importer(&catalog, work.path())
            .import_archive(&archive, &mut NoProgress)
            .unwrap();
        assert!(report.is_success());

        let store = catalog.content_store();
        let primary = store.get(&ContentRef::primary("abcdef")).unwrap();
        assert_eq!(primary.mime_type, "application/pdf");
        assert_eq!(primary.filename, "report.pdf");
        let preview = ContentRef {
            id: "abcdef".into(),
            qualifier: Some("preview".into()),
        };
        assert_eq!(&*store.get(&preview).unwrap().bytes, b"jpg");
        assert_eq!(store.refs_for("abcdef").len(), 3);
    }

    #[test]
    fn test_deleted_record_is_restored_then_updated() {
        let catalog = Arc::new(MemoryCatalog::new().with_versioning());
        catalog
            .create(vec![Metacard::new("abcdef").with_title("Original")])
            .unwrap();
        catalog.delete(&["abcdef".to_string()]).unwrap();
        let marker = catalog.deletion_marker("abcdef").unwrap();
        catalog.clear_calls();

        let archived = Metacard::new("abcdef")
            .with_title("Archived")
            .with_tag(tags::RESOURCE);
        let (_dir, archive) = Fixture::new()
            .record(&metacard_path("abcdef"), &archived)
            .finish();
        let work = TempDir::new().unwrap();

        let report = importer(&catalog, work.path())
            .import_archive(&archive, &mut NoProgress)
            .unwrap();

        assert!(report.is_success(), "{:?}", report.outcomes);
        assert_eq!(
            catalog.write_calls(),
            vec![
                CatalogCall::Delete(vec![marker.id.clone()]),
                CatalogCall::Create(vec!["abcdef".into()]),
                CatalogCall::Update("abcdef".into()),
            ]
        );
        assert_eq!(catalog.get("abcdef").unwrap().title.as_deref(), Some("Archived"));
        assert!(catalog.deletion_marker("abcdef").is_none());
    }

    #[test]
    fn test_online_record_is_left_alone() {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.insert(Metacard::new("abcdef").with_title("Live"));
        let (_dir, archive) = Fixture::new()
            .record(&metacard_path("abcdef"), &Metacard::new("abcdef").with_title("Old"))
            .finish();
        let work = TempDir::new().unwrap();

        let report = importer(&catalog, work.path())
            .import_archive(&archive, &mut NoProgress)
            .unwrap();

        assert!(report.is_success());
        assert_eq!(
            report.outcome("abcdef").unwrap().action,
            Some(ImportAction::NoOp(NoOpReason::OnlineActive))
        );
        assert!(catalog.write_calls().is_empty());
        assert_eq!(catalog.get("abcdef").unwrap().title.as_deref(), Some("Live"));
    }

    #[test]
    fn test_offline_record_is_updated() {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.insert(Metacard::new("abcdef").with_attribute(attr::OFFLINED_BY, "admin"));
        let archived = Metacard::new("abcdef").with_resource_uri("content:abcdef");
        let (_dir, archive) = Fixture::new()
            .record(&metacard_path("abcdef"), &archived)
            .file(&content_path("abcdef", "a.txt"), b"back")
            .finish();
        let work = TempDir::new().unwrap();

        importer(&catalog, work.path())
            .import_archive(&archive, &mut NoProgress)
            .unwrap();

        assert_eq!(catalog.write_calls(), vec![CatalogCall::Update("abcdef".into())]);
        assert_eq!(catalog.get("abcdef"), Some(archived));
        assert!(catalog.content_store().contains(&ContentRef::primary("abcdef")));
    }

    #[test]
    fn test_failures_do_not_stop_history_or_siblings() {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.reject("aaa111");
        let first = Metacard::new("aaa111").with_tag(tags::RESOURCE);
        let history = Metacard::new("aaa111")
            .with_tag(tags::RESOURCE)
            .snapshot("hist01", metavault_core::VersionAction::Versioned, chrono::Utc::now());
        let second = Metacard::new("bbb222");
        let (_dir, archive) = Fixture::new()
            .record(&metacard_path("aaa111"), &first)
            .record(&history_metacard_path("aaa111", "hist01"), &history)
            .record(&metacard_path("bbb222"), &second)
            .finish();
        let work = TempDir::new().unwrap();

        let mut seen = Vec::new();
        let report = importer(&catalog, work.path())
            .import_archive(&archive, &mut |done: usize, total: usize| seen.push((done, total)))
            .unwrap();

        assert_eq!(report.failed_ids.iter().collect::<Vec<_>>(), vec!["aaa111"]);
        assert!(catalog.get("hist01").is_some());
        assert!(catalog.get("bbb222").is_some());
        assert_eq!(seen, vec![(0, 2), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_ambiguous_unit_is_a_failure() {
        let catalog = Arc::new(MemoryCatalog::new());
        // A revision already stored under the archived record's id
        let stored = Metacard::new("zzz")
            .with_tag(tags::RESOURCE)
            .snapshot("abcdef", metavault_core::VersionAction::Versioned, chrono::Utc::now());
        catalog.insert(stored);
        let (_dir, archive) = Fixture::new()
            .record(&metacard_path("abcdef"), &Metacard::new("abcdef"))
            .finish();
        let work = TempDir::new().unwrap();

        let report = importer(&catalog, work.path())
            .import_archive(&archive, &mut NoProgress)
            .unwrap();

        assert!(report.failed_ids.contains("abcdef"));
        assert!(matches!(
            report.outcome("abcdef").unwrap().action,
            Some(ImportAction::Ambiguous { .. })
        ));
        assert!(catalog.write_calls().is_empty());
    }

    #[test]
    fn test_commit_failure_rolls_back() {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.content_store().fail_next_commits(1);
        let (_dir, archive) = Fixture::new()
            .record(&metacard_path("abcdef"), &Metacard::new("abcdef"))
            .file(&content_path("abcdef", "a.txt"), b"a")
            .finish();
        let work = TempDir::new().unwrap();

        let report = importer(&catalog, work.path())
            .import_archive(&archive, &mut NoProgress)
            .unwrap();

        assert!(report.failed_ids.contains("abcdef"));
        assert!(matches!(
            catalog.content_store().calls().last(),
            Some(ContentCall::Rollback(_))
        ));
        assert_eq!(catalog.content_store().pending(), 0);
    }

    #[test]
    fn test_work_directory_is_removed() {
        let (_dir, archive) = Fixture::new()
            .record(&metacard_path("abcdef"), &Metacard::new("abcdef"))
            .finish();
        let work = TempDir::new().unwrap();
        let catalog = Arc::new(MemoryCatalog::new());

        importer(&catalog, work.path())
            .import_archive(&archive, &mut NoProgress)
            .unwrap();
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);

        let missing = work.path().join("missing.zip");
        assert!(matches!(
            importer(&catalog, work.path()).import_archive(&missing, &mut NoProgress),
            Err(ImportError::Archive(_))
        ));
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_undecodable_record_fails_the_run() {
        let (_dir, archive) = Fixture::new()
            .file(&metacard_path("abcdef"), b"not json")
            .finish();
        let work = TempDir::new().unwrap();
        let catalog = Arc::new(MemoryCatalog::new());

        let result = importer(&catalog, work.path()).import_archive(&archive, &mut NoProgress);
        assert!(matches!(result, Err(ImportError::Archive(ArchiveError::Codec(_)))));
    }
}
