//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use metavault_archive::JsonCodec;
use metavault_core::attributes::tags;
use metavault_core::{Catalog, Clock, ContentItem, FixedPrincipal, Metacard};
use metavault_engine::{
    ExportOptions, Exporter, ImportOptions, Importer, OfflineArchiver, OfflineOptions,
    VersionRevertEngine,
};
use metavault_storage::MemoryCatalog;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route engine logs to the test harness output
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// ManualClock
// ============================================================================

/// Clock that only moves when told to; sleeping advances it
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
        }
    }

    pub fn advance(&self, seconds: i64) {
        let mut now = self.now.lock();
        *now = *now + ChronoDuration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration) {
        let mut now = self.now.lock();
        *now = *now + ChronoDuration::from_std(duration).unwrap();
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A versioning in-memory catalog plus scratch directories
pub struct Harness {
    pub catalog: Arc<MemoryCatalog>,
    pub clock: Arc<ManualClock>,
    pub dir: TempDir,
}

impl Harness {
    /// Catalog that keeps history, like a live deployment
    pub fn new() -> Self {
        init_tracing();
        let clock = Arc::new(ManualClock::new());
        let catalog = Arc::new(
            MemoryCatalog::new()
                .with_versioning()
                .with_clock(clock.clone()),
        );
        Self::with_catalog(catalog, clock)
    }

    /// Catalog without history
    pub fn unversioned() -> Self {
        init_tracing();
        let clock = Arc::new(ManualClock::new());
        let catalog = Arc::new(MemoryCatalog::new().with_clock(clock.clone()));
        Self::with_catalog(catalog, clock)
    }

    fn with_catalog(catalog: Arc<MemoryCatalog>, clock: Arc<ManualClock>) -> Self {
        let dir = TempDir::new().unwrap();
        for sub in ["exports", "offline", "work"] {
            fs::create_dir(dir.path().join(sub)).unwrap();
        }
        Self {
            catalog,
            clock,
            dir,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn offline_root(&self) -> PathBuf {
        self.path("offline")
    }

    pub fn exporter(&self) -> Exporter {
        Exporter::new(
            self.catalog.clone(),
            self.catalog.content_store(),
            Arc::new(JsonCodec),
            ExportOptions {
                export_directory: Some(self.path("exports")),
                ..ExportOptions::default()
            },
        )
        .with_clock(self.clock.clone())
    }

    pub fn importer(&self) -> Importer {
        let revert = VersionRevertEngine::new(self.catalog.clone()).with_clock(self.clock.clone());
        Importer::new(
            self.catalog.clone(),
            self.catalog.content_store(),
            Arc::new(JsonCodec),
            ImportOptions {
                work_dir: Some(self.path("work")),
                ..ImportOptions::default()
            },
        )
        .with_revert_engine(revert)
    }

    pub fn archiver(&self) -> OfflineArchiver {
        OfflineArchiver::new(
            self.catalog.clone(),
            self.catalog.content_store(),
            Arc::new(FixedPrincipal("archivist".into())),
            Arc::new(JsonCodec),
            OfflineOptions {
                root_path: Some(self.offline_root()),
                ..OfflineOptions::default()
            },
        )
        .with_clock(self.clock.clone())
    }

    pub fn reverter(&self) -> VersionRevertEngine {
        VersionRevertEngine::new(self.catalog.clone()).with_clock(self.clock.clone())
    }

    /// Create a record through the catalog with primary content and an overview
    pub fn ingest(&self, id: &str, title: &str, body: &str) -> Metacard {
        let record = Metacard::new(id).with_title(title).with_tag(tags::RESOURCE);
        let items = vec![
            ContentItem::new(id, format!("{}.txt", id), "text/plain", Cursor::new(body.as_bytes().to_vec()))
                .with_metacard(record),
            ContentItem::new(id, "thumb.png", "image/png", Cursor::new(b"png".to_vec()))
                .with_qualifier("overview"),
        ];
        self.catalog
            .create_with_content(items)
            .unwrap()
            .into_result()
            .unwrap();
        self.clock.advance(60);
        self.catalog.get(id).unwrap()
    }

    /// Create a metadata-only record
    pub fn create(&self, id: &str, title: &str) -> Metacard {
        let record = Metacard::new(id).with_title(title).with_tag(tags::RESOURCE);
        self.catalog.create(vec![record.clone()]).unwrap().into_result().unwrap();
        self.clock.advance(60);
        record
    }

    /// Bytes of a record's primary content
    pub fn body(&self, id: &str) -> Option<String> {
        self.catalog
            .content_store()
            .get(&metavault_core::ContentRef::primary(id))
            .map(|c| String::from_utf8_lossy(&c.bytes).into_owned())
    }
}

/// Sorted entry names of a zip archive
pub fn zip_entries(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}
