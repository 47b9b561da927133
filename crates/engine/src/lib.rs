//! Archive workflows for metavault
//!
//! This crate drives the catalog and content store through the archive
//! formats defined in `metavault-archive`:
//! - Export: write matching records, history and content to a zip archive
//! - Import: reconcile an archive back into the catalog
//! - Offline: move a record's content into a per-record archive
//! - Revert: restore a record from its version history
//!
//! Every workflow talks to storage only through the traits in
//! `metavault-core`, so the same code runs against a live catalog or the
//! in-memory one from `metavault-storage`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod export;
pub mod import;
pub mod offline;
pub mod retry;
pub mod revert;

pub use config::{ConfigError, MetavaultConfig, RevertConfig, DEFAULT_PAGE_SIZE};
pub use export::{
    AssociationPolicy, ExportError, ExportFailure, ExportItem, ExportOptions, ExportRequest,
    ExportResult, ExportSummary, Exporter, ItemClass,
};
pub use import::{
    ImportAction, ImportError, ImportOptions, ImportReport, Importer, NoOpReason, NoProgress,
    ProgressListener, Reconciliation, UnitOutcome,
};
pub use offline::{OfflineArchiver, OfflineEditPolicy, OfflineError, OfflineOptions, OfflineOutcomes};
pub use retry::{RetryPolicy, Retryable};
pub use revert::{RevertError, VersionRevertEngine};
