//! Metavault - portable archives and offline storage for versioned catalogs
//!
//! Metavault moves catalog records, their history and their content in and
//! out of zip archives:
//!
//! - [`Exporter`] writes matching records to an archive and can delete them
//!   afterwards, leaving a tombstone record behind
//! - [`Importer`] reconciles an archive with the catalog, restoring deleted
//!   records from their history where needed
//! - [`OfflineArchiver`] moves a record's content into a per-record archive
//!   and marks the record offline
//! - [`VersionRevertEngine`] restores a record to an earlier version
//!
//! # Quick Start
//!
//! ```ignore
//! use metavault::{ExportRequest, Exporter, Filter, JsonCodec, MemoryCatalog, MetavaultConfig};
//! use std::sync::Arc;
//!
//! let config = MetavaultConfig::from_file("metavault.toml".as_ref())?;
//! let catalog = Arc::new(MemoryCatalog::new());
//! let exporter = Exporter::new(
//!     catalog.clone(),
//!     catalog.content_store(),
//!     Arc::new(JsonCodec),
//!     config.export_options(),
//! );
//! let summary = exporter.export(&ExportRequest::new(Filter::Everything))?;
//! ```
//!
//! # Architecture
//!
//! - `metavault-core`: records, filters and the catalog/content traits
//! - `metavault-archive`: archive layout, writing, extraction and walking
//! - `metavault-storage`: in-memory catalog and content store
//! - `metavault-engine`: the export, import, offline and revert workflows

pub use metavault_archive::{ArchiveInfo, Compression, JsonCodec, MetacardCodec};
pub use metavault_core::{
    Catalog, CatalogError, Clock, ContentStore, Filter, Metacard, Principal, SystemClock,
};
pub use metavault_engine::*;
pub use metavault_storage::{MemoryCatalog, MemoryContentStore};
