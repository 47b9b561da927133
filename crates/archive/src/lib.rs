//! Metavault archive format
//!
//! Portable zip archives of catalog records, their content and their
//! version history.
//!
//! ## Archive Structure
//!
//! ```text
//! export-2024-01-31T10-15-00.000Z.zip
//! ├── errors.json                       — records that could not be encoded (optional)
//! └── metacards/
//!     └── 012/                          — first three characters of the id
//!         └── 0123456789/
//!             ├── metacard/0123456789.xml
//!             ├── content/<filename>
//!             ├── derived/
//!             │   ├── overview/<filename>
//!             │   ├── original/<filename>
//!             │   └── other-1/<filename>
//!             └── history/
//!                 └── <revision-id>/    — same layout, without further history
//! ```
//!
//! ## Usage
//!
//! Build an archive:
//! ```ignore
//! let mut writer = ArchiveWriter::create(path, &WriterOptions::default())?;
//! writer.add_bytes(&paths::metacard_path(&id), &JsonCodec.encode(&metacard)?)?;
//! let info = writer.finish()?;
//! ```
//!
//! Read one back:
//! ```ignore
//! extract_archive(path, work_dir)?;
//! for unit in fold_units(ArchiveWalker::new(work_dir)?, &JsonCodec) {
//!     let unit = unit?;
//! }
//! ```
//!
//! ## Guarantees
//!
//! - **Streamed**: entries are copied from their source in one pass
//! - **Unique**: an entry path can be written once per archive
//! - **Atomic**: an archive appears at its final path only when finished
//! - **Ordered**: walks visit a record before its content, and content before history

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod extract;
pub mod paths;
pub mod types;
pub mod unit;
pub mod walker;
pub mod writer;

pub use codec::{JsonCodec, MetacardCodec};
pub use error::{ArchiveError, ArchiveResult};
pub use extract::extract_archive;
pub use paths::{assign_derived_roles, DerivedRole};
pub use types::{xxh3_file_hex, ArchiveInfo, Compression, WriterOptions};
pub use unit::{fold_units, ContentBlob, ImportUnit, UnitFolder};
pub use walker::{count_units, ArchiveWalker, WalkEvent};
pub use writer::ArchiveWriter;
