//! In-memory collaborators for Metavault
//!
//! This crate provides reference implementations of the collaborator traits
//! defined in `metavault-core`:
//! - MemoryCatalog: insertion-ordered records behind a RwLock, with optional
//!   revision history and deletion markers
//! - MemoryContentStore: DashMap-backed two-phase content storage
//!
//! Both journal every call they receive and accept injected faults, which is
//! what the engine and integration tests lean on.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod content;

pub use catalog::{CatalogCall, MemoryCatalog};
pub use content::{ContentCall, MemoryContentStore, StoredContent};
