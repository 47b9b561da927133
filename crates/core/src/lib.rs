//! Core types and traits for Metavault
//!
//! This crate defines the foundational types used throughout the system:
//! - Metacard: the catalog record, with typed attributes and state predicates
//! - AttributeValue / Attribute: typed attribute values
//! - attributes: attribute and tag name vocabulary
//! - VersionAction: how a version snapshot came to be, and snapshot helpers
//! - Filter: typed query predicates evaluated by catalogs
//! - ContentItem / ContentRef / Resource: content on its way in and out of storage
//! - ResourceUri: resource locators and the `content:` scheme
//! - Traits: Catalog, ContentStore, Principal, Clock
//! - Error: shared catalog, resource and storage errors

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attributes;
pub mod bytes;
pub mod content;
pub mod error;
pub mod filter;
pub mod metacard;
pub mod offline;
pub mod query;
pub mod traits;
pub mod uri;
pub mod value;
pub mod version;

pub use bytes::pretty_bytes;
pub use content::{ByteStream, ContentItem, ContentRef, Resource, DEFAULT_MIME_TYPE};
pub use error::{
    CatalogError, CatalogResult, ProcessingError, ResourceError, StorageError, StorageResult,
};
pub use filter::Filter;
pub use metacard::Metacard;
pub use offline::is_offline_comment_only_update;
pub use query::{query_all, PagedResults, QueryRequest, QueryResponse};
pub use traits::{
    Catalog, Clock, ContentStore, FixedPrincipal, Principal, StagedRequest, SystemClock,
    WriteResponse,
};
pub use uri::{ResourceUri, CONTENT_SCHEME};
pub use value::{Attribute, AttributeValue};
pub use version::VersionAction;
