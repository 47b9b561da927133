//! Collaborator traits
//!
//! The archive engine never owns records or content. It talks to:
//! - Catalog: record queries and writes, plus local resource fetches
//! - ContentStore: two-phase (stage, then commit) content writes and deletes
//! - Principal: who is acting, for attribution
//! - Clock: current time and blocking sleeps, injectable for tests
//!
//! All traits are object safe and `Send + Sync` so engines hold them as
//! `Arc<dyn Trait>`.

use crate::content::{ContentItem, ContentRef, Resource};
use crate::error::{CatalogError, CatalogResult, ProcessingError, ResourceError, StorageResult};
use crate::metacard::Metacard;
use crate::query::{QueryRequest, QueryResponse};
use crate::uri::ResourceUri;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Outcome of a catalog write
///
/// Per-record problems are carried as data; a write that returns `Ok` may
/// still have failed for some records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteResponse {
    /// Records as stored
    pub metacards: Vec<Metacard>,
    /// Problems encountered
    pub processing_errors: Vec<ProcessingError>,
}

impl WriteResponse {
    /// Successful write of the given records
    pub fn ok(metacards: Vec<Metacard>) -> Self {
        WriteResponse {
            metacards,
            processing_errors: Vec::new(),
        }
    }

    /// Turn processing errors into a `CatalogError::Processing`
    pub fn into_result(self) -> CatalogResult<Vec<Metacard>> {
        if self.processing_errors.is_empty() {
            Ok(self.metacards)
        } else {
            Err(CatalogError::Processing(self.processing_errors))
        }
    }
}

/// Record queries and writes
pub trait Catalog: Send + Sync {
    /// Fetch one page of results
    fn query(&self, request: &QueryRequest) -> CatalogResult<QueryResponse>;

    /// Insert records
    fn create(&self, metacards: Vec<Metacard>) -> CatalogResult<WriteResponse>;

    /// Replace the record stored under `id`
    fn update(&self, id: &str, metacard: Metacard) -> CatalogResult<WriteResponse>;

    /// Remove records by id
    fn delete(&self, ids: &[String]) -> CatalogResult<WriteResponse>;

    /// Insert records together with their content
    ///
    /// Each item's attached metacard becomes the stored record.
    fn create_with_content(&self, items: Vec<ContentItem>) -> CatalogResult<WriteResponse>;

    /// Replace the content (and attached metacard) of the record stored under `id`
    fn update_with_content(&self, id: &str, items: Vec<ContentItem>)
        -> CatalogResult<WriteResponse>;

    /// Open content held locally under a locator
    fn local_resource(&self, uri: &ResourceUri) -> Result<Resource, ResourceError>;

    /// Open the primary content of a locally held record
    fn local_resource_by_id(&self, id: &str) -> Result<Resource, ResourceError>;

    /// Drop records from any read-side cache
    fn evict_cached(&self, _ids: &[String]) -> CatalogResult<()> {
        Ok(())
    }
}

/// Handle to a staged content storage request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagedRequest {
    /// Request identity
    pub id: String,
    /// Addresses touched by the request
    pub refs: Vec<ContentRef>,
}

/// Two-phase content storage
pub trait ContentStore: Send + Sync {
    /// Stage new content; nothing is visible until `commit`
    fn stage_create(&self, items: Vec<ContentItem>) -> StorageResult<StagedRequest>;

    /// Stage removal of content
    fn stage_delete(&self, refs: Vec<ContentRef>) -> StorageResult<StagedRequest>;

    /// Apply a staged request
    fn commit(&self, request: &StagedRequest) -> StorageResult<()>;

    /// Discard a staged request
    fn rollback(&self, request: &StagedRequest) -> StorageResult<()>;
}

/// Identity of the acting user
pub trait Principal: Send + Sync {
    /// Display name used for attribution
    fn whoami(&self) -> String;
}

/// A principal with a fixed name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPrincipal(pub String);

impl Principal for FixedPrincipal {
    fn whoami(&self) -> String {
        self.0.clone()
    }
}

/// Time source
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;

    /// Block the calling thread
    fn sleep(&self, duration: Duration);
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
