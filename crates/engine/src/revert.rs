//! Version revert
//!
//! Restores a record to one of its history snapshots. Content is restored
//! from the earliest content-bearing snapshot taken at or after the target,
//! which is the newest content the target version could have seen. When the
//! target was a deletion, the record is re-created (after removing its
//! deletion marker); otherwise the live record is updated, with bounded
//! retries while the catalog index catches up with earlier writes.

use crate::retry::{RetryPolicy, Retryable};
use metavault_core::attributes::{self as attr, tags};
use metavault_core::{
    query_all, Catalog, CatalogError, Clock, ContentItem, Filter, Metacard, QueryRequest,
    ResourceError, ResourceUri, SystemClock, WriteResponse,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_PAGE_SIZE;

/// Revert failures
#[derive(Debug, Error)]
pub enum RevertError {
    /// The record has no history, or the version is not part of it
    #[error("Version not found: {0}")]
    NotFound(String),

    /// The snapshot lacks a versioned-on timestamp
    #[error("Version {0} has no timestamp")]
    InvalidVersion(String),

    /// The snapshot's content could not be fetched
    #[error("Unable to fetch version content: {0}")]
    Resource(#[from] ResourceError),

    /// A catalog call failed
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The catalog kept refusing the restoring update
    #[error("Could not update {id} after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Record being restored
        id: String,
        /// Attempts made
        attempts: usize,
        /// Last refusal
        source: CatalogError,
    },
}

impl Retryable for RevertError {
    fn is_retryable(&self) -> bool {
        matches!(self, RevertError::Catalog(_))
    }
}

fn check_response(response: WriteResponse) -> Result<Vec<Metacard>, RevertError> {
    response.into_result().map_err(|e| {
        debug!(target: "metavault::revert", error = %e, "Catalog reported processing errors");
        RevertError::Catalog(e)
    })
}

/// Restores records from their version history
pub struct VersionRevertEngine {
    catalog: Arc<dyn Catalog>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    page_size: usize,
}

impl VersionRevertEngine {
    /// Engine with the default retry policy and the wall clock
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Builder: time source used for retry pauses
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builder: retry policy for restoring updates
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Builder: history query page size
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Revert record `id` to the snapshot `version_id`
    ///
    /// Returns the record as restored.
    pub fn revert(&self, id: &str, version_id: &str) -> Result<Metacard, RevertError> {
        let history = query_all(
            self.catalog.as_ref(),
            QueryRequest::new(Filter::history_of(id), self.page_size),
        )?;
        if history.is_empty() {
            return Err(RevertError::NotFound(id.to_string()));
        }
        let version = history
            .iter()
            .find(|m| m.id == version_id)
            .ok_or_else(|| RevertError::NotFound(version_id.to_string()))?;
        let target_time = version
            .versioned_on()
            .ok_or_else(|| RevertError::InvalidVersion(version_id.to_string()))?;
        let deletion = version
            .version_action()
            .map(|a| a.is_delete_action())
            .unwrap_or(false);

        let content_version = history
            .iter()
            .filter(|m| m.versioned_on().map(|t| t >= target_time).unwrap_or(false))
            .filter(|m| {
                m.version_action()
                    .map(|a| a.is_content_action())
                    .unwrap_or(false)
            })
            .filter(|m| has_content_uri(m))
            .min_by_key(|m| m.versioned_on());

        let mut restored = version.to_live();
        let mut already_created = false;
        if let Some(content_version) = content_version {
            debug!(
                target: "metavault::revert",
                id,
                version = version_id,
                content_version = %content_version.id,
                "Restoring content"
            );
            let stored = if deletion {
                self.remove_deletion_marker(id);
                let item = self.content_item(id, &content_version.id, &restored)?;
                already_created = true;
                check_response(self.catalog.create_with_content(vec![item])?)?
            } else {
                self.with_retry(id, |_| {
                    let item = self.content_item(id, &content_version.id, &restored)?;
                    check_response(self.catalog.update_with_content(id, vec![item])?)
                })?
            };
            // The stored record carries locators for the restored content
            if let Some(metacard) = stored.into_iter().find(|m| m.id == id) {
                restored = metacard;
            }
        }

        self.revert_metadata(id, &restored, deletion, already_created)?;
        info!(target: "metavault::revert", id, version = version_id, "Reverted record");
        Ok(restored)
    }

    fn revert_metadata(
        &self,
        id: &str,
        restored: &Metacard,
        deletion: bool,
        already_created: bool,
    ) -> Result<(), RevertError> {
        if deletion {
            if !already_created {
                self.remove_deletion_marker(id);
                check_response(self.catalog.create(vec![restored.clone()])?)?;
            }
            return Ok(());
        }
        self.with_retry(id, |_| {
            check_response(self.catalog.update(id, restored.clone())?)
        })?;
        Ok(())
    }

    fn content_item(
        &self,
        id: &str,
        content_version_id: &str,
        restored: &Metacard,
    ) -> Result<ContentItem, RevertError> {
        let resource = self.catalog.local_resource_by_id(content_version_id)?;
        let mut item = ContentItem::new(id, resource.name, resource.mime_type, resource.stream)
            .with_metacard(restored.clone());
        item.size = resource.size;
        Ok(item)
    }

    fn with_retry<T>(
        &self,
        id: &str,
        op: impl FnMut(usize) -> Result<T, RevertError>,
    ) -> Result<T, RevertError> {
        self.retry
            .run(self.clock.as_ref(), op)
            .map_err(|e| match e {
                RevertError::Catalog(source) => RevertError::RetriesExhausted {
                    id: id.to_string(),
                    attempts: self.retry.max_attempts.max(1),
                    source,
                },
                other => other,
            })
    }

    /// Best effort: a marker that cannot be found or removed is logged
    fn remove_deletion_marker(&self, id: &str) {
        let filter = Filter::all_of([
            Filter::tag(tags::DELETED),
            Filter::equals(attr::DELETION_OF_ID, id),
        ]);
        let request = QueryRequest::new(filter, self.page_size);
        let markers = match query_all(self.catalog.as_ref(), request) {
            Ok(markers) => markers,
            Err(e) => {
                warn!(target: "metavault::revert", id, error = %e, "Failed to look up deletion marker");
                return;
            }
        };
        if markers.len() != 1 {
            debug!(
                target: "metavault::revert",
                id,
                found = markers.len(),
                "Expected exactly one deletion marker"
            );
        }
        if markers.is_empty() {
            return;
        }
        let ids: Vec<String> = markers.into_iter().map(|m| m.id).collect();
        match self.catalog.delete(&ids).map(WriteResponse::into_result) {
            Ok(Ok(_)) => {}
            Ok(Err(e)) | Err(e) => {
                warn!(target: "metavault::revert", id, error = %e, "Failed to remove deletion marker");
            }
        }
    }
}

fn has_content_uri(metacard: &Metacard) -> bool {
    metacard
        .resource_uri
        .as_deref()
        .and_then(|u| ResourceUri::parse(u).ok())
        .map(|u| u.is_content())
        .unwrap_or(false)
}
