//! In-memory catalog
//!
//! Records are kept in insertion order so paged queries are stable. With
//! versioning enabled the catalog keeps history the way a live catalog does:
//! every write to a live record stores a revision snapshot (copying its
//! content under the snapshot id), and deleting a live record leaves a
//! deletion marker pointing at the last snapshot.
//!
//! Every call is journaled, and a few faults can be injected, so engine
//! tests can assert on exactly what was asked of the catalog.

use crate::content::{MemoryContentStore, StoredContent};
use metavault_core::attributes::{self as attr, tags};
use metavault_core::{
    Catalog, CatalogError, CatalogResult, Clock, ContentItem, ContentRef, Metacard,
    ProcessingError, QueryRequest, QueryResponse, Resource, ResourceError, ResourceUri,
    SystemClock, VersionAction, WriteResponse,
};
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A call made against the catalog, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogCall {
    /// `query`
    Query,
    /// `create` with the ids asked for
    Create(Vec<String>),
    /// `update` of an id
    Update(String),
    /// `delete` of ids
    Delete(Vec<String>),
    /// `create_with_content` with the record ids involved
    CreateWithContent(Vec<String>),
    /// `update_with_content` of an id
    UpdateWithContent(String),
    /// `local_resource` or `local_resource_by_id` with the locator or id
    LocalResource(String),
    /// `evict_cached` of ids
    EvictCached(Vec<String>),
}

impl CatalogCall {
    /// True for calls that change records
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            CatalogCall::Query | CatalogCall::LocalResource(_) | CatalogCall::EvictCached(_)
        )
    }
}

#[derive(Default)]
struct CatalogState {
    order: Vec<String>,
    records: FxHashMap<String, Metacard>,
}

impl CatalogState {
    fn put(&mut self, metacard: Metacard) {
        if !self.records.contains_key(&metacard.id) {
            self.order.push(metacard.id.clone());
        }
        self.records.insert(metacard.id.clone(), metacard);
    }

    fn take(&mut self, id: &str) -> Option<Metacard> {
        let removed = self.records.remove(id)?;
        self.order.retain(|o| o != id);
        Some(removed)
    }

    fn iter(&self) -> impl Iterator<Item = &Metacard> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }
}

#[derive(Default)]
struct Faults {
    unavailable: AtomicBool,
    failing_updates: AtomicUsize,
    failing_evictions: AtomicBool,
    rejected: Mutex<FxHashSet<String>>,
}

/// Catalog held in memory
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
    content: Arc<MemoryContentStore>,
    clock: Arc<dyn Clock>,
    versioning: bool,
    calls: Mutex<Vec<CatalogCall>>,
    faults: Faults,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCatalog {
    /// Empty catalog with its own content store and no history
    pub fn new() -> Self {
        MemoryCatalog {
            state: RwLock::new(CatalogState::default()),
            content: Arc::new(MemoryContentStore::new()),
            clock: Arc::new(SystemClock),
            versioning: false,
            calls: Mutex::new(Vec::new()),
            faults: Faults::default(),
        }
    }

    /// Builder: share a content store
    pub fn with_content_store(mut self, content: Arc<MemoryContentStore>) -> Self {
        self.content = content;
        self
    }

    /// Builder: time source for version snapshots
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builder: keep revision history and deletion markers
    pub fn with_versioning(mut self) -> Self {
        self.versioning = true;
        self
    }

    /// The content store backing `local_resource`
    pub fn content_store(&self) -> Arc<MemoryContentStore> {
        Arc::clone(&self.content)
    }

    // ========================================================================
    // Direct access
    // ========================================================================

    /// Store a record as is, without journaling or versioning
    pub fn insert(&self, metacard: Metacard) {
        self.state.write().put(metacard);
    }

    /// Record stored under an id
    pub fn get(&self, id: &str) -> Option<Metacard> {
        self.state.read().records.get(id).cloned()
    }

    /// Ids in insertion order
    pub fn ids(&self) -> Vec<String> {
        self.state.read().order.clone()
    }

    /// Number of stored records of any kind
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Revisions of a record, oldest first
    pub fn history(&self, id: &str) -> Vec<Metacard> {
        let mut history: Vec<Metacard> = self
            .state
            .read()
            .iter()
            .filter(|m| m.is_revision() && m.version_of_id() == Some(id))
            .cloned()
            .collect();
        history.sort_by_key(|m| m.versioned_on());
        history
    }

    /// Deletion marker standing in for a deleted record
    pub fn deletion_marker(&self, id: &str) -> Option<Metacard> {
        self.state
            .read()
            .iter()
            .find(|m| m.has_tag(tags::DELETED) && m.deletion_of_id() == Some(id))
            .cloned()
    }

    // ========================================================================
    // Call journal and fault injection
    // ========================================================================

    /// Calls made so far
    pub fn calls(&self) -> Vec<CatalogCall> {
        self.calls.lock().clone()
    }

    /// Calls that changed records
    pub fn write_calls(&self) -> Vec<CatalogCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Make every call fail as if the catalog could not be reached
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make the next `n` updates fail before touching anything
    pub fn fail_next_updates(&self, n: usize) {
        self.faults.failing_updates.store(n, Ordering::SeqCst);
    }

    /// Make cache evictions fail
    pub fn fail_evictions(&self, fail: bool) {
        self.faults.failing_evictions.store(fail, Ordering::SeqCst);
    }

    /// Report a processing error for every write that touches `id`
    pub fn reject(&self, id: impl Into<String>) {
        self.faults.rejected.lock().insert(id.into());
    }

    fn record(&self, call: CatalogCall) {
        self.calls.lock().push(call);
    }

    fn check_available(&self) -> CatalogResult<()> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            Err(CatalogError::Unavailable("memory catalog offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn take_update_fault(&self) -> bool {
        self.faults
            .failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn is_rejected(&self, id: &str) -> bool {
        self.faults.rejected.lock().contains(id)
    }

    // ========================================================================
    // Versioning
    // ========================================================================

    fn record_version(
        &self,
        state: &mut CatalogState,
        metacard: &Metacard,
        action: VersionAction,
    ) -> String {
        let snapshot_id = new_id();
        let mut snapshot = metacard.snapshot(snapshot_id.clone(), action, self.clock.now());
        if action.is_content_action() {
            self.content.copy_all(&metacard.id, &snapshot_id);
            // Snapshot locators address the copied content
            snapshot.resource_uri = snapshot
                .resource_uri
                .as_deref()
                .and_then(|u| relocate(u, &snapshot_id));
            snapshot.derived_resource_uris = snapshot
                .derived_resource_uris
                .iter()
                .map(|u| relocate(u, &snapshot_id).unwrap_or_else(|| u.clone()))
                .collect();
        }
        state.put(snapshot);
        snapshot_id
    }

    fn version_write(&self, state: &mut CatalogState, metacard: &Metacard) {
        if self.versioning && metacard.is_active() {
            let action = if has_local_content(metacard) {
                VersionAction::VersionedContent
            } else {
                VersionAction::Versioned
            };
            self.record_version(state, metacard, action);
        }
    }

    fn version_delete(&self, state: &mut CatalogState, metacard: &Metacard) {
        if !(self.versioning && metacard.is_active()) {
            return;
        }
        let action = if has_local_content(metacard) {
            VersionAction::DeletedContent
        } else {
            VersionAction::Deleted
        };
        let snapshot_id = self.record_version(state, metacard, action);

        let mut marker = Metacard::new(new_id()).with_tag(tags::DELETED);
        marker.title = metacard.title.clone();
        marker.set(attr::DELETION_OF_ID, metacard.id.clone());
        marker.set(attr::LAST_VERSION_ID, snapshot_id);
        state.put(marker);
    }

    // ========================================================================
    // Content
    // ========================================================================

    /// Store each item's bytes and point its record at them
    ///
    /// Returns the records to store, keyed in first-seen order.
    fn absorb_content(
        &self,
        items: Vec<ContentItem>,
        existing: impl Fn(&str) -> Option<Metacard>,
    ) -> CatalogResult<Vec<Metacard>> {
        let mut records: Vec<Metacard> = Vec::new();
        for mut item in items {
            let uri = ResourceUri::content(&item.id, item.qualifier.as_deref())
                .map_err(|e| CatalogError::ingest(format!("{}: {}", item.id, e)))?;
            let mut bytes = Vec::new();
            item.stream
                .read_to_end(&mut bytes)
                .map_err(|e| CatalogError::ingest(format!("{}: {}", item.id, e)))?;
            self.content.put(
                item.content_ref(),
                StoredContent::new(item.filename, item.mime_type, bytes),
            );

            let position = match records.iter().position(|m| m.id == item.id) {
                Some(position) => position,
                None => {
                    let mut metacard = item
                        .metacard
                        .take()
                        .or_else(|| existing(&item.id))
                        .unwrap_or_else(|| Metacard::new(item.id.clone()));
                    metacard.id = item.id.clone();
                    records.push(metacard);
                    records.len() - 1
                }
            };
            let record = &mut records[position];
            if item.qualifier.is_none() {
                record.resource_uri = Some(uri.to_string());
            } else if !record.derived_resource_uris.iter().any(|u| u == uri.as_str()) {
                record.derived_resource_uris.push(uri.to_string());
            }
        }
        Ok(records)
    }

    fn open(&self, content_ref: &ContentRef, locator: &str) -> Result<Resource, ResourceError> {
        let stored = self
            .content
            .get(content_ref)
            .ok_or_else(|| ResourceError::NotFound(locator.to_string()))?;
        let size = stored.len() as u64;
        let mut resource = Resource::new(
            stored.filename,
            stored.mime_type,
            Cursor::new(stored.bytes),
        );
        resource.size = Some(size);
        Ok(resource)
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Point a `content:` locator at another record id, keeping its qualifier
fn relocate(uri: &str, id: &str) -> Option<String> {
    let parsed = ResourceUri::parse(uri).ok()?;
    if !parsed.is_content() {
        return Some(uri.to_string());
    }
    ResourceUri::content(id, parsed.fragment())
        .ok()
        .map(|u| u.to_string())
}

fn has_local_content(metacard: &Metacard) -> bool {
    metacard
        .resource_uri
        .as_deref()
        .and_then(|u| ResourceUri::parse(u).ok())
        .map(|u| u.is_content())
        .unwrap_or(false)
}

impl Catalog for MemoryCatalog {
    fn query(&self, request: &QueryRequest) -> CatalogResult<QueryResponse> {
        self.record(CatalogCall::Query);
        self.check_available()?;

        let state = self.state.read();
        let matching: Vec<&Metacard> = state
            .iter()
            .filter(|m| request.filter.matches(m))
            .collect();
        let hits = matching.len() as u64;
        let results = matching
            .into_iter()
            .skip(request.start_index)
            .take(request.page_size)
            .cloned()
            .collect();
        Ok(QueryResponse {
            results,
            hits: Some(hits),
        })
    }

    fn create(&self, metacards: Vec<Metacard>) -> CatalogResult<WriteResponse> {
        self.record(CatalogCall::Create(
            metacards.iter().map(|m| m.id.clone()).collect(),
        ));
        self.check_available()?;

        let mut response = WriteResponse::default();
        let mut state = self.state.write();
        for mut metacard in metacards {
            if metacard.id.is_empty() {
                metacard.id = new_id();
            }
            if self.is_rejected(&metacard.id) {
                response
                    .processing_errors
                    .push(ProcessingError::new(metacard.id.clone(), "rejected"));
                continue;
            }
            if state.records.contains_key(&metacard.id) {
                response
                    .processing_errors
                    .push(ProcessingError::new(metacard.id.clone(), "already exists"));
                continue;
            }
            state.put(metacard.clone());
            self.version_write(&mut state, &metacard);
            debug!(target: "metavault::storage", id = %metacard.id, "Created record");
            response.metacards.push(metacard);
        }
        Ok(response)
    }

    fn update(&self, id: &str, mut metacard: Metacard) -> CatalogResult<WriteResponse> {
        self.record(CatalogCall::Update(id.to_string()));
        self.check_available()?;
        if self.take_update_fault() {
            return Err(CatalogError::ingest(format!("update of {} refused", id)));
        }
        if self.is_rejected(id) {
            return Ok(WriteResponse {
                metacards: Vec::new(),
                processing_errors: vec![ProcessingError::new(id, "rejected")],
            });
        }

        let mut state = self.state.write();
        if !state.records.contains_key(id) {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        metacard.id = id.to_string();
        state.put(metacard.clone());
        self.version_write(&mut state, &metacard);
        debug!(target: "metavault::storage", id, "Updated record");
        Ok(WriteResponse::ok(vec![metacard]))
    }

    fn delete(&self, ids: &[String]) -> CatalogResult<WriteResponse> {
        self.record(CatalogCall::Delete(ids.to_vec()));
        self.check_available()?;

        let mut response = WriteResponse::default();
        let mut state = self.state.write();
        for id in ids {
            if self.is_rejected(id) {
                response
                    .processing_errors
                    .push(ProcessingError::new(id.clone(), "rejected"));
                continue;
            }
            let removed = match state.take(id) {
                Some(removed) => removed,
                None => {
                    response
                        .processing_errors
                        .push(ProcessingError::new(id.clone(), "not found"));
                    continue;
                }
            };
            self.version_delete(&mut state, &removed);
            if removed.is_active() {
                self.content.remove_all(id);
            }
            debug!(target: "metavault::storage", id = %id, "Deleted record");
            response.metacards.push(removed);
        }
        Ok(response)
    }

    fn create_with_content(&self, items: Vec<ContentItem>) -> CatalogResult<WriteResponse> {
        let mut ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        ids.dedup();
        self.record(CatalogCall::CreateWithContent(ids));
        self.check_available()?;

        let mut response = WriteResponse::default();
        let records = self.absorb_content(items, |_| None)?;
        let mut state = self.state.write();
        for metacard in records {
            if self.is_rejected(&metacard.id) {
                response
                    .processing_errors
                    .push(ProcessingError::new(metacard.id.clone(), "rejected"));
                continue;
            }
            if state.records.contains_key(&metacard.id) {
                response
                    .processing_errors
                    .push(ProcessingError::new(metacard.id.clone(), "already exists"));
                continue;
            }
            state.put(metacard.clone());
            self.version_write(&mut state, &metacard);
            debug!(target: "metavault::storage", id = %metacard.id, "Created record with content");
            response.metacards.push(metacard);
        }
        Ok(response)
    }

    fn update_with_content(
        &self,
        id: &str,
        mut items: Vec<ContentItem>,
    ) -> CatalogResult<WriteResponse> {
        self.record(CatalogCall::UpdateWithContent(id.to_string()));
        self.check_available()?;
        if self.take_update_fault() {
            return Err(CatalogError::ingest(format!("update of {} refused", id)));
        }
        if self.is_rejected(id) {
            return Ok(WriteResponse {
                metacards: Vec::new(),
                processing_errors: vec![ProcessingError::new(id, "rejected")],
            });
        }
        if self.get(id).is_none() {
            return Err(CatalogError::NotFound(id.to_string()));
        }

        for item in items.iter_mut() {
            item.id = id.to_string();
        }
        let records = self.absorb_content(items, |i| self.get(i))?;
        let mut state = self.state.write();
        let mut stored = Vec::with_capacity(records.len());
        for metacard in records {
            state.put(metacard.clone());
            self.version_write(&mut state, &metacard);
            stored.push(metacard);
        }
        debug!(target: "metavault::storage", id, "Updated record with content");
        Ok(WriteResponse::ok(stored))
    }

    fn local_resource(&self, uri: &ResourceUri) -> Result<Resource, ResourceError> {
        self.record(CatalogCall::LocalResource(uri.to_string()));
        if !uri.is_content() {
            return Err(ResourceError::NotSupported(uri.to_string()));
        }
        self.open(&ContentRef::from_uri(uri), uri.as_str())
    }

    fn local_resource_by_id(&self, id: &str) -> Result<Resource, ResourceError> {
        self.record(CatalogCall::LocalResource(id.to_string()));
        self.open(&ContentRef::primary(id), id)
    }

    fn evict_cached(&self, ids: &[String]) -> CatalogResult<()> {
        self.record(CatalogCall::EvictCached(ids.to_vec()));
        if self.faults.failing_evictions.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("cache eviction failed".to_string()));
        }
        Ok(())
    }
}
