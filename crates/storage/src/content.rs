//! In-memory two-phase content store
//!
//! Staged requests are held aside until committed; nothing staged is visible
//! to readers. Commits of staged deletes ignore addresses that hold nothing.

use dashmap::DashMap;
use metavault_core::{
    ContentItem, ContentRef, ContentStore, StagedRequest, StorageError, StorageResult,
};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Bytes held at one content address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    /// File name
    pub filename: String,
    /// MIME type
    pub mime_type: String,
    /// The bytes
    pub bytes: Arc<[u8]>,
}

impl StoredContent {
    /// Content from owned bytes
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        StoredContent {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes: Arc::from(bytes.into()),
        }
    }

    /// Number of bytes held
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when no bytes are held
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A call made against the store, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentCall {
    /// `stage_create` with the addresses it staged
    StageCreate(Vec<ContentRef>),
    /// `stage_delete` with the addresses it staged
    StageDelete(Vec<ContentRef>),
    /// `commit` of a request id
    Commit(String),
    /// `rollback` of a request id
    Rollback(String),
}

enum StagedOp {
    Create(Vec<(ContentRef, StoredContent)>),
    Delete(Vec<ContentRef>),
}

/// Content storage held in memory
#[derive(Default)]
pub struct MemoryContentStore {
    committed: DashMap<ContentRef, StoredContent>,
    staged: Mutex<FxHashMap<String, StagedOp>>,
    calls: Mutex<Vec<ContentCall>>,
    failing_commits: AtomicUsize,
}

impl MemoryContentStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Direct access
    // ========================================================================

    /// Store content immediately, bypassing staging
    pub fn put(&self, content_ref: ContentRef, content: StoredContent) {
        self.committed.insert(content_ref, content);
    }

    /// Content held at an address
    pub fn get(&self, content_ref: &ContentRef) -> Option<StoredContent> {
        self.committed.get(content_ref).map(|c| c.value().clone())
    }

    /// True if content is held at an address
    pub fn contains(&self, content_ref: &ContentRef) -> bool {
        self.committed.contains_key(content_ref)
    }

    /// Every address held for a record id, primary first then by qualifier
    pub fn refs_for(&self, id: &str) -> Vec<ContentRef> {
        let mut refs: Vec<ContentRef> = self
            .committed
            .iter()
            .filter(|entry| entry.key().id == id)
            .map(|entry| entry.key().clone())
            .collect();
        refs.sort();
        refs
    }

    /// Copy every address held for `from_id` to the same qualifiers under `to_id`
    pub fn copy_all(&self, from_id: &str, to_id: &str) -> usize {
        let refs = self.refs_for(from_id);
        let mut copied = 0;
        for from in refs {
            if let Some(content) = self.get(&from) {
                let to = ContentRef {
                    id: to_id.to_string(),
                    qualifier: from.qualifier.clone(),
                };
                self.committed.insert(to, content);
                copied += 1;
            }
        }
        copied
    }

    /// Remove every address held for a record id
    pub fn remove_all(&self, id: &str) -> usize {
        let refs = self.refs_for(id);
        refs.iter()
            .filter(|r| self.committed.remove(*r).is_some())
            .count()
    }

    /// Number of committed addresses
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    /// True when nothing is committed
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }

    /// Number of requests staged but neither committed nor rolled back
    pub fn pending(&self) -> usize {
        self.staged.lock().len()
    }

    // ========================================================================
    // Call journal and fault injection
    // ========================================================================

    /// Calls made so far
    pub fn calls(&self) -> Vec<ContentCall> {
        self.calls.lock().clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Make the next `n` commits fail without applying anything
    pub fn fail_next_commits(&self, n: usize) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    fn record(&self, call: ContentCall) {
        self.calls.lock().push(call);
    }

    fn take_commit_fault(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl ContentStore for MemoryContentStore {
    fn stage_create(&self, items: Vec<ContentItem>) -> StorageResult<StagedRequest> {
        let mut staged = Vec::with_capacity(items.len());
        for mut item in items {
            let content_ref = item.content_ref();
            let mut bytes = Vec::new();
            item.stream.read_to_end(&mut bytes)?;
            staged.push((
                content_ref,
                StoredContent::new(item.filename, item.mime_type, bytes),
            ));
        }

        let refs: Vec<ContentRef> = staged.iter().map(|(r, _)| r.clone()).collect();
        let request = StagedRequest {
            id: new_request_id(),
            refs: refs.clone(),
        };
        self.staged
            .lock()
            .insert(request.id.clone(), StagedOp::Create(staged));
        self.record(ContentCall::StageCreate(refs));
        debug!(target: "metavault::storage", request = %request.id, items = request.refs.len(), "Staged content create");
        Ok(request)
    }

    fn stage_delete(&self, refs: Vec<ContentRef>) -> StorageResult<StagedRequest> {
        let request = StagedRequest {
            id: new_request_id(),
            refs: refs.clone(),
        };
        self.staged
            .lock()
            .insert(request.id.clone(), StagedOp::Delete(refs.clone()));
        self.record(ContentCall::StageDelete(refs));
        debug!(target: "metavault::storage", request = %request.id, items = request.refs.len(), "Staged content delete");
        Ok(request)
    }

    fn commit(&self, request: &StagedRequest) -> StorageResult<()> {
        self.record(ContentCall::Commit(request.id.clone()));
        if self.take_commit_fault() {
            return Err(StorageError::Storage(format!(
                "commit of {} refused",
                request.id
            )));
        }

        let op = self
            .staged
            .lock()
            .remove(&request.id)
            .ok_or_else(|| StorageError::UnknownRequest(request.id.clone()))?;
        match op {
            StagedOp::Create(items) => {
                for (content_ref, content) in items {
                    self.committed.insert(content_ref, content);
                }
            }
            StagedOp::Delete(refs) => {
                for content_ref in refs {
                    if self.committed.remove(&content_ref).is_none() {
                        debug!(target: "metavault::storage", content = %content_ref, "Nothing stored to delete");
                    }
                }
            }
        }
        Ok(())
    }

    fn rollback(&self, request: &StagedRequest) -> StorageResult<()> {
        self.record(ContentCall::Rollback(request.id.clone()));
        self.staged
            .lock()
            .remove(&request.id)
            .map(|_| ())
            .ok_or_else(|| StorageError::UnknownRequest(request.id.clone()))
    }
}
