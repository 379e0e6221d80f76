//! In-memory collaborators for deterministic testing.
//!
//! Every collaborator is cheap to clone and shares its state between clones,
//! so a test can hand one clone to the engine and inspect another.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use vitrine_core::MediaMetadata;
//! use vitrine_engine::memory::{InMemoryCatalog, InMemoryMediaSource};
//!
//! let catalog = InMemoryCatalog::new().with_metadata(
//!     7,
//!     MediaMetadata {
//!         url: Some("https://cdn.example.com/a.jpg".to_string()),
//!         ..Default::default()
//!     },
//! );
//! let source = InMemoryMediaSource::new().with_file(7, b"\x89PNG\r\n\x1a\n".to_vec());
//! let shared: Arc<dyn vitrine_core::GalleryCatalog> = Arc::new(catalog.clone());
//! # let _ = (shared, source);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use vitrine_core::{
    detect_media_type, Document, DocumentStore, EditPermission, Error, GalleryCatalog,
    GalleryRecord, MediaMetadata, MediaRecord, MediaSource, Result, ScopeOption,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: String,
    pub input: String,
}

#[derive(Debug, Default)]
struct CallLog(Mutex<Vec<RecordedCall>>);

impl CallLog {
    fn record(&self, operation: &str, input: impl Into<String>) {
        lock(&self.0).push(RecordedCall {
            operation: operation.to_string(),
            input: input.into(),
        });
    }

    fn all(&self) -> Vec<RecordedCall> {
        lock(&self.0).clone()
    }

    fn count(&self, operation: &str) -> usize {
        lock(&self.0)
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn clear(&self) {
        lock(&self.0).clear()
    }
}

// =============================================================================
// CATALOG
// =============================================================================

#[derive(Debug, Clone, Default)]
struct CatalogFailures {
    create_gallery: bool,
    delete_gallery: bool,
    save_gallery: bool,
    all_uploads: bool,
    upload_filenames: HashSet<String>,
    get_media: bool,
    save_media: bool,
    save_media_ids: HashSet<i64>,
}

#[derive(Debug, Default)]
struct CatalogState {
    next_gallery_id: i64,
    next_media_id: i64,
    galleries: BTreeMap<i64, GalleryRecord>,
    media: BTreeMap<i64, MediaRecord>,
    metadata: HashMap<i64, MediaMetadata>,
    children: HashMap<i64, Vec<i64>>,
}

/// In-memory gallery catalog with failure injection.
#[derive(Debug, Clone)]
pub struct InMemoryCatalog {
    failures: Arc<CatalogFailures>,
    state: Arc<Mutex<CatalogState>>,
    calls: Arc<CallLog>,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalog {
    /// Empty catalog. Galleries are numbered from 100, media from 1000.
    pub fn new() -> Self {
        Self {
            failures: Arc::new(CatalogFailures::default()),
            state: Arc::new(Mutex::new(CatalogState {
                next_gallery_id: 100,
                next_media_id: 1000,
                ..Default::default()
            })),
            calls: Arc::new(CallLog::default()),
        }
    }

    /// Register metadata for an existing source media item.
    pub fn with_metadata(self, media_id: i64, metadata: MediaMetadata) -> Self {
        lock(&self.state).metadata.insert(media_id, metadata);
        self
    }

    /// Attach media items to a parent scope.
    pub fn with_children(self, scope_id: i64, media_ids: Vec<i64>) -> Self {
        lock(&self.state).children.insert(scope_id, media_ids);
        self
    }

    pub fn with_create_failure(mut self) -> Self {
        Arc::make_mut(&mut self.failures).create_gallery = true;
        self
    }

    pub fn with_delete_failure(mut self) -> Self {
        Arc::make_mut(&mut self.failures).delete_gallery = true;
        self
    }

    pub fn with_save_gallery_failure(mut self) -> Self {
        Arc::make_mut(&mut self.failures).save_gallery = true;
        self
    }

    /// Fail every upload.
    pub fn with_upload_failure(mut self) -> Self {
        Arc::make_mut(&mut self.failures).all_uploads = true;
        self
    }

    /// Fail uploads of one filename.
    pub fn with_upload_failure_for(mut self, filename: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.failures)
            .upload_filenames
            .insert(filename.into());
        self
    }

    pub fn with_get_media_failure(mut self) -> Self {
        Arc::make_mut(&mut self.failures).get_media = true;
        self
    }

    pub fn with_save_media_failure(mut self) -> Self {
        Arc::make_mut(&mut self.failures).save_media = true;
        self
    }

    /// Fail saves of one media record only.
    pub fn with_save_media_failure_for(mut self, media_id: i64) -> Self {
        Arc::make_mut(&mut self.failures)
            .save_media_ids
            .insert(media_id);
        self
    }

    /// All logged calls, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.all()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls.count(operation)
    }

    pub fn clear_calls(&self) {
        self.calls.clear()
    }

    /// Galleries currently in the catalog.
    pub fn galleries(&self) -> Vec<GalleryRecord> {
        lock(&self.state).galleries.values().cloned().collect()
    }

    pub fn gallery(&self, gallery_id: i64) -> Option<GalleryRecord> {
        lock(&self.state).galleries.get(&gallery_id).cloned()
    }

    pub fn media_record(&self, media_id: i64) -> Option<MediaRecord> {
        lock(&self.state).media.get(&media_id).cloned()
    }
}

#[async_trait]
impl GalleryCatalog for InMemoryCatalog {
    async fn create_gallery(&self, title: &str) -> Result<i64> {
        self.calls.record("create_gallery", title);
        if self.failures.create_gallery {
            return Err(Error::Internal("gallery creation disabled".to_string()));
        }

        let mut state = lock(&self.state);
        let id = state.next_gallery_id;
        state.next_gallery_id += 1;
        state.galleries.insert(
            id,
            GalleryRecord {
                id,
                title: title.to_string(),
                columns: 0,
                size_slug: String::new(),
                preview_media_id: None,
                media_ids: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn delete_gallery(&self, gallery_id: i64) -> Result<()> {
        self.calls.record("delete_gallery", gallery_id.to_string());
        if self.failures.delete_gallery {
            return Err(Error::Internal("gallery deletion disabled".to_string()));
        }

        let mut state = lock(&self.state);
        state
            .galleries
            .remove(&gallery_id)
            .ok_or(Error::GalleryNotFound(gallery_id))?;
        state.media.retain(|_, m| m.gallery_id != Some(gallery_id));
        Ok(())
    }

    async fn upload_media(&self, gallery_id: i64, filename: &str, data: &[u8]) -> Result<i64> {
        self.calls
            .record("upload_media", format!("{}:{}", gallery_id, filename));
        if self.failures.all_uploads || self.failures.upload_filenames.contains(filename) {
            return Err(Error::Storage(format!("upload of {} rejected", filename)));
        }

        let mut state = lock(&self.state);
        if !state.galleries.contains_key(&gallery_id) {
            return Err(Error::GalleryNotFound(gallery_id));
        }
        let id = state.next_media_id;
        state.next_media_id += 1;
        state.media.insert(
            id,
            MediaRecord {
                id,
                gallery_id: Some(gallery_id),
                filename: filename.to_string(),
                content_type: detect_media_type(filename, data),
                url: Some(format!("memory://media/{}/{}", id, filename)),
                title: String::new(),
                alt_text: String::new(),
                description: String::new(),
                source_media_id: None,
                extra: serde_json::Value::Null,
            },
        );
        Ok(id)
    }

    async fn delete_media(&self, media_id: i64) -> Result<()> {
        self.calls.record("delete_media", media_id.to_string());
        lock(&self.state)
            .media
            .remove(&media_id)
            .map(|_| ())
            .ok_or(Error::MediaNotFound(media_id))
    }

    async fn get_media(&self, media_id: i64) -> Result<MediaRecord> {
        self.calls.record("get_media", media_id.to_string());
        if self.failures.get_media {
            return Err(Error::Internal("media lookup disabled".to_string()));
        }
        lock(&self.state)
            .media
            .get(&media_id)
            .cloned()
            .ok_or(Error::MediaNotFound(media_id))
    }

    async fn save_media(&self, record: &MediaRecord) -> Result<()> {
        self.calls.record("save_media", record.id.to_string());
        if self.failures.save_media || self.failures.save_media_ids.contains(&record.id) {
            return Err(Error::Internal("media save disabled".to_string()));
        }
        lock(&self.state).media.insert(record.id, record.clone());
        Ok(())
    }

    async fn save_gallery(&self, record: &GalleryRecord) -> Result<()> {
        self.calls.record("save_gallery", record.id.to_string());
        if self.failures.save_gallery {
            return Err(Error::Internal("gallery save disabled".to_string()));
        }
        let mut state = lock(&self.state);
        if !state.galleries.contains_key(&record.id) {
            return Err(Error::GalleryNotFound(record.id));
        }
        state.galleries.insert(record.id, record.clone());
        Ok(())
    }

    async fn query_child_media(
        &self,
        parent_scope_id: i64,
        include: Option<&[i64]>,
        exclude: Option<&[i64]>,
    ) -> Result<Vec<i64>> {
        self.calls
            .record("query_child_media", parent_scope_id.to_string());
        let state = lock(&self.state);
        let ids = state
            .children
            .get(&parent_scope_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|id| include.map_or(true, |inc| inc.contains(id)))
            .filter(|id| exclude.map_or(true, |exc| !exc.contains(id)))
            .collect();
        Ok(ids)
    }

    async fn get_media_metadata(&self, media_id: i64) -> Result<Option<MediaMetadata>> {
        self.calls
            .record("get_media_metadata", media_id.to_string());
        Ok(lock(&self.state).metadata.get(&media_id).cloned())
    }
}

// =============================================================================
// MEDIA SOURCE
// =============================================================================

/// In-memory source of media bytes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMediaSource {
    files: Arc<HashMap<i64, Vec<u8>>>,
    errors: Arc<HashSet<i64>>,
    calls: Arc<CallLog>,
}

impl InMemoryMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, source_id: i64, bytes: Vec<u8>) -> Self {
        Arc::make_mut(&mut self.files).insert(source_id, bytes);
        self
    }

    /// Make reads of one item fail with an error instead of `None`.
    pub fn with_read_error(mut self, source_id: i64) -> Self {
        Arc::make_mut(&mut self.errors).insert(source_id);
        self
    }

    pub fn read_count(&self) -> usize {
        self.calls.count("read")
    }
}

#[async_trait]
impl MediaSource for InMemoryMediaSource {
    async fn read(&self, source_id: i64, _source_url: Option<&str>) -> Result<Option<Vec<u8>>> {
        self.calls.record("read", source_id.to_string());
        if self.errors.contains(&source_id) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("cannot read media {}", source_id),
            )));
        }
        Ok(self.files.get(&source_id).cloned())
    }
}

// =============================================================================
// DOCUMENT STORE
// =============================================================================

#[derive(Debug, Clone)]
struct StoredDocument {
    document: Document,
    scope: Option<String>,
    locked: bool,
}

/// In-memory document store that also answers edit-permission checks.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<Mutex<BTreeMap<i64, StoredDocument>>>,
    scopes: Arc<Vec<ScopeOption>>,
    calls: Arc<CallLog>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, id: i64, title: &str, text: &str) -> Self {
        self.insert(id, title, text, None, false)
    }

    pub fn with_scoped_document(self, id: i64, title: &str, text: &str, scope: &str) -> Self {
        self.insert(id, title, text, Some(scope), false)
    }

    /// Document the caller may not edit.
    pub fn with_locked_document(self, id: i64, title: &str, text: &str) -> Self {
        self.insert(id, title, text, None, true)
    }

    pub fn with_scope(mut self, value: &str, label: &str) -> Self {
        Arc::make_mut(&mut self.scopes).push(ScopeOption {
            value: value.to_string(),
            label: label.to_string(),
        });
        self
    }

    fn insert(self, id: i64, title: &str, text: &str, scope: Option<&str>, locked: bool) -> Self {
        lock(&self.documents).insert(
            id,
            StoredDocument {
                document: Document {
                    id,
                    title: title.to_string(),
                    text: text.to_string(),
                },
                scope: scope.map(str::to_string),
                locked,
            },
        );
        self
    }

    /// Current text of a document.
    pub fn text(&self, id: i64) -> Option<String> {
        lock(&self.documents)
            .get(&id)
            .map(|d| d.document.text.clone())
    }

    pub fn save_count(&self) -> usize {
        self.calls.count("save")
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn load(&self, document_id: i64) -> Result<Document> {
        self.calls.record("load", document_id.to_string());
        lock(&self.documents)
            .get(&document_id)
            .map(|d| d.document.clone())
            .ok_or(Error::DocumentNotFound(document_id))
    }

    async fn save(&self, document_id: i64, text: &str) -> Result<()> {
        self.calls.record("save", document_id.to_string());
        let mut documents = lock(&self.documents);
        let stored = documents
            .get_mut(&document_id)
            .ok_or(Error::DocumentNotFound(document_id))?;
        stored.document.text = text.to_string();
        Ok(())
    }

    async fn list_candidates(&self, scope: Option<&str>) -> Result<Vec<i64>> {
        self.calls
            .record("list_candidates", scope.unwrap_or_default());
        Ok(lock(&self.documents)
            .values()
            .filter(|d| scope.map_or(true, |s| d.scope.as_deref() == Some(s)))
            .map(|d| d.document.id)
            .collect())
    }

    async fn list_scopes(&self) -> Result<Vec<ScopeOption>> {
        self.calls.record("list_scopes", "");
        Ok(self.scopes.as_ref().clone())
    }
}

#[async_trait]
impl EditPermission for InMemoryDocumentStore {
    async fn can_edit(&self, document_id: i64) -> Result<bool> {
        self.calls.record("can_edit", document_id.to_string());
        Ok(lock(&self.documents)
            .get(&document_id)
            .is_some_and(|d| !d.locked))
    }
}
