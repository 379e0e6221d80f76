//! Collaborator traits for the migration engine.
//!
//! These traits define the interfaces that concrete implementations
//! (PostgreSQL repositories, filesystem blobs, in-memory test doubles)
//! must satisfy.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// MEDIA SOURCE
// =============================================================================

/// Source of the original media bytes.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Read the bytes of a source media item.
    ///
    /// Returns `Ok(None)` when the item or its file does not exist.
    async fn read(&self, source_id: i64, source_url: Option<&str>) -> Result<Option<Vec<u8>>>;
}

// =============================================================================
// TARGET CATALOG
// =============================================================================

/// Target gallery/media catalog.
#[async_trait]
pub trait GalleryCatalog: Send + Sync {
    /// Create an empty gallery and return its id.
    async fn create_gallery(&self, title: &str) -> Result<i64>;

    /// Delete a gallery.
    async fn delete_gallery(&self, gallery_id: i64) -> Result<()>;

    /// Store a file under a gallery and return the new media id.
    async fn upload_media(&self, gallery_id: i64, filename: &str, data: &[u8]) -> Result<i64>;

    /// Remove a media item and its stored file.
    async fn delete_media(&self, media_id: i64) -> Result<()>;

    /// Fetch a media record.
    async fn get_media(&self, media_id: i64) -> Result<MediaRecord>;

    /// Persist a media record.
    async fn save_media(&self, record: &MediaRecord) -> Result<()>;

    /// Persist a gallery record (title, layout, preview and members).
    async fn save_gallery(&self, record: &GalleryRecord) -> Result<()>;

    /// List media attached to a parent scope, narrowed by `include` and
    /// reduced by `exclude`.
    async fn query_child_media(
        &self,
        parent_scope_id: i64,
        include: Option<&[i64]>,
        exclude: Option<&[i64]>,
    ) -> Result<Vec<i64>>;

    /// Metadata for an existing media item, if it exists.
    async fn get_media_metadata(&self, media_id: i64) -> Result<Option<MediaMetadata>>;
}

// =============================================================================
// DOCUMENT STORE
// =============================================================================

/// Document persistence.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Load a document. Fails with `Error::DocumentNotFound` when absent.
    async fn load(&self, document_id: i64) -> Result<Document>;

    /// Replace a document's text.
    async fn save(&self, document_id: i64, text: &str) -> Result<()>;

    /// Candidate document ids for a scope (all scopes when `None`), ordered by id.
    async fn list_candidates(&self, scope: Option<&str>) -> Result<Vec<i64>>;

    /// All document scopes.
    async fn list_scopes(&self) -> Result<Vec<ScopeOption>>;
}

// =============================================================================
// CAPABILITY CHECK
// =============================================================================

/// Edit-rights check consulted before any mutation.
#[async_trait]
pub trait EditPermission: Send + Sync {
    async fn can_edit(&self, document_id: i64) -> Result<bool>;
}

// =============================================================================
// MEDIA TRANSFORM HOOK
// =============================================================================

/// Context handed to a [`MediaTransform`].
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub gallery_id: i64,
    pub descriptor: MediaDescriptor,
    pub document_id: Option<i64>,
}

/// Extension point applied to each imported media record before it is saved.
pub type MediaTransform = Arc<dyn Fn(MediaRecord, &TransformContext) -> MediaRecord + Send + Sync>;

/// Transform that returns the record unchanged.
pub fn identity_transform() -> MediaTransform {
    Arc::new(|record: MediaRecord, _ctx: &TransformContext| record)
}
