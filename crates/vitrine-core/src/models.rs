//! Data model shared by the engine, the persistence layer and the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::defaults;

// =============================================================================
// MEDIA
// =============================================================================

/// A media item to import, produced by extraction.
///
/// Immutable once handed to the import pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// Id of the source media item in the catalog.
    pub source_id: i64,
    /// Public locator of the source file, when known.
    pub source_url: Option<String>,
    pub title: String,
    pub alt_text: String,
    pub description: String,
}

impl MediaDescriptor {
    /// Descriptor with only an id; metadata fields are empty.
    pub fn bare(source_id: i64) -> Self {
        Self {
            source_id,
            source_url: None,
            title: String::new(),
            alt_text: String::new(),
            description: String::new(),
        }
    }

    /// Filename used when uploading: last URL path segment, else `media-<id>`.
    pub fn upload_filename(&self) -> String {
        self.source_url
            .as_deref()
            .map(|url| {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                path.rsplit('/').next().unwrap_or("").to_string()
            })
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("media-{}", self.source_id))
    }
}

/// Metadata the catalog holds for an existing media item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub url: Option<String>,
    pub title: String,
    pub alt: String,
    pub description: String,
}

/// A media record in the target catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: i64,
    pub gallery_id: Option<i64>,
    pub filename: String,
    pub content_type: String,
    pub url: Option<String>,
    pub title: String,
    pub alt_text: String,
    pub description: String,
    /// Media item this record was imported from.
    pub source_media_id: Option<i64>,
    /// Free-form fields owned by transform hooks.
    #[serde(default)]
    pub extra: JsonValue,
}

impl MediaRecord {
    /// Copy the resolved metadata of a descriptor onto this record.
    pub fn apply_descriptor(mut self, descriptor: &MediaDescriptor) -> Self {
        self.title = descriptor.title.clone();
        self.alt_text = descriptor.alt_text.clone();
        self.description = descriptor.description.clone();
        self.source_media_id = Some(descriptor.source_id);
        self
    }
}

// =============================================================================
// GALLERIES
// =============================================================================

/// Layout requested by the legacy construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryLayout {
    pub columns: u32,
    pub size_slug: String,
}

impl Default for GalleryLayout {
    fn default() -> Self {
        Self {
            columns: defaults::COLUMNS,
            size_slug: defaults::SIZE_SLUG.to_string(),
        }
    }
}

/// A gallery record in the target catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryRecord {
    pub id: i64,
    pub title: String,
    pub columns: u32,
    pub size_slug: String,
    pub preview_media_id: Option<i64>,
    pub media_ids: Vec<i64>,
}

/// Outcome of importing one batch of descriptors into a new gallery.
///
/// `failed` is true exactly when `imported_media_ids` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Gallery id; `None` when the gallery was never created or was removed.
    pub gallery_id: Option<i64>,
    pub title: String,
    pub columns: u32,
    pub imported_media_ids: Vec<i64>,
    /// Per-item errors, in input order.
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub failed: bool,
}

impl ImportResult {
    /// Preview media id: the first imported item.
    pub fn preview_media_id(&self) -> Option<i64> {
        self.imported_media_ids.first().copied()
    }
}

/// Input to the gallery title rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingContext {
    pub document_title: Option<String>,
    pub document_id: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

impl NamingContext {
    /// Naming context for a gallery migrated out of a document.
    pub fn for_document(document_id: i64, title: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            document_title: Some(title.into()),
            document_id: Some(document_id),
            timestamp,
        }
    }

    /// Naming context with no document.
    pub fn standalone(timestamp: DateTime<Utc>) -> Self {
        Self {
            document_title: None,
            document_id: None,
            timestamp,
        }
    }
}

// =============================================================================
// DOCUMENTS & SCOPES
// =============================================================================

/// A document as loaded from the document store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    /// Rich-text body; the block tree view is `blocks::parse(&text)`.
    pub text: String,
}

/// A candidate document category offered to the batch protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeOption {
    pub value: String,
    pub label: String,
}

/// Terminal state of a document conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteState {
    Unchanged,
    Rewritten,
    Rejected,
}

/// Response of the per-document batch step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub rewritten: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_url: Option<String>,
    /// Galleries created while converting the document.
    #[serde(default)]
    pub gallery_ids: Vec<i64>,
}

// =============================================================================
// SINGLE CONVERSION
// =============================================================================

/// One media item supplied directly by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInput {
    pub id: i64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request to convert an explicit media list into a gallery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertRequest {
    #[serde(default)]
    pub media: Vec<MediaInput>,
    #[serde(default)]
    pub document_id: Option<i64>,
    #[serde(default)]
    pub document_title: Option<String>,
    #[serde(default)]
    pub columns: Option<u32>,
    #[serde(default)]
    pub size_slug: Option<String>,
}
