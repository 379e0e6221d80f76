//! Centralized default constants for vitrine.
//!
//! **This module is the single source of truth** for shared default values.
//! Configuration structs and the locator read from here instead of defining
//! their own magic values.

// =============================================================================
// LEGACY CONSTRUCTS
// =============================================================================

/// Tag name of the legacy inline construct (`[gallery ...]`).
pub const INLINE_TAG: &str = "gallery";

/// Block name of the legacy gallery node.
pub const LEGACY_GALLERY_BLOCK: &str = "core/gallery";

/// Block name of an image child inside a legacy gallery node.
pub const IMAGE_BLOCK: &str = "core/image";

/// Column count when the construct does not specify one.
pub const COLUMNS: u32 = 3;

/// Image size slug when the construct does not specify one.
pub const SIZE_SLUG: &str = "thumbnail";

/// Gallery scope id when the inline construct does not specify one.
pub const SCOPE_ID: i64 = 0;

// =============================================================================
// CANONICAL REFERENCES
// =============================================================================

/// Tag name of the canonical inline reference (`[vitrine id="..."]`).
pub const CANONICAL_TAG: &str = "vitrine";

/// Block name of the canonical reference node.
pub const CANONICAL_BLOCK: &str = "vitrine/gallery";

// =============================================================================
// GALLERY NAMING
// =============================================================================

/// Character budget shared by the document title and its dash-separated id.
pub const TITLE_NAME_BUDGET: usize = 20;

/// Marker inserted between the document part and the timestamp.
pub const CONVERTED_MARKER: &str = "Converted";

/// strftime pattern for the timestamp suffix (UTC).
pub const TITLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// BATCH PROTOCOL
// =============================================================================

/// Scope keywords tied to the target system; matching scopes are never offered.
pub const SCOPE_DENYLIST: &[&str] = &["vitrine", "media_catalog"];

/// Edit location template; `{id}` is replaced with the document id.
pub const EDIT_URL_TEMPLATE: &str = "/documents/{id}/edit";

// =============================================================================
// UPLOADS
// =============================================================================

/// Maximum size of a single imported media file (50 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Default request body limit for the HTTP transport (10 MiB).
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
