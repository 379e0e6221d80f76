//! Structured logging schema and field name constants for vitrine.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query every subsystem by the same names.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue (per-item import failure, skipped construct) |
//! | INFO  | Lifecycle events, gallery imports, document rewrites |
//! | DEBUG | Decision points (construct matched, pass-through, fallback used) |
//! | TRACE | Per-item iteration (each descriptor, each visited block) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across a request.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "engine", "db", "storage"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "locator", "resolver", "importer", "rewriter", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "import_gallery", "process_one", "discover"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Document id being converted.
pub const DOCUMENT_ID: &str = "document_id";

/// Gallery id created in the catalog.
pub const GALLERY_ID: &str = "gallery_id";

/// Media id (source or imported).
pub const MEDIA_ID: &str = "media_id";

/// Scope filter used for discovery.
pub const SCOPE: &str = "scope";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a query or pass.
pub const RESULT_COUNT: &str = "result_count";

/// Number of constructs located in a document.
pub const CONSTRUCT_COUNT: &str = "construct_count";

/// Number of errors accumulated by an import.
pub const ERROR_COUNT: &str = "error_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
