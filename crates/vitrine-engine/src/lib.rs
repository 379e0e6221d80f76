//! # vitrine-engine
//!
//! Migration of legacy galleries embedded in documents.
//!
//! The engine locates legacy constructs (inline tags and block tree nodes),
//! resolves their media with metadata fallback, imports the media into a new
//! gallery, and rewrites the document to reference that gallery.
//!
//! Collaborators are injected as trait objects from `vitrine-core`; the
//! [`memory`] module provides in-memory ones for tests.

pub mod config;
pub mod engine;
pub mod extraction;
pub mod import;
pub mod locator;
pub mod memory;
pub mod rewrite;

pub use config::{ConfigError, MigrationConfig};
pub use engine::{filter_scopes, Clock, Collaborators, MigrationEngine};
pub use extraction::MediaResolver;
pub use import::GalleryImporter;
pub use locator::{InlineTagConstruct, LegacyConstruct, Locator, TreeNodeConstruct};
pub use rewrite::{DocumentRewriter, RewriteOutcome};
