//! # vitrine-core
//!
//! Core types, traits, and the block document model for vitrine, the legacy
//! gallery migration engine.
//!
//! This crate provides the data model shared by the engine, the PostgreSQL
//! collaborators and the HTTP transport, plus the collaborator traits the
//! engine is written against.

pub mod blocks;
pub mod defaults;
pub mod error;
pub mod file_safety;
pub mod logging;
pub mod models;
pub mod naming;
pub mod traits;

// Re-export commonly used types at crate root
pub use blocks::{Block, InnerContent};
pub use error::{Error, Result};
pub use file_safety::{check_media, detect_media_type, sanitize_filename, MediaCheck};
pub use models::*;
pub use naming::gallery_title;
pub use traits::*;
