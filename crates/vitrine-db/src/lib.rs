//! # vitrine-db
//!
//! PostgreSQL collaborators for the vitrine migration engine.
//!
//! This crate provides:
//! - Connection pool management
//! - The document repository (load/save, candidates, scopes, edit rights)
//! - The target gallery catalog with filesystem blob storage
//! - A media source reading stored blobs with an HTTP fallback
//!
//! ## Example
//!
//! ```rust,ignore
//! use vitrine_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/vitrine", "/var/lib/vitrine").await?;
//!     db.migrate().await?;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod documents;
pub mod file_storage;
pub mod media_source;
pub mod pool;
pub mod remote;

use std::path::PathBuf;
use std::sync::Arc;

pub use catalog::PgGalleryCatalog;
pub use documents::PgDocumentRepository;
pub use file_storage::{
    compute_content_hash, generate_storage_path, FilesystemBackend, StorageBackend,
};
pub use media_source::PgMediaSource;
pub use pool::{create_pool_with_config, log_pool_metrics, PoolConfig};
pub use remote::HttpMediaFetcher;

#[cfg(feature = "migrations")]
use vitrine_core::Error;
use vitrine_core::Result;

/// Database handle holding every PostgreSQL collaborator.
#[derive(Clone)]
pub struct Database {
    pool: sqlx::Pool<sqlx::Postgres>,
    /// Documents, scopes and edit rights
    pub documents: PgDocumentRepository,
    /// Target gallery catalog
    pub catalog: PgGalleryCatalog,
    /// Legacy media bytes
    pub media_source: PgMediaSource,
}

impl Database {
    /// Create a database handle over `pool`, storing blobs in `backend`.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            documents: PgDocumentRepository::new(pool.clone()),
            catalog: PgGalleryCatalog::new(pool.clone(), backend.clone()),
            media_source: PgMediaSource::new(pool.clone(), backend),
            pool,
        }
    }

    /// Let the media source download legacy media by URL.
    pub fn with_remote_fetch(mut self, fetcher: HttpMediaFetcher) -> Self {
        self.media_source = self.media_source.with_fetcher(fetcher);
        self
    }

    /// Cap the size of uploaded media.
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.catalog = self.catalog.with_max_upload_bytes(max_upload_bytes);
        self
    }

    /// Connect with the default pool configuration and filesystem blobs under
    /// `storage_path`.
    pub async fn connect(url: &str, storage_path: impl Into<PathBuf>) -> Result<Self> {
        Self::connect_with_config(url, storage_path, PoolConfig::default()).await
    }

    pub async fn connect_with_config(
        url: &str,
        storage_path: impl Into<PathBuf>,
        config: PoolConfig,
    ) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        let backend = FilesystemBackend::new(storage_path);
        Ok(Self::new(pool, Arc::new(backend)))
    }

    /// Run database migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
