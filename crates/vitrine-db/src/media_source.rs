//! Source media reader: stored blobs first, then the remote URL.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use vitrine_core::{Error, MediaSource, Result};

use crate::file_storage::StorageBackend;
use crate::remote::HttpMediaFetcher;

/// Reads legacy media bytes.
///
/// The blob recorded on the media row wins. Without one, the caller's URL
/// (or the row's own URL) is fetched when a [`HttpMediaFetcher`] is set.
#[derive(Clone)]
pub struct PgMediaSource {
    pool: PgPool,
    backend: Arc<dyn StorageBackend>,
    fetcher: Option<HttpMediaFetcher>,
}

impl PgMediaSource {
    pub fn new(pool: PgPool, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            pool,
            backend,
            fetcher: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: HttpMediaFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }
}

#[async_trait]
impl MediaSource for PgMediaSource {
    async fn read(&self, source_id: i64, source_url: Option<&str>) -> Result<Option<Vec<u8>>> {
        let row = sqlx::query("SELECT storage_path, url FROM media WHERE id = $1")
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        let (storage_path, row_url): (Option<String>, Option<String>) = match &row {
            Some(r) => (r.get("storage_path"), r.get("url")),
            None => (None, None),
        };

        if let Some(path) = storage_path.as_deref() {
            if self.backend.exists(path).await? {
                return self.backend.read(path).await.map(Some);
            }
            warn!(
                subsystem = "media_source",
                source_id,
                storage_path = path,
                "Recorded blob is missing"
            );
        }

        let url = source_url
            .filter(|u| !u.trim().is_empty())
            .map(str::to_string)
            .or(row_url);
        match (url, &self.fetcher) {
            (Some(url), Some(fetcher)) if HttpMediaFetcher::supports(&url) => {
                fetcher.fetch(&url).await
            }
            _ => {
                debug!(subsystem = "media_source", source_id, "No readable source");
                Ok(None)
            }
        }
    }
}
