//! Target gallery catalog backed by PostgreSQL and a blob [`StorageBackend`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use vitrine_core::{
    check_media, defaults, detect_media_type, sanitize_filename, Error, GalleryCatalog,
    GalleryRecord, MediaCheck, MediaMetadata, MediaRecord, Result,
};

use crate::file_storage::{compute_content_hash, generate_storage_path, StorageBackend};

const MEDIA_COLUMNS: &str = "id, gallery_id, filename, content_type, url, title, alt_text, \
                             description, source_media_id, extra";

/// PostgreSQL implementation of [`GalleryCatalog`].
#[derive(Clone)]
pub struct PgGalleryCatalog {
    pool: PgPool,
    backend: Arc<dyn StorageBackend>,
    max_upload_bytes: u64,
}

impl PgGalleryCatalog {
    pub fn new(pool: PgPool, backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            pool,
            backend,
            max_upload_bytes: defaults::MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    /// Load a gallery record.
    pub async fn get_gallery(&self, gallery_id: i64) -> Result<GalleryRecord> {
        let row = sqlx::query(
            "SELECT id, title, columns, size_slug, preview_media_id, media_ids
             FROM gallery WHERE id = $1",
        )
        .bind(gallery_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::GalleryNotFound(gallery_id))?;

        let columns: i32 = row.get("columns");
        Ok(GalleryRecord {
            id: row.get("id"),
            title: row.get("title"),
            columns: columns.max(1) as u32,
            size_slug: row.get("size_slug"),
            preview_media_id: row.get("preview_media_id"),
            media_ids: row.get("media_ids"),
        })
    }

    /// Register a legacy media item attached to `parent_id`.
    ///
    /// `data`, when given, is stored as the item's blob so that it can be
    /// read back as a migration source.
    pub async fn attach_legacy_media(
        &self,
        parent_id: i64,
        filename: &str,
        data: Option<&[u8]>,
        metadata: &MediaMetadata,
    ) -> Result<i64> {
        let filename = sanitize_filename(filename);
        let blob = match data {
            Some(data) => Some(self.store_blob(data).await?),
            None => None,
        };
        let content_type = detect_media_type(&filename, data.unwrap_or(&[]));

        let row = sqlx::query(
            "INSERT INTO media (parent_id, filename, content_type, url, title, alt_text, description,
                                storage_path, content_hash, size_bytes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING id",
        )
        .bind(parent_id)
        .bind(&filename)
        .bind(&content_type)
        .bind(metadata.url.as_deref())
        .bind(&metadata.title)
        .bind(&metadata.alt)
        .bind(&metadata.description)
        .bind(blob.as_ref().map(|(path, _)| path.as_str()))
        .bind(blob.as_ref().map(|(_, hash)| hash.as_str()))
        .bind(data.map(|d| d.len() as i64))
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.get("id"))
    }

    async fn store_blob(&self, data: &[u8]) -> Result<(String, String)> {
        let path = generate_storage_path(&Uuid::now_v7());
        let hash = compute_content_hash(data);
        self.backend.write(&path, data).await?;
        Ok((path, hash))
    }

    async fn discard_blob(&self, path: &str) {
        if let Err(e) = self.backend.delete(path).await {
            warn!(
                subsystem = "catalog",
                storage_path = path,
                error = %e,
                "Failed to remove orphaned blob"
            );
        }
    }
}

fn media_from_row(row: &PgRow) -> MediaRecord {
    let extra: Option<JsonValue> = row.get("extra");
    MediaRecord {
        id: row.get("id"),
        gallery_id: row.get("gallery_id"),
        filename: row.get("filename"),
        content_type: row.get("content_type"),
        url: row.get("url"),
        title: row.get("title"),
        alt_text: row.get("alt_text"),
        description: row.get("description"),
        source_media_id: row.get("source_media_id"),
        extra: extra.unwrap_or(JsonValue::Null),
    }
}

#[async_trait]
impl GalleryCatalog for PgGalleryCatalog {
    async fn create_gallery(&self, title: &str) -> Result<i64> {
        let row = sqlx::query("INSERT INTO gallery (title) VALUES ($1) RETURNING id")
            .bind(title)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        let gallery_id: i64 = row.get("id");
        debug!(subsystem = "catalog", op = "create_gallery", gallery_id, "Gallery created");
        Ok(gallery_id)
    }

    async fn delete_gallery(&self, gallery_id: i64) -> Result<()> {
        let paths: Vec<Option<String>> =
            sqlx::query_scalar("SELECT storage_path FROM media WHERE gallery_id = $1")
                .bind(gallery_id)
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?;

        let result = sqlx::query("DELETE FROM gallery WHERE id = $1")
            .bind(gallery_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::GalleryNotFound(gallery_id));
        }

        for path in paths.into_iter().flatten() {
            self.discard_blob(&path).await;
        }
        debug!(subsystem = "catalog", op = "delete_gallery", gallery_id, "Gallery deleted");
        Ok(())
    }

    async fn upload_media(&self, gallery_id: i64, filename: &str, data: &[u8]) -> Result<i64> {
        let filename = sanitize_filename(filename);
        let content_type = match check_media(&filename, data, self.max_upload_bytes) {
            MediaCheck::Allowed { content_type } => content_type,
            MediaCheck::Blocked { reason } => return Err(Error::InvalidInput(reason)),
        };

        let (path, hash) = self.store_blob(data).await?;
        let inserted = sqlx::query(
            "INSERT INTO media (gallery_id, filename, content_type, storage_path, content_hash, size_bytes)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(gallery_id)
        .bind(&filename)
        .bind(&content_type)
        .bind(&path)
        .bind(&hash)
        .bind(data.len() as i64)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => {
                let media_id: i64 = row.get("id");
                debug!(
                    subsystem = "catalog",
                    op = "upload_media",
                    gallery_id,
                    media_id,
                    size = data.len(),
                    "Media stored"
                );
                Ok(media_id)
            }
            Err(e) => {
                self.discard_blob(&path).await;
                Err(Error::Database(e))
            }
        }
    }

    async fn delete_media(&self, media_id: i64) -> Result<()> {
        let path: Option<Option<String>> =
            sqlx::query_scalar("DELETE FROM media WHERE id = $1 RETURNING storage_path")
                .bind(media_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;
        let path = path.ok_or(Error::MediaNotFound(media_id))?;

        if let Some(path) = path {
            self.discard_blob(&path).await;
        }
        debug!(subsystem = "catalog", op = "delete_media", media_id, "Media deleted");
        Ok(())
    }

    async fn get_media(&self, media_id: i64) -> Result<MediaRecord> {
        let row = sqlx::query(&format!("SELECT {} FROM media WHERE id = $1", MEDIA_COLUMNS))
            .bind(media_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::MediaNotFound(media_id))?;
        Ok(media_from_row(&row))
    }

    async fn save_media(&self, record: &MediaRecord) -> Result<()> {
        let result = sqlx::query(
            "UPDATE media SET filename = $2, content_type = $3, url = $4, title = $5,
                              alt_text = $6, description = $7, source_media_id = $8, extra = $9
             WHERE id = $1",
        )
        .bind(record.id)
        .bind(&record.filename)
        .bind(&record.content_type)
        .bind(record.url.as_deref())
        .bind(&record.title)
        .bind(&record.alt_text)
        .bind(&record.description)
        .bind(record.source_media_id)
        .bind(&record.extra)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::MediaNotFound(record.id));
        }
        Ok(())
    }

    async fn save_gallery(&self, record: &GalleryRecord) -> Result<()> {
        let result = sqlx::query(
            "UPDATE gallery SET title = $2, columns = $3, size_slug = $4, preview_media_id = $5,
                                media_ids = $6, updated_at_utc = NOW()
             WHERE id = $1",
        )
        .bind(record.id)
        .bind(&record.title)
        .bind(record.columns as i32)
        .bind(&record.size_slug)
        .bind(record.preview_media_id)
        .bind(record.media_ids.as_slice())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::GalleryNotFound(record.id));
        }
        Ok(())
    }

    async fn query_child_media(
        &self,
        parent_scope_id: i64,
        include: Option<&[i64]>,
        exclude: Option<&[i64]>,
    ) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM media
             WHERE parent_id = $1 AND gallery_id IS NULL
               AND ($2::BIGINT[] IS NULL OR id = ANY($2))
               AND ($3::BIGINT[] IS NULL OR NOT (id = ANY($3)))
             ORDER BY id",
        )
        .bind(parent_scope_id)
        .bind(include.map(|ids| ids.to_vec()))
        .bind(exclude.map(|ids| ids.to_vec()))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(ids)
    }

    async fn get_media_metadata(&self, media_id: i64) -> Result<Option<MediaMetadata>> {
        let row = sqlx::query("SELECT url, title, alt_text, description FROM media WHERE id = $1")
            .bind(media_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|r| MediaMetadata {
            url: r.get("url"),
            title: r.get("title"),
            alt: r.get("alt_text"),
            description: r.get("description"),
        }))
    }
}
