//! Gallery import pipeline.
//!
//! Creates a gallery, imports each descriptor in order with per-item failure
//! isolation, and removes the gallery again when nothing was imported.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, trace, warn};

use vitrine_core::{
    gallery_title, Error, GalleryCatalog, GalleryLayout, GalleryRecord, ImportResult,
    MediaDescriptor, MediaSource, MediaTransform, NamingContext, Result, TransformContext,
};

/// Error recorded when the speculative gallery cannot be created.
pub const CREATE_FAILED: &str = "Failed to create gallery";

/// Message returned when nothing imported and the gallery was deleted.
pub const NOTHING_IMPORTED: &str = "No media could be imported; gallery removed";

/// Why a single media item did not import.
#[derive(Debug)]
enum ItemFailure {
    SourceMissing,
    SourceEmpty,
    Upload(Error),
    Unexpected(Error),
}

impl ItemFailure {
    fn message(&self, source_id: i64) -> String {
        match self {
            ItemFailure::SourceMissing => format!("Media {}: source file not found", source_id),
            ItemFailure::SourceEmpty => format!("Media {}: source file is empty", source_id),
            ItemFailure::Upload(e) => format!("Media {}: upload failed: {}", source_id, e),
            ItemFailure::Unexpected(_) => {
                format!("Media {}: unexpected error during import", source_id)
            }
        }
    }
}

/// Imports descriptor batches into new galleries.
#[derive(Clone)]
pub struct GalleryImporter {
    catalog: Arc<dyn GalleryCatalog>,
    source: Arc<dyn MediaSource>,
    transform: MediaTransform,
}

impl GalleryImporter {
    pub fn new(
        catalog: Arc<dyn GalleryCatalog>,
        source: Arc<dyn MediaSource>,
        transform: MediaTransform,
    ) -> Self {
        Self {
            catalog,
            source,
            transform,
        }
    }

    /// Import `descriptors` into a freshly created gallery.
    ///
    /// Per-item problems end up in `errors` and never abort the batch. Only
    /// failures to finalize or delete the gallery are returned as `Err`; a
    /// gallery that cannot be finalized is removed first.
    pub async fn import_gallery(
        &self,
        descriptors: &[MediaDescriptor],
        naming: &NamingContext,
        layout: &GalleryLayout,
    ) -> Result<ImportResult> {
        if descriptors.is_empty() {
            return Err(Error::InvalidInput(
                "At least one media item is required".to_string(),
            ));
        }

        let start = Instant::now();
        let title = gallery_title(naming);

        let gallery_id = match self.catalog.create_gallery(&title).await {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    subsystem = "engine",
                    component = "importer",
                    op = "create_gallery",
                    error = %e,
                    "Gallery creation failed"
                );
                return Ok(ImportResult {
                    gallery_id: None,
                    title,
                    columns: layout.columns,
                    imported_media_ids: Vec::new(),
                    errors: vec![CREATE_FAILED.to_string()],
                    message: None,
                    failed: true,
                });
            }
        };
        debug!(
            subsystem = "engine",
            component = "importer",
            gallery_id,
            title = %title,
            "Gallery created"
        );

        let mut imported = Vec::with_capacity(descriptors.len());
        let mut errors = Vec::new();

        for descriptor in descriptors {
            trace!(
                subsystem = "engine",
                component = "importer",
                gallery_id,
                media_id = descriptor.source_id,
                "Importing media item"
            );
            match self
                .import_one(gallery_id, descriptor, naming.document_id)
                .await
            {
                Ok(media_id) => imported.push(media_id),
                Err(failure) => {
                    let message = failure.message(descriptor.source_id);
                    match &failure {
                        ItemFailure::Unexpected(cause) => warn!(
                            subsystem = "engine",
                            component = "importer",
                            gallery_id,
                            media_id = descriptor.source_id,
                            error = %cause,
                            "Unexpected error importing media item"
                        ),
                        _ => warn!(
                            subsystem = "engine",
                            component = "importer",
                            gallery_id,
                            media_id = descriptor.source_id,
                            error = %message,
                            "Media item not imported"
                        ),
                    }
                    errors.push(message);
                }
            }
        }

        if imported.is_empty() {
            self.catalog.delete_gallery(gallery_id).await?;
            warn!(
                subsystem = "engine",
                component = "importer",
                op = "import_gallery",
                gallery_id,
                error_count = errors.len(),
                "No media imported; gallery removed"
            );
            return Ok(ImportResult {
                gallery_id: None,
                title,
                columns: layout.columns,
                imported_media_ids: imported,
                errors,
                message: Some(NOTHING_IMPORTED.to_string()),
                failed: true,
            });
        }

        let record = GalleryRecord {
            id: gallery_id,
            title: title.clone(),
            columns: layout.columns,
            size_slug: layout.size_slug.clone(),
            preview_media_id: imported.first().copied(),
            media_ids: imported.clone(),
        };
        if let Err(e) = self.catalog.save_gallery(&record).await {
            warn!(
                subsystem = "engine",
                component = "importer",
                op = "save_gallery",
                gallery_id,
                error = %e,
                "Gallery finalize failed; removing gallery"
            );
            self.discard_gallery(gallery_id).await;
            return Err(e);
        }

        info!(
            subsystem = "engine",
            component = "importer",
            op = "import_gallery",
            gallery_id,
            result_count = imported.len(),
            error_count = errors.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Gallery import complete"
        );

        Ok(ImportResult {
            gallery_id: Some(gallery_id),
            title,
            columns: layout.columns,
            message: Some(format!(
                "Imported {} of {} media items",
                imported.len(),
                descriptors.len()
            )),
            imported_media_ids: imported,
            errors,
            failed: false,
        })
    }

    async fn import_one(
        &self,
        gallery_id: i64,
        descriptor: &MediaDescriptor,
        document_id: Option<i64>,
    ) -> std::result::Result<i64, ItemFailure> {
        let bytes = self
            .source
            .read(descriptor.source_id, descriptor.source_url.as_deref())
            .await
            .map_err(ItemFailure::Unexpected)?
            .ok_or(ItemFailure::SourceMissing)?;
        if bytes.is_empty() {
            return Err(ItemFailure::SourceEmpty);
        }

        let media_id = self
            .catalog
            .upload_media(gallery_id, &descriptor.upload_filename(), &bytes)
            .await
            .map_err(ItemFailure::Upload)?;

        if let Err(e) = self.describe(media_id, gallery_id, descriptor, document_id).await {
            if let Err(cleanup) = self.catalog.delete_media(media_id).await {
                warn!(
                    subsystem = "engine",
                    component = "importer",
                    op = "delete_media",
                    gallery_id,
                    media_id,
                    error = %cleanup,
                    "Failed to remove media after import error"
                );
            }
            return Err(ItemFailure::Unexpected(e));
        }

        Ok(media_id)
    }

    /// Copy descriptor metadata onto the uploaded record and save it.
    async fn describe(
        &self,
        media_id: i64,
        gallery_id: i64,
        descriptor: &MediaDescriptor,
        document_id: Option<i64>,
    ) -> Result<()> {
        let record = self
            .catalog
            .get_media(media_id)
            .await?
            .apply_descriptor(descriptor);

        let ctx = TransformContext {
            gallery_id,
            descriptor: descriptor.clone(),
            document_id,
        };
        let record = (self.transform)(record, &ctx);
        self.catalog.save_media(&record).await
    }

    async fn discard_gallery(&self, gallery_id: i64) {
        if let Err(e) = self.catalog.delete_gallery(gallery_id).await {
            warn!(
                subsystem = "engine",
                component = "importer",
                op = "delete_gallery",
                gallery_id,
                error = %e,
                "Failed to remove unfinished gallery"
            );
        }
    }
}
