//! Gallery import pipeline: partial failure, rollback and preview selection.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;
use vitrine_core::{
    Error, GalleryLayout, MediaDescriptor, MediaRecord, MediaTransform, NamingContext,
    TransformContext,
};
use vitrine_engine::import::{GalleryImporter, CREATE_FAILED, NOTHING_IMPORTED};
use vitrine_engine::memory::{InMemoryCatalog, InMemoryMediaSource};

const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];

fn descriptor(id: i64, file: &str) -> MediaDescriptor {
    MediaDescriptor {
        source_id: id,
        source_url: Some(format!("https://legacy.example.com/uploads/{}", file)),
        title: format!("Title {}", id),
        alt_text: format!("Alt {}", id),
        description: format!("Description {}", id),
    }
}

fn abc() -> Vec<MediaDescriptor> {
    vec![
        descriptor(1, "a.png"),
        descriptor(2, "b.png"),
        descriptor(3, "c.png"),
    ]
}

fn naming() -> NamingContext {
    NamingContext::for_document(
        42,
        "My Great Vacation Photos From Summer",
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 5).unwrap(),
    )
}

fn full_source() -> InMemoryMediaSource {
    InMemoryMediaSource::new()
        .with_file(1, PNG.to_vec())
        .with_file(2, PNG.to_vec())
        .with_file(3, PNG.to_vec())
}

fn importer(catalog: &InMemoryCatalog, source: &InMemoryMediaSource) -> GalleryImporter {
    GalleryImporter::new(
        Arc::new(catalog.clone()),
        Arc::new(source.clone()),
        vitrine_core::identity_transform(),
    )
}

#[tokio::test]
async fn test_all_items_import() {
    let catalog = InMemoryCatalog::new();
    let source = full_source();

    let result = importer(&catalog, &source)
        .import_gallery(&abc(), &naming(), &GalleryLayout::default())
        .await
        .unwrap();

    assert!(!result.failed);
    assert_eq!(result.imported_media_ids.len(), 3);
    assert!(result.errors.is_empty());
    assert_eq!(result.columns, 3);
    assert_eq!(result.title, "My Great Vacati-42-Converted-2026-10-18 09:30:05");
    assert_eq!(result.message.as_deref(), Some("Imported 3 of 3 media items"));

    let gallery = catalog.gallery(result.gallery_id.unwrap()).unwrap();
    assert_eq!(gallery.media_ids, result.imported_media_ids);
    assert_eq!(gallery.preview_media_id, Some(result.imported_media_ids[0]));
    assert_eq!(gallery.size_slug, "thumbnail");
    assert_eq!(gallery.title, result.title);
}

#[tokio::test]
async fn test_metadata_applied_to_imported_records() {
    let catalog = InMemoryCatalog::new();
    let result = importer(&catalog, &full_source())
        .import_gallery(&abc()[..1], &naming(), &GalleryLayout::default())
        .await
        .unwrap();

    let record = catalog.media_record(result.imported_media_ids[0]).unwrap();
    assert_eq!(record.filename, "a.png");
    assert_eq!(record.content_type, "image/png");
    assert_eq!(record.title, "Title 1");
    assert_eq!(record.alt_text, "Alt 1");
    assert_eq!(record.description, "Description 1");
    assert_eq!(record.source_media_id, Some(1));
}

#[tokio::test]
async fn test_first_failure_shifts_preview() {
    let catalog = InMemoryCatalog::new();
    let source = InMemoryMediaSource::new()
        .with_file(2, PNG.to_vec())
        .with_file(3, PNG.to_vec());

    let result = importer(&catalog, &source)
        .import_gallery(&abc(), &naming(), &GalleryLayout::default())
        .await
        .unwrap();

    assert!(!result.failed);
    assert_eq!(result.imported_media_ids, vec![1000, 1001]);
    assert_eq!(result.preview_media_id(), Some(1000));
    assert_eq!(result.errors, vec!["Media 1: source file not found"]);
    assert_eq!(result.message.as_deref(), Some("Imported 2 of 3 media items"));

    let gallery = catalog.gallery(result.gallery_id.unwrap()).unwrap();
    assert_eq!(gallery.preview_media_id, Some(1000));
    let imported_from: Vec<_> = result
        .imported_media_ids
        .iter()
        .map(|id| catalog.media_record(*id).unwrap().source_media_id)
        .collect();
    assert_eq!(imported_from, vec![Some(2), Some(3)]);
}

#[tokio::test]
async fn test_all_uploads_fail_removes_gallery() {
    let catalog = InMemoryCatalog::new().with_upload_failure();

    let result = importer(&catalog, &full_source())
        .import_gallery(&abc(), &naming(), &GalleryLayout::default())
        .await
        .unwrap();

    assert!(result.failed);
    assert!(result.gallery_id.is_none());
    assert!(result.imported_media_ids.is_empty());
    assert_eq!(result.errors.len(), 3);
    assert_eq!(
        result.errors[0],
        "Media 1: upload failed: Storage error: upload of a.png rejected"
    );
    assert_eq!(result.message.as_deref(), Some(NOTHING_IMPORTED));
    assert!(catalog.galleries().is_empty());
    assert_eq!(catalog.call_count("delete_gallery"), 1);
    assert_eq!(catalog.call_count("save_gallery"), 0);
}

#[tokio::test]
async fn test_each_failure_kind_has_its_message() {
    let catalog = InMemoryCatalog::new().with_upload_failure_for("d.png");
    let source = InMemoryMediaSource::new()
        .with_read_error(2)
        .with_file(3, Vec::new())
        .with_file(4, PNG.to_vec())
        .with_file(5, PNG.to_vec());
    let descriptors = vec![
        descriptor(1, "a.png"),
        descriptor(2, "b.png"),
        descriptor(3, "c.png"),
        descriptor(4, "d.png"),
        descriptor(5, "e.png"),
    ];

    let result = importer(&catalog, &source)
        .import_gallery(&descriptors, &naming(), &GalleryLayout::default())
        .await
        .unwrap();

    assert_eq!(result.imported_media_ids.len(), 1);
    assert_eq!(
        result.errors,
        vec![
            "Media 1: source file not found".to_string(),
            "Media 2: unexpected error during import".to_string(),
            "Media 3: source file is empty".to_string(),
            "Media 4: upload failed: Storage error: upload of d.png rejected".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_save_media_failure_is_unexpected_per_item() {
    let catalog = InMemoryCatalog::new().with_save_media_failure();

    let result = importer(&catalog, &full_source())
        .import_gallery(&abc()[..2], &naming(), &GalleryLayout::default())
        .await
        .unwrap();

    assert!(result.failed);
    assert_eq!(
        result.errors,
        vec![
            "Media 1: unexpected error during import".to_string(),
            "Media 2: unexpected error during import".to_string(),
        ]
    );
    assert_eq!(catalog.call_count("delete_media"), 2);
    assert!(catalog.media_record(1000).is_none());
    assert!(catalog.media_record(1001).is_none());
}

#[tokio::test]
async fn test_lookup_failure_after_upload_removes_media() {
    let catalog = InMemoryCatalog::new().with_get_media_failure();

    let result = importer(&catalog, &full_source())
        .import_gallery(&abc()[..1], &naming(), &GalleryLayout::default())
        .await
        .unwrap();

    assert!(result.failed);
    assert_eq!(
        result.errors,
        vec!["Media 1: unexpected error during import".to_string()]
    );
    assert_eq!(catalog.call_count("delete_media"), 1);
    assert_eq!(catalog.call_count("save_media"), 0);
    assert!(catalog.media_record(1000).is_none());
}

#[tokio::test]
async fn test_unsaved_item_leaves_no_media_in_gallery() {
    // Second upload becomes media 1001.
    let catalog = InMemoryCatalog::new().with_save_media_failure_for(1001);

    let result = importer(&catalog, &full_source())
        .import_gallery(&abc(), &naming(), &GalleryLayout::default())
        .await
        .unwrap();

    assert!(!result.failed);
    assert_eq!(result.imported_media_ids, vec![1000, 1002]);
    assert_eq!(
        result.errors,
        vec!["Media 2: unexpected error during import".to_string()]
    );
    assert!(catalog.media_record(1001).is_none());
    let gallery = catalog.gallery(100).unwrap();
    assert_eq!(gallery.media_ids, vec![1000, 1002]);
    assert_eq!(catalog.media_record(1000).unwrap().gallery_id, Some(100));
}

#[tokio::test]
async fn test_create_failure_processes_nothing() {
    let catalog = InMemoryCatalog::new().with_create_failure();
    let source = full_source();

    let result = importer(&catalog, &source)
        .import_gallery(&abc(), &naming(), &GalleryLayout::default())
        .await
        .unwrap();

    assert!(result.failed);
    assert!(result.gallery_id.is_none());
    assert_eq!(result.errors, vec![CREATE_FAILED]);
    assert_eq!(source.read_count(), 0);
    assert_eq!(catalog.call_count("upload_media"), 0);
}

#[tokio::test]
async fn test_finalize_failure_is_returned() {
    let catalog = InMemoryCatalog::new().with_save_gallery_failure();
    let err = importer(&catalog, &full_source())
        .import_gallery(&abc(), &naming(), &GalleryLayout::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
    assert_eq!(catalog.call_count("delete_gallery"), 1);
    assert!(catalog.gallery(100).is_none());
    assert!(catalog.media_record(1000).is_none());
}

#[tokio::test]
async fn test_rollback_failure_is_returned() {
    let catalog = InMemoryCatalog::new()
        .with_upload_failure()
        .with_delete_failure();
    let result = importer(&catalog, &full_source())
        .import_gallery(&abc(), &naming(), &GalleryLayout::default())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_empty_batch_is_invalid() {
    let catalog = InMemoryCatalog::new();
    let err = importer(&catalog, &full_source())
        .import_gallery(&[], &naming(), &GalleryLayout::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(catalog.call_count("create_gallery"), 0);
}

#[tokio::test]
async fn test_transform_hook_runs_before_save() {
    let catalog = InMemoryCatalog::new();
    let transform: MediaTransform = Arc::new(|mut record: MediaRecord, ctx: &TransformContext| {
        record.extra = json!({
            "gallery": ctx.gallery_id,
            "document": ctx.document_id,
            "source": ctx.descriptor.source_id,
        });
        record
    });
    let importer = GalleryImporter::new(
        Arc::new(catalog.clone()),
        Arc::new(full_source()),
        transform,
    );

    let result = importer
        .import_gallery(&abc()[..1], &naming(), &GalleryLayout::default())
        .await
        .unwrap();

    let gallery_id = result.gallery_id.unwrap();
    let record = catalog.media_record(result.imported_media_ids[0]).unwrap();
    assert_eq!(
        record.extra,
        json!({ "gallery": gallery_id, "document": 42, "source": 1 })
    );
}

#[tokio::test]
async fn test_standalone_title_and_layout() {
    let catalog = InMemoryCatalog::new();
    let naming = NamingContext::standalone(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap());
    let layout = GalleryLayout {
        columns: 5,
        size_slug: "large".to_string(),
    };

    let result = importer(&catalog, &full_source())
        .import_gallery(&abc(), &naming, &layout)
        .await
        .unwrap();

    assert_eq!(result.title, "Converted-2026-01-02 03:04:05");
    assert_eq!(result.columns, 5);
    let gallery = catalog.gallery(result.gallery_id.unwrap()).unwrap();
    assert_eq!(gallery.columns, 5);
    assert_eq!(gallery.size_slug, "large");
}
