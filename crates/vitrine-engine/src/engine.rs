//! Migration engine: the operations exposed to transports.
//!
//! The batch protocol is stateless. A client calls [`MigrationEngine::discover`]
//! once and then [`MigrationEngine::process_one`] per document; nothing is
//! kept between calls.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use vitrine_core::{
    identity_transform, ConvertRequest, DocumentStore, EditPermission, Error, GalleryCatalog,
    GalleryLayout, ImportResult, MediaSource, MediaTransform, NamingContext, ProcessOutcome,
    Result, RewriteState, ScopeOption,
};

use crate::config::MigrationConfig;
use crate::extraction::MediaResolver;
use crate::import::GalleryImporter;
use crate::rewrite::DocumentRewriter;

/// Source of "now" for gallery titles.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Message returned by discovery when nothing is left to convert.
pub const NO_CANDIDATES: &str = "No documents with legacy galleries found";

/// The collaborators an engine runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub documents: Arc<dyn DocumentStore>,
    pub permissions: Arc<dyn EditPermission>,
    pub catalog: Arc<dyn GalleryCatalog>,
    pub source: Arc<dyn MediaSource>,
    pub transform: MediaTransform,
}

impl Collaborators {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        permissions: Arc<dyn EditPermission>,
        catalog: Arc<dyn GalleryCatalog>,
        source: Arc<dyn MediaSource>,
    ) -> Self {
        Self {
            documents,
            permissions,
            catalog,
            source,
            transform: identity_transform(),
        }
    }

    /// Apply a hook to every imported media record before it is saved.
    pub fn with_transform(mut self, transform: MediaTransform) -> Self {
        self.transform = transform;
        self
    }
}

/// Legacy gallery migration engine.
#[derive(Clone)]
pub struct MigrationEngine {
    config: Arc<MigrationConfig>,
    documents: Arc<dyn DocumentStore>,
    permissions: Arc<dyn EditPermission>,
    resolver: MediaResolver,
    importer: GalleryImporter,
    rewriter: DocumentRewriter,
    clock: Clock,
}

impl MigrationEngine {
    pub fn new(config: MigrationConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let resolver = MediaResolver::new(collaborators.catalog.clone());
        let importer = GalleryImporter::new(
            collaborators.catalog,
            collaborators.source,
            collaborators.transform,
        );
        let rewriter = DocumentRewriter::new(&config, resolver.clone(), importer.clone())?;

        Ok(Self {
            config: Arc::new(config),
            documents: collaborators.documents,
            permissions: collaborators.permissions,
            resolver,
            importer,
            rewriter,
            clock: Arc::new(Utc::now),
        })
    }

    /// Replace the clock used for gallery titles.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Convert an explicit media list into one gallery.
    pub async fn convert_single(&self, request: ConvertRequest) -> Result<ImportResult> {
        if request.media.is_empty() {
            return Err(Error::InvalidInput(
                "At least one media item is required".to_string(),
            ));
        }
        if request.columns == Some(0) {
            return Err(Error::InvalidInput("columns must be at least 1".to_string()));
        }

        let now = (self.clock)();
        let naming = match request.document_id {
            Some(document_id) => {
                let document = self.documents.load(document_id).await?;
                self.require_edit(document_id).await?;
                let title = request
                    .document_title
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or(document.title);
                NamingContext::for_document(document_id, title, now)
            }
            None => NamingContext::standalone(now),
        };

        let layout = GalleryLayout {
            columns: request.columns.unwrap_or(self.config.default_columns),
            size_slug: request
                .size_slug
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| self.config.default_size_slug.clone()),
        };

        let descriptors = self.resolver.resolve_inputs(&request.media).await?;
        let result = self
            .importer
            .import_gallery(&descriptors, &naming, &layout)
            .await?;

        info!(
            subsystem = "engine",
            op = "convert_single",
            document_id = request.document_id,
            gallery_id = result.gallery_id,
            result_count = result.imported_media_ids.len(),
            error_count = result.errors.len(),
            "Single conversion finished"
        );
        Ok(result)
    }

    /// Documents in `scope` that still hold legacy galleries and may be edited.
    pub async fn discover(&self, scope: Option<&str>) -> Result<Vec<i64>> {
        let start = Instant::now();
        let candidates = self.documents.list_candidates(scope).await?;

        let mut eligible = Vec::new();
        for document_id in candidates {
            let document = match self.documents.load(document_id).await {
                Ok(document) => document,
                Err(Error::DocumentNotFound(_)) => {
                    debug!(
                        subsystem = "engine",
                        op = "discover",
                        document_id,
                        "Candidate vanished; skipped"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            if !self.rewriter.locator().has_legacy_constructs(&document.text) {
                continue;
            }
            if !self.permissions.can_edit(document_id).await? {
                debug!(
                    subsystem = "engine",
                    op = "discover",
                    document_id,
                    "Candidate not editable; skipped"
                );
                continue;
            }
            eligible.push(document_id);
        }

        info!(
            subsystem = "engine",
            op = "discover",
            scope = scope.unwrap_or("*"),
            result_count = eligible.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Discovery complete"
        );

        if eligible.is_empty() {
            return Err(Error::NotFound(NO_CANDIDATES.to_string()));
        }
        Ok(eligible)
    }

    /// Convert one document.
    ///
    /// A rejected document comes back as [`Error::Rejected`]; substitutions
    /// made before the rejection are saved.
    pub async fn process_one(&self, document_id: i64) -> Result<ProcessOutcome> {
        let start = Instant::now();
        let document = self.documents.load(document_id).await?;
        self.require_edit(document_id).await?;

        let outcome = self.rewriter.rewrite(&document, (self.clock)()).await?;
        let edit_url = self.config.edit_url(document_id);

        match outcome.state {
            RewriteState::Unchanged => Ok(ProcessOutcome {
                rewritten: false,
                message: format!("Document {} is not eligible for conversion", document_id),
                edit_url: None,
                gallery_ids: Vec::new(),
            }),
            RewriteState::Rewritten => {
                self.documents.save(document_id, &outcome.text).await?;
                info!(
                    subsystem = "engine",
                    op = "process_one",
                    document_id,
                    result_count = outcome.gallery_ids.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Document converted"
                );
                Ok(ProcessOutcome {
                    rewritten: true,
                    message: format!(
                        "Document {} converted: {} galleries created",
                        document_id,
                        outcome.gallery_ids.len()
                    ),
                    edit_url: Some(edit_url),
                    gallery_ids: outcome.gallery_ids,
                })
            }
            RewriteState::Rejected => {
                if outcome.dirty {
                    self.documents.save(document_id, &outcome.text).await?;
                }
                let message = outcome
                    .rejection
                    .unwrap_or_else(|| format!("Document {} could not be converted", document_id));
                warn!(
                    subsystem = "engine",
                    op = "process_one",
                    document_id,
                    partial = outcome.dirty,
                    error = %message,
                    "Document rejected"
                );
                Err(Error::Rejected {
                    message,
                    edit_url: Some(edit_url),
                })
            }
        }
    }

    /// Scopes offered to the batch protocol, without the target's own.
    pub async fn list_eligible_scopes(&self) -> Result<Vec<ScopeOption>> {
        let scopes = self.documents.list_scopes().await?;
        Ok(filter_scopes(scopes, &self.config.scope_denylist))
    }

    async fn require_edit(&self, document_id: i64) -> Result<()> {
        if self.permissions.can_edit(document_id).await? {
            Ok(())
        } else {
            Err(Error::Forbidden(format!(
                "Not allowed to edit document {}",
                document_id
            )))
        }
    }
}

/// Drop scopes whose value or label contains a denylisted keyword,
/// ignoring case.
pub fn filter_scopes(scopes: Vec<ScopeOption>, denylist: &[String]) -> Vec<ScopeOption> {
    let denylist: Vec<String> = denylist.iter().map(|k| k.to_lowercase()).collect();
    scopes
        .into_iter()
        .filter(|scope| {
            let value = scope.value.to_lowercase();
            let label = scope.label.to_lowercase();
            !denylist
                .iter()
                .any(|keyword| value.contains(keyword.as_str()) || label.contains(keyword.as_str()))
        })
        .collect()
}
