//! Document rewrite passes.
//!
//! The inline pass replaces legacy inline tags with canonical references and
//! stops at the first construct whose import fails or errors. The tree pass
//! replaces legacy gallery nodes with void canonical blocks; a failed or
//! erroring node is skipped and the walk carries on.
//!
//! The rewriter only computes the new text. Persisting it is the caller's
//! job.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use vitrine_core::blocks::{self, Block};
use vitrine_core::{Document, ImportResult, NamingContext, Result, RewriteState};

use crate::config::MigrationConfig;
use crate::extraction::MediaResolver;
use crate::import::GalleryImporter;
use crate::locator::{LegacyConstruct, Locator};

/// Result of rewriting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutcome {
    pub state: RewriteState,
    /// Working text: the rewritten document, or the partially rewritten one
    /// when rejected.
    pub text: String,
    /// True when `text` differs from the stored document.
    pub dirty: bool,
    /// Galleries referenced by substitutions in `text`.
    pub gallery_ids: Vec<i64>,
    /// Why the document was rejected.
    pub rejection: Option<String>,
}

/// What happened to one construct.
#[derive(Debug)]
enum Migration {
    /// Nothing to import; the construct stays as written.
    Empty,
    Failed(ImportResult),
    Imported(i64),
}

/// State threaded through the tree walk.
#[derive(Debug, Default)]
struct TreeAccumulator {
    dirty: bool,
    gallery_ids: Vec<i64>,
}

/// Drives locate, resolve, import and substitute for one document.
#[derive(Clone)]
pub struct DocumentRewriter {
    locator: Locator,
    resolver: MediaResolver,
    importer: GalleryImporter,
    canonical_tag: String,
    canonical_block: String,
}

impl DocumentRewriter {
    pub fn new(
        config: &MigrationConfig,
        resolver: MediaResolver,
        importer: GalleryImporter,
    ) -> Result<Self> {
        Ok(Self {
            locator: Locator::new(config)?,
            resolver,
            importer,
            canonical_tag: config.canonical_tag.clone(),
            canonical_block: config.canonical_block.clone(),
        })
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Canonical inline reference to a gallery.
    pub fn canonical_inline(&self, gallery_id: i64) -> String {
        format!("[{} id=\"{}\"]", self.canonical_tag, gallery_id)
    }

    /// Void canonical block referencing a gallery.
    pub fn canonical_node(&self, gallery_id: i64) -> Block {
        let mut attrs = Map::new();
        attrs.insert("id".to_string(), Value::from(gallery_id));
        Block::void(self.canonical_block.clone(), attrs)
    }

    /// Run both passes over a document.
    pub async fn rewrite(&self, document: &Document, now: DateTime<Utc>) -> Result<RewriteOutcome> {
        let naming = NamingContext::for_document(document.id, document.title.clone(), now);

        // Inline pass
        let source = document.text.as_str();
        let mut working = String::with_capacity(source.len());
        let mut cursor = 0;
        let mut dirty = false;
        let mut gallery_ids = Vec::new();

        for construct in self.locator.locate_inline_tags(source) {
            let span = construct.span.clone();
            let migration = match self
                .migrate(&LegacyConstruct::Inline(construct), &naming)
                .await
            {
                Ok(migration) => migration,
                Err(e) => {
                    // Earlier substitutions reference committed galleries; keep them.
                    working.push_str(&source[cursor..]);
                    warn!(
                        subsystem = "engine",
                        component = "rewriter",
                        document_id = document.id,
                        dirty,
                        error = %e,
                        "Inline gallery errored; document rejected"
                    );
                    return Ok(RewriteOutcome {
                        state: RewriteState::Rejected,
                        text: working,
                        dirty,
                        gallery_ids,
                        rejection: Some(format!(
                            "Document {} could not be converted: {}",
                            document.id, e
                        )),
                    });
                }
            };
            match migration {
                Migration::Empty => {}
                Migration::Imported(gallery_id) => {
                    working.push_str(&source[cursor..span.start]);
                    working.push_str(&self.canonical_inline(gallery_id));
                    cursor = span.end;
                    dirty = true;
                    gallery_ids.push(gallery_id);
                }
                Migration::Failed(result) => {
                    working.push_str(&source[cursor..]);
                    let reason = rejection_reason(&result);
                    warn!(
                        subsystem = "engine",
                        component = "rewriter",
                        document_id = document.id,
                        dirty,
                        error = %reason,
                        "Inline gallery failed; document rejected"
                    );
                    return Ok(RewriteOutcome {
                        state: RewriteState::Rejected,
                        text: working,
                        dirty,
                        gallery_ids,
                        rejection: Some(format!(
                            "Document {} could not be converted: {}",
                            document.id, reason
                        )),
                    });
                }
            }
        }
        working.push_str(&source[cursor..]);

        // Tree pass
        let tree = blocks::parse(&working);
        if blocks::contains_named(&tree, self.locator.legacy_gallery_block()) {
            let (tree, acc) = self
                .rewrite_blocks(tree, Vec::new(), &naming, TreeAccumulator::default())
                .await?;
            if acc.dirty {
                working = blocks::serialize(&tree);
                dirty = true;
                gallery_ids.extend(acc.gallery_ids);
            }
        }

        let state = if dirty {
            info!(
                subsystem = "engine",
                component = "rewriter",
                document_id = document.id,
                result_count = gallery_ids.len(),
                "Document rewritten"
            );
            RewriteState::Rewritten
        } else {
            debug!(
                subsystem = "engine",
                component = "rewriter",
                document_id = document.id,
                "Document unchanged"
            );
            RewriteState::Unchanged
        };

        Ok(RewriteOutcome {
            state,
            text: working,
            dirty,
            gallery_ids,
            rejection: None,
        })
    }

    /// Rewrite a list of sibling blocks, recursing into children of every
    /// block that is not replaced.
    fn rewrite_blocks<'a>(
        &'a self,
        nodes: Vec<Block>,
        path: Vec<usize>,
        naming: &'a NamingContext,
        acc: TreeAccumulator,
    ) -> BoxFuture<'a, Result<(Vec<Block>, TreeAccumulator)>> {
        async move {
            let mut acc = acc;
            let mut out = Vec::with_capacity(nodes.len());

            for (index, mut block) in nodes.into_iter().enumerate() {
                let mut here = path.clone();
                here.push(index);

                if let Some(construct) = self.locator.match_tree_node(&block, &here) {
                    match self.migrate(&LegacyConstruct::Tree(construct), naming).await {
                        Ok(Migration::Imported(gallery_id)) => {
                            acc.dirty = true;
                            acc.gallery_ids.push(gallery_id);
                            out.push(self.canonical_node(gallery_id));
                            continue;
                        }
                        Ok(Migration::Failed(result)) => {
                            warn!(
                                subsystem = "engine",
                                component = "rewriter",
                                document_id = naming.document_id,
                                error = %rejection_reason(&result),
                                "Gallery node failed; left unchanged"
                            );
                        }
                        Err(e) => {
                            warn!(
                                subsystem = "engine",
                                component = "rewriter",
                                document_id = naming.document_id,
                                error = %e,
                                "Gallery node errored; left unchanged"
                            );
                        }
                        Ok(Migration::Empty) => {}
                    }
                }

                let children = std::mem::take(&mut block.inner_blocks);
                let (children, next) = self.rewrite_blocks(children, here, naming, acc).await?;
                block.inner_blocks = children;
                acc = next;
                out.push(block);
            }

            Ok((out, acc))
        }
        .boxed()
    }

    /// Resolve and import one construct.
    async fn migrate(
        &self,
        construct: &LegacyConstruct<'_>,
        naming: &NamingContext,
    ) -> Result<Migration> {
        let descriptors = self.resolver.resolve(construct, naming.document_id).await?;
        if descriptors.is_empty() {
            debug!(
                subsystem = "engine",
                component = "rewriter",
                kind = construct.kind(),
                "Empty construct passed through"
            );
            return Ok(Migration::Empty);
        }

        let result = self
            .importer
            .import_gallery(&descriptors, naming, &construct.layout())
            .await?;
        match result.gallery_id {
            Some(gallery_id) if !result.failed => Ok(Migration::Imported(gallery_id)),
            _ => Ok(Migration::Failed(result)),
        }
    }
}

fn rejection_reason(result: &ImportResult) -> String {
    if result.errors.is_empty() {
        result
            .message
            .clone()
            .unwrap_or_else(|| "gallery import failed".to_string())
    } else {
        result.errors.join("; ")
    }
}
