//! Media extraction and metadata fallback.
//!
//! Turns a located construct into an ordered list of [`MediaDescriptor`]s.
//! Every field follows a fixed fallback chain; lookups go through the
//! catalog.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use vitrine_core::{GalleryCatalog, MediaDescriptor, MediaInput, MediaMetadata, Result};

use crate::locator::{InlineTagConstruct, LegacyConstruct, TreeNodeConstruct};

static IMG_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<img\b[^>]*>").expect("img pattern is valid"));

/// One attribute of an HTML start tag, scanned left to right so that quoted
/// values are consumed whole.
static HTML_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)(?P<key>[^\s"'=<>/]+)(?:\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^\s>]+)))?"#,
    )
    .expect("attribute pattern is valid")
});

/// Resolves constructs and caller-supplied inputs into descriptors.
#[derive(Clone)]
pub struct MediaResolver {
    catalog: Arc<dyn GalleryCatalog>,
}

impl MediaResolver {
    pub fn new(catalog: Arc<dyn GalleryCatalog>) -> Self {
        Self { catalog }
    }

    /// Descriptors for a construct, in construct order.
    ///
    /// An empty result means the construct has nothing to import.
    pub async fn resolve(
        &self,
        construct: &LegacyConstruct<'_>,
        document_id: Option<i64>,
    ) -> Result<Vec<MediaDescriptor>> {
        let descriptors = match construct {
            LegacyConstruct::Inline(inline) => self.resolve_inline(inline, document_id).await?,
            LegacyConstruct::Tree(node) => self.resolve_tree(node).await?,
        };
        debug!(
            subsystem = "engine",
            component = "resolver",
            kind = construct.kind(),
            result_count = descriptors.len(),
            "Construct resolved"
        );
        Ok(descriptors)
    }

    /// Media ids an inline tag refers to.
    ///
    /// An explicit `ids` list wins. Otherwise the catalog is asked for the
    /// children of the tag's scope (its `id` attribute, or the document).
    pub async fn inline_media_ids(
        &self,
        construct: &InlineTagConstruct,
        document_id: Option<i64>,
    ) -> Result<Vec<i64>> {
        if let Some(ids) = &construct.id_list {
            return Ok(ids.clone());
        }

        let scope = match construct.scope_id {
            0 => document_id,
            id => Some(id),
        };
        let Some(scope) = scope else {
            debug!(
                subsystem = "engine",
                component = "resolver",
                "Inline construct has no scope; nothing to resolve"
            );
            return Ok(Vec::new());
        };

        self.catalog
            .query_child_media(
                scope,
                construct.include_list.as_deref(),
                construct.exclude_list.as_deref(),
            )
            .await
    }

    async fn resolve_inline(
        &self,
        construct: &InlineTagConstruct,
        document_id: Option<i64>,
    ) -> Result<Vec<MediaDescriptor>> {
        let ids = self.inline_media_ids(construct, document_id).await?;
        let mut descriptors = Vec::with_capacity(ids.len());
        for id in ids {
            let metadata = self.metadata(id).await?;
            descriptors.push(MediaDescriptor {
                source_id: id,
                source_url: non_empty(metadata.url),
                title: metadata.title,
                alt_text: metadata.alt,
                description: metadata.description,
            });
        }
        Ok(descriptors)
    }

    async fn resolve_tree(&self, construct: &TreeNodeConstruct<'_>) -> Result<Vec<MediaDescriptor>> {
        let mut descriptors = Vec::with_capacity(construct.child_images.len());
        for child in &construct.child_images {
            let Some(id) = child.attr_i64("id") else {
                trace!(
                    subsystem = "engine",
                    component = "resolver",
                    "Image child without numeric id skipped"
                );
                continue;
            };

            let metadata = self.metadata(id).await?;
            let alt_text = markup_alt(&child.inner_html()).unwrap_or(metadata.alt);
            let source_url = non_empty(metadata.url)
                .or_else(|| child.attr_str("url").map(str::to_string))
                .and_then(|u| non_empty(Some(u)));

            descriptors.push(MediaDescriptor {
                source_id: id,
                source_url,
                title: metadata.title,
                alt_text,
                description: metadata.description,
            });
        }
        Ok(descriptors)
    }

    /// Descriptors for caller-supplied media, filling blanks from the catalog.
    pub async fn resolve_inputs(&self, inputs: &[MediaInput]) -> Result<Vec<MediaDescriptor>> {
        let mut descriptors = Vec::with_capacity(inputs.len());
        for input in inputs {
            let metadata = self.metadata(input.id).await?;
            descriptors.push(MediaDescriptor {
                source_id: input.id,
                source_url: non_empty(input.url.clone()).or_else(|| non_empty(metadata.url)),
                title: first_non_empty(input.title.clone(), metadata.title),
                alt_text: first_non_empty(input.alt.clone(), metadata.alt),
                description: first_non_empty(input.description.clone(), metadata.description),
            });
        }
        Ok(descriptors)
    }

    async fn metadata(&self, id: i64) -> Result<MediaMetadata> {
        let metadata = self.catalog.get_media_metadata(id).await?;
        if metadata.is_none() {
            trace!(
                subsystem = "engine",
                component = "resolver",
                media_id = id,
                "No catalog metadata; using empty fields"
            );
        }
        Ok(metadata.unwrap_or_default())
    }
}

/// The decoded `alt` of the first `<img>` in a markup fragment.
///
/// Returns `None` for missing tags, missing or blank alt text, and markup
/// that cannot be scanned.
pub fn markup_alt(html: &str) -> Option<String> {
    let img = IMG_TAG.find(html)?.as_str();
    let attrs = img.get(4..img.len() - 1)?;
    let caps = HTML_ATTRIBUTE
        .captures_iter(attrs)
        .find(|caps| caps["key"].eq_ignore_ascii_case("alt"))?;
    let raw = caps
        .name("dq")
        .or_else(|| caps.name("sq"))
        .or_else(|| caps.name("bare"))?
        .as_str();
    let alt = decode_entities(raw);
    let alt = alt.trim();
    (!alt.is_empty()).then(|| alt.to_string())
}

/// Decode the entities markup editors write into attribute values.
pub fn decode_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn first_non_empty(preferred: Option<String>, fallback: String) -> String {
    non_empty(preferred).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_alt_double_quoted() {
        let html = r#"<figure><img src="a.jpg" alt="Sunset &amp; sea" class="x"/></figure>"#;
        assert_eq!(markup_alt(html).as_deref(), Some("Sunset & sea"));
    }

    #[test]
    fn test_markup_alt_single_and_bare() {
        assert_eq!(markup_alt("<img alt='It&#39;s'>").as_deref(), Some("It's"));
        assert_eq!(markup_alt("<IMG SRC=a.png ALT=plain>").as_deref(), Some("plain"));
    }

    #[test]
    fn test_markup_alt_first_img_only() {
        let html = r#"<img src="a.jpg"><img src="b.jpg" alt="second">"#;
        assert_eq!(markup_alt(html), None);
    }

    #[test]
    fn test_markup_alt_blank_or_missing() {
        assert_eq!(markup_alt(r#"<img src="a.jpg" alt="  ">"#), None);
        assert_eq!(markup_alt("<p>no image</p>"), None);
        assert_eq!(markup_alt("<img src=\"broken"), None);
        assert_eq!(markup_alt(""), None);
    }

    #[test]
    fn test_data_alt_is_not_alt() {
        assert_eq!(markup_alt(r#"<img data-alt="nope" src="a.jpg">"#), None);
    }

    #[test]
    fn test_alt_inside_another_value_is_ignored() {
        let html = r#"<img title="a alt=b" alt="real">"#;
        assert_eq!(markup_alt(html).as_deref(), Some("real"));
        assert_eq!(markup_alt(r#"<img title='x alt="y"' src=a.png>"#), None);
    }

    #[test]
    fn test_first_alt_wins_after_boolean_attributes() {
        let html = r#"<img loading=lazy decoding async alt="one" alt="two">"#;
        assert_eq!(markup_alt(html).as_deref(), Some("one"));
    }

    #[test]
    fn test_decode_entities_no_double_decode() {
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
        assert_eq!(decode_entities("&quot;a&quot; &lt;b&gt;"), "\"a\" <b>");
    }
}
