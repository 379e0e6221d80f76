//! Legacy construct locator.
//!
//! Finds legacy galleries in both document encodings:
//!
//! - flat inline tags: `[gallery ids="1,2" columns=4 size='medium']`
//! - block tree nodes: `<!-- block:core/gallery {..} -->` with `core/image`
//!   children
//!
//! The locator is pure. It never talks to a collaborator.

use std::collections::BTreeMap;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

use vitrine_core::blocks::{self, Block};
use vitrine_core::{defaults, Error, GalleryLayout, Result};

use crate::config::MigrationConfig;

/// `key=value` pairs inside an inline tag. Values may be double-quoted,
/// single-quoted or bare.
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?P<key>[A-Za-z_][A-Za-z0-9_-]*)\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^\s"'\]]+))"#,
    )
    .expect("attribute pattern is valid")
});

/// A legacy inline tag found in document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineTagConstruct {
    /// The tag exactly as written.
    pub raw_text: String,
    /// Byte range of `raw_text` in the document.
    pub span: Range<usize>,
    /// Every parsed attribute, keys lowercased.
    pub attributes: BTreeMap<String, String>,
    /// Explicit `ids` list; used verbatim when present.
    pub id_list: Option<Vec<i64>>,
    pub include_list: Option<Vec<i64>>,
    pub exclude_list: Option<Vec<i64>>,
    /// Explicit parent scope (`id` attribute); 0 means the enclosing document.
    pub scope_id: i64,
    pub columns: u32,
    pub size_slug: String,
}

impl InlineTagConstruct {
    pub fn layout(&self) -> GalleryLayout {
        GalleryLayout {
            columns: self.columns,
            size_slug: self.size_slug.clone(),
        }
    }
}

/// A legacy gallery node found in a block tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNodeConstruct<'a> {
    pub node: &'a Block,
    /// Index path of the node from the root list.
    pub path: Vec<usize>,
    /// Direct children with the image block name, in document order.
    pub child_images: Vec<&'a Block>,
    pub columns: u32,
    pub size_slug: String,
}

impl TreeNodeConstruct<'_> {
    pub fn layout(&self) -> GalleryLayout {
        GalleryLayout {
            columns: self.columns,
            size_slug: self.size_slug.clone(),
        }
    }
}

/// Either kind of legacy construct.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyConstruct<'a> {
    Inline(InlineTagConstruct),
    Tree(TreeNodeConstruct<'a>),
}

impl LegacyConstruct<'_> {
    pub fn layout(&self) -> GalleryLayout {
        match self {
            LegacyConstruct::Inline(c) => c.layout(),
            LegacyConstruct::Tree(c) => c.layout(),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LegacyConstruct::Inline(_) => "inline",
            LegacyConstruct::Tree(_) => "tree",
        }
    }
}

/// Locates legacy constructs using the configured names.
#[derive(Debug, Clone)]
pub struct Locator {
    inline_tag: Regex,
    legacy_gallery_block: String,
    image_block: String,
    default_columns: u32,
    default_size_slug: String,
}

impl Locator {
    pub fn new(config: &MigrationConfig) -> Result<Self> {
        let pattern = format!(r"\[{}(?P<attrs>\s[^\]]*)?\]", regex::escape(&config.inline_tag));
        let inline_tag = Regex::new(&pattern)
            .map_err(|e| Error::Config(format!("invalid inline tag pattern: {}", e)))?;

        Ok(Self {
            inline_tag,
            legacy_gallery_block: config.legacy_gallery_block.clone(),
            image_block: config.image_block.clone(),
            default_columns: config.default_columns,
            default_size_slug: config.default_size_slug.clone(),
        })
    }

    /// Block name of legacy gallery nodes.
    pub fn legacy_gallery_block(&self) -> &str {
        &self.legacy_gallery_block
    }

    /// Inline tags in `text`, ordered by position.
    pub fn locate_inline_tags(&self, text: &str) -> Vec<InlineTagConstruct> {
        self.inline_tag
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let attrs = caps.name("attrs").map(|m| m.as_str()).unwrap_or("");
                Some(self.inline_construct(whole.as_str(), whole.range(), attrs))
            })
            .collect()
    }

    fn inline_construct(&self, raw: &str, span: Range<usize>, attrs: &str) -> InlineTagConstruct {
        let attributes = parse_attributes(attrs);

        let id_list = attributes
            .get("ids")
            .map(|v| parse_id_list(v))
            .filter(|ids| !ids.is_empty());
        let include_list = attributes.get("include").map(|v| parse_id_list(v));
        let exclude_list = attributes.get("exclude").map(|v| parse_id_list(v));
        let scope_id = attributes
            .get("id")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults::SCOPE_ID);
        let columns = attributes
            .get("columns")
            .and_then(|v| v.trim().parse().ok())
            .filter(|c| *c > 0)
            .unwrap_or(self.default_columns);
        let size_slug = attributes
            .get("size")
            .map(|v| v.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.default_size_slug.clone());

        InlineTagConstruct {
            raw_text: raw.to_string(),
            span,
            attributes,
            id_list,
            include_list,
            exclude_list,
            scope_id,
            columns,
            size_slug,
        }
    }

    /// Legacy gallery nodes in a block tree, depth-first and pre-order.
    ///
    /// Descendants of a matched node are visited too, so a nested construct
    /// is reported after its ancestor.
    pub fn locate_tree_nodes<'a>(&self, tree: &'a [Block]) -> Vec<TreeNodeConstruct<'a>> {
        let mut found = Vec::new();
        blocks::walk(tree, |block, path| {
            if let Some(construct) = self.match_tree_node(block, path) {
                found.push(construct);
            }
        });
        found
    }

    /// The construct for a single block, if it is a legacy gallery node.
    pub fn match_tree_node<'a>(&self, block: &'a Block, path: &[usize]) -> Option<TreeNodeConstruct<'a>> {
        if !block.is_named(&self.legacy_gallery_block) {
            return None;
        }

        let child_images = block
            .inner_blocks
            .iter()
            .filter(|child| child.is_named(&self.image_block))
            .collect();
        let columns = block
            .attr_i64("columns")
            .and_then(|c| u32::try_from(c).ok())
            .filter(|c| *c > 0)
            .unwrap_or(self.default_columns);
        let size_slug = block
            .attr_str("sizeSlug")
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_size_slug.clone());

        Some(TreeNodeConstruct {
            node: block,
            path: path.to_vec(),
            child_images,
            columns,
            size_slug,
        })
    }

    /// True when the text contains a legacy construct in either syntax.
    pub fn has_legacy_constructs(&self, text: &str) -> bool {
        if self.inline_tag.is_match(text) {
            return true;
        }
        text.contains(&self.legacy_gallery_block)
            && blocks::contains_named(&blocks::parse(text), &self.legacy_gallery_block)
    }
}

/// Parse `key=value` pairs. Later duplicates win; keys are lowercased.
pub fn parse_attributes(attrs: &str) -> BTreeMap<String, String> {
    ATTRIBUTE
        .captures_iter(attrs)
        .filter_map(|caps| {
            let key = caps.name("key")?.as_str().to_lowercase();
            let value = caps
                .name("dq")
                .or_else(|| caps.name("sq"))
                .or_else(|| caps.name("bare"))?
                .as_str()
                .to_string();
            Some((key, value))
        })
        .collect()
}

/// Comma-separated integers; non-numeric entries are dropped.
pub fn parse_id_list(value: &str) -> Vec<i64> {
    value
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}
