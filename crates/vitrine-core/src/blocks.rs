//! Comment-delimited block tree embedded in document text.
//!
//! The hierarchical encoding wraps HTML in delimiter comments:
//!
//! ```text
//! <!-- block:core/gallery {"columns":2} -->
//! <figure><!-- block:core/image {"id":12} --><img src="a.jpg" alt="A"/><!-- /block:core/image --></figure>
//! <!-- /block:core/gallery -->
//! <!-- block:vitrine/gallery {"id":7} /-->
//! ```
//!
//! Text outside any block becomes a freeform block. Parsing never fails:
//! invalid JSON attributes become an empty map, stray closers are kept as
//! HTML and unclosed openers end at the end of input.
//!
//! Parsed blocks keep their original delimiter text, so
//! `serialize(&parse(text)) == text` for every input. Blocks built with the
//! constructors serialize with generated delimiters and compact JSON.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Prefix of every block name inside a delimiter comment.
pub const DELIMITER_PREFIX: &str = "block:";

static DELIMITER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)<!--\s+(?P<closer>/)?block:(?P<name>[a-z][a-z0-9_-]*(?:/[a-z][a-z0-9_-]*)?)\s+(?:(?P<attrs>\{.*?\})\s+)?(?P<void>/)?-->",
    )
    .expect("block delimiter pattern is valid")
});

/// One piece of a block's inner content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InnerContent {
    /// Raw HTML owned by the block itself.
    Html(String),
    /// Slot filled by the next entry of `inner_blocks`.
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Delimiters {
    open: String,
    close: Option<String>,
}

/// A node of the block tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    name: Option<String>,
    attrs: Map<String, Value>,
    /// Child blocks, one per [`InnerContent::Block`] slot.
    pub inner_blocks: Vec<Block>,
    inner_content: Vec<InnerContent>,
    delimiters: Option<Delimiters>,
}

impl Block {
    /// Freeform HTML outside any named block.
    pub fn freeform(html: impl Into<String>) -> Self {
        Self {
            name: None,
            attrs: Map::new(),
            inner_blocks: Vec::new(),
            inner_content: vec![InnerContent::Html(html.into())],
            delimiters: None,
        }
    }

    /// Named block without inner content (`<!-- block:name {..} /-->`).
    pub fn void(name: impl Into<String>, attrs: Map<String, Value>) -> Self {
        Self {
            name: Some(name.into()),
            attrs,
            inner_blocks: Vec::new(),
            inner_content: Vec::new(),
            delimiters: None,
        }
    }

    /// Named block with HTML and child slots.
    pub fn new(
        name: impl Into<String>,
        attrs: Map<String, Value>,
        inner_content: Vec<InnerContent>,
        inner_blocks: Vec<Block>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            attrs,
            inner_blocks,
            inner_content,
            delimiters: None,
        }
    }

    /// Block name; `None` for freeform HTML.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// True when the block carries the given name.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }

    pub fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Integer attribute, accepting JSON numbers and numeric strings.
    pub fn attr_i64(&self, key: &str) -> Option<i64> {
        match self.attrs.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// String attribute.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(Value::as_str)
    }

    pub fn inner_content(&self) -> &[InnerContent] {
        &self.inner_content
    }

    /// The block's own HTML, without the markup of its children.
    pub fn inner_html(&self) -> String {
        self.inner_content
            .iter()
            .filter_map(|piece| match piece {
                InnerContent::Html(html) => Some(html.as_str()),
                InnerContent::Block => None,
            })
            .collect()
    }

    fn push_html(&mut self, html: &str) {
        match self.inner_content.last_mut() {
            Some(InnerContent::Html(existing)) => existing.push_str(html),
            _ => self.inner_content.push(InnerContent::Html(html.to_string())),
        }
    }

    fn write_to(&self, out: &mut String) {
        let Some(name) = self.name.as_deref() else {
            self.write_inner(out);
            return;
        };

        match &self.delimiters {
            Some(delimiters) => {
                out.push_str(&delimiters.open);
                self.write_inner(out);
                if let Some(close) = &delimiters.close {
                    out.push_str(close);
                }
            }
            None if self.inner_content.is_empty() && self.inner_blocks.is_empty() => {
                out.push_str(&opening_delimiter(name, &self.attrs, true));
            }
            None => {
                out.push_str(&opening_delimiter(name, &self.attrs, false));
                self.write_inner(out);
                out.push_str(&format!("<!-- /{}{} -->", DELIMITER_PREFIX, name));
            }
        }
    }

    fn write_inner(&self, out: &mut String) {
        let mut children = self.inner_blocks.iter();
        for piece in &self.inner_content {
            match piece {
                InnerContent::Html(html) => out.push_str(html),
                InnerContent::Block => {
                    if let Some(child) = children.next() {
                        child.write_to(out);
                    }
                }
            }
        }
        for child in children {
            child.write_to(out);
        }
    }
}

fn opening_delimiter(name: &str, attrs: &Map<String, Value>, void: bool) -> String {
    let mut out = format!("<!-- {}{} ", DELIMITER_PREFIX, name);
    if !attrs.is_empty() {
        out.push_str(&Value::Object(attrs.clone()).to_string());
        out.push(' ');
    }
    out.push_str(if void { "/-->" } else { "-->" });
    out
}

/// Parse document text into a block tree.
pub fn parse(text: &str) -> Vec<Block> {
    let mut output: Vec<Block> = Vec::new();
    let mut stack: Vec<Block> = Vec::new();
    let mut cursor = 0;

    for caps in DELIMITER.captures_iter(text) {
        let Some(token) = caps.get(0) else {
            continue;
        };
        push_html(&mut stack, &mut output, &text[cursor..token.start()]);
        cursor = token.end();

        let name = &caps["name"];
        if caps.name("closer").is_some() {
            let closes_top = stack.last().is_some_and(|open| open.is_named(name));
            if closes_top {
                if let Some(mut block) = stack.pop() {
                    if let Some(delimiters) = block.delimiters.as_mut() {
                        delimiters.close = Some(token.as_str().to_string());
                    }
                    attach(&mut stack, &mut output, block);
                }
            } else {
                push_html(&mut stack, &mut output, token.as_str());
            }
            continue;
        }

        let attrs = caps
            .name("attrs")
            .and_then(|m| serde_json::from_str::<Map<String, Value>>(m.as_str()).ok())
            .unwrap_or_default();
        let block = Block {
            name: Some(name.to_string()),
            attrs,
            inner_blocks: Vec::new(),
            inner_content: Vec::new(),
            delimiters: Some(Delimiters {
                open: token.as_str().to_string(),
                close: None,
            }),
        };

        if caps.name("void").is_some() {
            attach(&mut stack, &mut output, block);
        } else {
            stack.push(block);
        }
    }

    push_html(&mut stack, &mut output, &text[cursor..]);

    // Unclosed openers end at the end of input.
    while let Some(block) = stack.pop() {
        attach(&mut stack, &mut output, block);
    }

    output
}

/// Serialize a block tree back into document text.
pub fn serialize(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        block.write_to(&mut out);
    }
    out
}

/// Visit every block depth-first, pre-order, with its index path.
pub fn walk<'a, F>(blocks: &'a [Block], mut visit: F)
where
    F: FnMut(&'a Block, &[usize]),
{
    let mut path = Vec::new();
    walk_inner(blocks, &mut path, &mut visit);
}

fn walk_inner<'a, F>(blocks: &'a [Block], path: &mut Vec<usize>, visit: &mut F)
where
    F: FnMut(&'a Block, &[usize]),
{
    for (index, block) in blocks.iter().enumerate() {
        path.push(index);
        visit(block, path);
        walk_inner(&block.inner_blocks, path, visit);
        path.pop();
    }
}

/// True when any block in the tree carries the given name.
pub fn contains_named(blocks: &[Block], name: &str) -> bool {
    blocks
        .iter()
        .any(|b| b.is_named(name) || contains_named(&b.inner_blocks, name))
}

fn push_html(stack: &mut [Block], output: &mut Vec<Block>, html: &str) {
    if html.is_empty() {
        return;
    }
    if let Some(open) = stack.last_mut() {
        open.push_html(html);
        return;
    }
    match output.last_mut() {
        Some(last) if last.name.is_none() => last.push_html(html),
        _ => output.push(Block::freeform(html)),
    }
}

fn attach(stack: &mut [Block], output: &mut Vec<Block>, block: Block) {
    match stack.last_mut() {
        Some(parent) => {
            parent.inner_blocks.push(block);
            parent.inner_content.push(InnerContent::Block);
        }
        None => output.push(block),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GALLERY_DOC: &str = "<p>Intro</p>\n<!-- block:core/gallery {\"columns\":2,\"sizeSlug\":\"large\"} -->\n<figure class=\"gallery\"><!-- block:core/image {\"id\":12} -->\n<figure><img src=\"a.jpg\" alt=\"First\"/></figure>\n<!-- /block:core/image --><!-- block:core/image {\"id\":13} /--></figure>\n<!-- /block:core/gallery -->\n<p>Outro</p>";

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_parse_structure() {
        let blocks = parse(GALLERY_DOC);
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].name().is_none());
        assert!(blocks[1].is_named("core/gallery"));
        assert!(blocks[2].name().is_none());

        let gallery = &blocks[1];
        assert_eq!(gallery.attr_i64("columns"), Some(2));
        assert_eq!(gallery.attr_str("sizeSlug"), Some("large"));
        assert_eq!(gallery.inner_blocks.len(), 2);
        assert_eq!(gallery.inner_blocks[0].attr_i64("id"), Some(12));
        assert_eq!(gallery.inner_blocks[1].attr_i64("id"), Some(13));
        assert!(gallery.inner_blocks[1].inner_content().is_empty());
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let samples = [
            GALLERY_DOC,
            "",
            "plain text only",
            "<!-- block:core/paragraph --><p>x</p><!-- /block:core/paragraph -->",
            "<!--   block:core/image   {\"id\": 4}   /-->trailing",
            "<!-- /block:core/image --> stray closer",
            "<!-- block:core/group --><div>never closed",
            "<!-- block:core/image {not json} --><img/><!-- /block:core/image -->",
            "<!-- block:a --><!-- block:b --><!-- /block:a --><!-- /block:b -->",
            "<!-- not a block --> text <!-- block:x/y {\"a\":{\"b\":[1,2]}} /-->",
        ];
        for sample in samples {
            assert_eq!(serialize(&parse(sample)), sample, "round trip of {:?}", sample);
        }
    }

    #[test]
    fn test_inner_html_excludes_children() {
        let blocks = parse(GALLERY_DOC);
        let gallery = &blocks[1];
        let html = gallery.inner_html();
        assert!(html.contains("<figure class=\"gallery\">"));
        assert!(!html.contains("a.jpg"));

        let image_html = gallery.inner_blocks[0].inner_html();
        assert!(image_html.contains("alt=\"First\""));
    }

    #[test]
    fn test_invalid_attrs_become_empty() {
        let blocks = parse("<!-- block:core/image {not json} /-->");
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].attrs().is_empty());
    }

    #[test]
    fn test_stray_closer_is_html() {
        let blocks = parse("a<!-- /block:core/image -->b");
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].name().is_none());
        assert_eq!(blocks[0].inner_html(), "a<!-- /block:core/image -->b");
    }

    #[test]
    fn test_unclosed_opener_keeps_content() {
        let blocks = parse("<!-- block:core/group --><div>open");
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_named("core/group"));
        assert_eq!(blocks[0].inner_html(), "<div>open");
    }

    #[test]
    fn test_generated_void_block() {
        let block = Block::void("vitrine/gallery", attrs(json!({"id": 7})));
        assert_eq!(
            serialize(&[block]),
            "<!-- block:vitrine/gallery {\"id\":7} /-->"
        );
    }

    #[test]
    fn test_generated_container_block() {
        let block = Block::new(
            "core/group",
            Map::new(),
            vec![
                InnerContent::Html("<div>".to_string()),
                InnerContent::Block,
                InnerContent::Html("</div>".to_string()),
            ],
            vec![Block::void("core/image", attrs(json!({"id": 1})))],
        );
        assert_eq!(
            serialize(&[block]),
            "<!-- block:core/group --><div><!-- block:core/image {\"id\":1} /--></div><!-- /block:core/group -->"
        );
    }

    #[test]
    fn test_replaced_child_serializes_inside_original_parent() {
        let mut blocks = parse(GALLERY_DOC);
        blocks[1].inner_blocks[1] = Block::void("core/image", attrs(json!({"id": 99})));
        let out = serialize(&blocks);
        assert!(out.contains("<!-- block:core/image {\"id\":99} /-->"));
        assert!(out.starts_with("<p>Intro</p>\n<!-- block:core/gallery {\"columns\":2,\"sizeSlug\":\"large\"} -->"));
        assert!(out.ends_with("<!-- /block:core/gallery -->\n<p>Outro</p>"));
    }

    #[test]
    fn test_walk_is_preorder_with_paths() {
        let blocks = parse(GALLERY_DOC);
        let mut seen = Vec::new();
        walk(&blocks, |block, path| {
            seen.push((block.name().map(str::to_string), path.to_vec()));
        });
        assert_eq!(seen[1], (Some("core/gallery".to_string()), vec![1]));
        assert_eq!(seen[2], (Some("core/image".to_string()), vec![1, 0]));
        assert_eq!(seen[3], (Some("core/image".to_string()), vec![1, 1]));
        assert_eq!(seen[4], (None, vec![2]));
    }

    #[test]
    fn test_attr_i64_accepts_numeric_strings() {
        let block = Block::void("core/image", attrs(json!({"id": "15", "bad": "x"})));
        assert_eq!(block.attr_i64("id"), Some(15));
        assert_eq!(block.attr_i64("bad"), None);
        assert_eq!(block.attr_i64("missing"), None);
    }

    #[test]
    fn test_contains_named_searches_descendants() {
        let blocks = parse("<!-- block:core/group --><!-- block:core/gallery /--><!-- /block:core/group -->");
        assert!(contains_named(&blocks, "core/gallery"));
        assert!(!contains_named(&blocks, "core/image"));
    }
}
