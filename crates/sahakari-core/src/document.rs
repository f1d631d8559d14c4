//! Block document schema and its parse step.
//!
//! Rich-text fields arrive from the CMS as arrays of loosely-typed JSON
//! objects. [`parse_document`] decodes them into the closed [`Block`] enum.
//! Anything that does not match a known shape becomes [`Block::Unknown`] and
//! is dropped by the renderer, so new CMS block types never reach the page
//! unchecked.
//!
//! Two shapes are accepted for each block:
//!
//! ```text
//! {"_type": "block", "style": "h2", "children": [{"_type": "span", "text": "Hi", "marks": ["strong"]}]}
//! {"type": "textBlock", "style": "h2", "spans": [{"text": "Hi", "marks": ["bold"]}]}
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::image::ImageRef;

/// A parsed rich-text field: an ordered list of blocks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Document(pub Vec<Block>);

impl Document {
    /// Blocks in document order.
    pub fn blocks(&self) -> &[Block] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.map(|v| parse_document(&v)).unwrap_or_default())
    }
}

/// One unit of a block document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    /// Styled run of inline spans.
    #[serde(rename = "textBlock")]
    Text(TextBlock),
    /// Embedded image with optional caption.
    #[serde(rename = "imageBlock")]
    Image(ImageBlock),
    /// Unrecognised or malformed block, kept only for diagnostics.
    Unknown {
        /// The type tag found on the block, if any.
        kind: String,
    },
}

/// Container style of a text block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlockStyle {
    #[default]
    Normal,
    /// Heading level 1 to 6.
    Heading(u8),
    Quote,
}

impl BlockStyle {
    /// Decode a CMS style tag. Unknown tags fall back to [`BlockStyle::Normal`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "h1" => Self::Heading(1),
            "h2" => Self::Heading(2),
            "h3" => Self::Heading(3),
            "h4" => Self::Heading(4),
            "h5" => Self::Heading(5),
            "h6" => Self::Heading(6),
            "blockquote" | "quote" => Self::Quote,
            _ => Self::Normal,
        }
    }

    /// The CMS style tag for this style.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Heading(1) => "h1",
            Self::Heading(2) => "h2",
            Self::Heading(3) => "h3",
            Self::Heading(4) => "h4",
            Self::Heading(5) => "h5",
            Self::Heading(_) => "h6",
            Self::Quote => "blockquote",
        }
    }
}

impl Serialize for BlockStyle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

/// Text block: a style plus inline spans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextBlock {
    pub style: BlockStyle,
    pub spans: Vec<Span>,
}

/// Inline run of raw (unsanitized) text with formatting marks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Span {
    pub text: String,
    pub marks: Vec<Mark>,
}

/// Inline formatting mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    /// Link annotation with an unvalidated target.
    Link(String),
}

/// Image block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageBlock {
    pub image: ImageRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Parse a rich-text field. Non-array values yield an empty document.
pub fn parse_document(value: &Value) -> Document {
    let blocks = value
        .as_array()
        .map(|items| items.iter().map(parse_block).collect())
        .unwrap_or_default();
    Document(blocks)
}

/// Parse a single block, failing closed to [`Block::Unknown`].
pub fn parse_block(value: &Value) -> Block {
    let kind = value
        .get("_type")
        .or_else(|| value.get("type"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let parsed = match kind {
        "block" | "textBlock" => parse_text_block(value).map(Block::Text),
        "image" => parse_image_block(value, value).map(Block::Image),
        "imageBlock" => value
            .get("image")
            .and_then(|image| parse_image_block(value, image))
            .map(Block::Image),
        _ => None,
    };

    parsed.unwrap_or_else(|| Block::Unknown {
        kind: kind.to_string(),
    })
}

fn parse_text_block(value: &Value) -> Option<TextBlock> {
    let style = value
        .get("style")
        .and_then(Value::as_str)
        .map(BlockStyle::from_tag)
        .unwrap_or_default();

    let link_defs = link_definitions(value);

    let children = value
        .get("children")
        .or_else(|| value.get("spans"))?
        .as_array()?;

    let spans = children
        .iter()
        .filter_map(|child| parse_span(child, &link_defs))
        .collect();

    Some(TextBlock { style, spans })
}

/// `markDefs` entries of type `link`, keyed by `_key`.
fn link_definitions(value: &Value) -> HashMap<&str, &str> {
    value
        .get("markDefs")
        .and_then(Value::as_array)
        .map(|defs| {
            defs.iter()
                .filter(|d| d.get("_type").and_then(Value::as_str) == Some("link"))
                .filter_map(|d| {
                    let key = d.get("_key")?.as_str()?;
                    let href = d.get("href")?.as_str()?;
                    Some((key, href))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_span(value: &Value, link_defs: &HashMap<&str, &str>) -> Option<Span> {
    if let Some(kind) = value.get("_type").and_then(Value::as_str)
        && kind != "span"
    {
        return None;
    }

    let text = value.get("text")?.as_str()?.to_string();
    let marks = value
        .get("marks")
        .and_then(Value::as_array)
        .map(|marks| {
            marks
                .iter()
                .filter_map(|m| match m {
                    Value::String(name) => parse_mark(name, link_defs),
                    // Normalised form of a link mark: {"link": "<href>"}
                    Value::Object(obj) => obj
                        .get("link")
                        .and_then(Value::as_str)
                        .map(|href| Mark::Link(href.to_string())),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    Some(Span { text, marks })
}

fn parse_mark(mark: &str, link_defs: &HashMap<&str, &str>) -> Option<Mark> {
    match mark {
        "strong" | "bold" => Some(Mark::Bold),
        "em" | "italic" => Some(Mark::Italic),
        "underline" => Some(Mark::Underline),
        key => link_defs.get(key).map(|href| Mark::Link((*href).to_string())),
    }
}

fn parse_image_block(block: &Value, image: &Value) -> Option<ImageBlock> {
    let image = ImageRef::deserialize(image).ok()?;
    let text_field = |name: &str| {
        block
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    Some(ImageBlock {
        image,
        caption: text_field("caption"),
        alt: text_field("alt"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const REF: &str = "image-abc123-800x600-png";

    #[test]
    fn parse_normalized_text_block() {
        let doc = parse_document(&json!([
            {"type": "textBlock", "style": "h2", "spans": [{"text": "Hi", "marks": ["strong"]}]}
        ]));
        assert_eq!(
            doc.blocks(),
            &[Block::Text(TextBlock {
                style: BlockStyle::Heading(2),
                spans: vec![Span {
                    text: "Hi".to_string(),
                    marks: vec![Mark::Bold],
                }],
            })]
        );
    }

    #[test]
    fn parse_cms_block_with_children() {
        let doc = parse_document(&json!([{
            "_type": "block",
            "_key": "k1",
            "style": "normal",
            "markDefs": [],
            "children": [
                {"_type": "span", "text": "plain ", "marks": []},
                {"_type": "span", "text": "both", "marks": ["em", "underline"]}
            ]
        }]));
        let Block::Text(block) = &doc.blocks()[0] else {
            panic!("expected text block");
        };
        assert_eq!(block.style, BlockStyle::Normal);
        assert_eq!(block.spans.len(), 2);
        assert_eq!(block.spans[1].marks, vec![Mark::Italic, Mark::Underline]);
    }

    #[test]
    fn parse_link_mark_from_mark_defs() {
        let block = parse_block(&json!({
            "_type": "block",
            "markDefs": [{"_key": "abc", "_type": "link", "href": "https://example.com"}],
            "children": [{"_type": "span", "text": "site", "marks": ["abc", "missing"]}]
        }));
        let Block::Text(block) = block else {
            panic!("expected text block");
        };
        assert_eq!(
            block.spans[0].marks,
            vec![Mark::Link("https://example.com".to_string())]
        );
    }

    #[test]
    fn parse_unknown_style_defaults_to_normal() {
        let block = parse_block(&json!({"_type": "block", "style": "h9", "children": []}));
        assert!(matches!(block, Block::Text(TextBlock { style: BlockStyle::Normal, .. })));
    }

    #[test]
    fn parse_quote_styles() {
        assert_eq!(BlockStyle::from_tag("blockquote"), BlockStyle::Quote);
        assert_eq!(BlockStyle::from_tag("quote"), BlockStyle::Quote);
    }

    #[test]
    fn parse_skips_non_span_children() {
        let block = parse_block(&json!({
            "_type": "block",
            "children": [
                {"_type": "inlineWidget", "text": "x"},
                {"_type": "span", "text": "kept"},
                {"_type": "span"}
            ]
        }));
        let Block::Text(block) = block else {
            panic!("expected text block");
        };
        assert_eq!(block.spans.len(), 1);
        assert_eq!(block.spans[0].text, "kept");
    }

    #[test]
    fn parse_text_block_without_children_is_unknown() {
        let block = parse_block(&json!({"_type": "block", "children": "nope"}));
        assert_eq!(
            block,
            Block::Unknown {
                kind: "block".to_string()
            }
        );
    }

    #[test]
    fn parse_cms_image_block() {
        let block = parse_block(&json!({
            "_type": "image",
            "asset": {"_ref": REF},
            "caption": "Annual meeting",
            "alt": "   "
        }));
        let Block::Image(image) = block else {
            panic!("expected image block");
        };
        assert_eq!(image.image.asset_ref, REF);
        assert_eq!(image.caption.as_deref(), Some("Annual meeting"));
        assert!(image.alt.is_none());
    }

    #[test]
    fn parse_normalized_image_block() {
        let block = parse_block(&json!({
            "type": "imageBlock",
            "image": {"asset": {"_ref": REF}},
            "caption": "c"
        }));
        assert!(matches!(block, Block::Image(_)));
    }

    #[test]
    fn parse_image_without_asset_is_unknown() {
        let block = parse_block(&json!({"_type": "image"}));
        assert!(matches!(block, Block::Unknown { kind } if kind == "image"));
    }

    #[test]
    fn parse_unknown_type() {
        let block = parse_block(&json!({"_type": "youtubeEmbed", "url": "x"}));
        assert!(matches!(block, Block::Unknown { kind } if kind == "youtubeEmbed"));
    }

    #[test]
    fn parse_missing_type() {
        let block = parse_block(&json!({"text": "orphan"}));
        assert!(matches!(block, Block::Unknown { kind } if kind.is_empty()));
    }

    #[test]
    fn parse_document_non_array_is_empty() {
        assert!(parse_document(&json!({"_type": "block"})).is_empty());
        assert!(parse_document(&Value::Null).is_empty());
    }

    #[test]
    fn parse_document_preserves_order() {
        let doc = parse_document(&json!([
            {"_type": "block", "style": "h1", "children": [{"text": "a"}]},
            {"_type": "mystery"},
            {"_type": "image", "asset": {"_ref": REF}},
            {"_type": "block", "children": [{"text": "b"}]}
        ]));
        assert_eq!(doc.blocks().len(), 4);
        assert!(matches!(doc.blocks()[0], Block::Text(_)));
        assert!(matches!(doc.blocks()[1], Block::Unknown { .. }));
        assert!(matches!(doc.blocks()[2], Block::Image(_)));
        assert!(matches!(doc.blocks()[3], Block::Text(_)));
    }

    #[test]
    fn document_deserializes_from_null() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default)]
            body: Document,
        }
        let holder: Holder = serde_json::from_value(json!({"body": null})).unwrap();
        assert!(holder.body.is_empty());
        let holder: Holder = serde_json::from_value(json!({})).unwrap();
        assert!(holder.body.is_empty());
    }

    #[test]
    fn normalized_serialization_parses_back() {
        let doc = parse_document(&json!([
            {"_type": "block", "style": "h3", "children": [{"text": "t", "marks": ["strong"]}]},
            {"_type": "image", "asset": {"_ref": REF}, "caption": "c"}
        ]));
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value[0]["type"], "textBlock");
        assert_eq!(value[1]["type"], "imageBlock");
        assert_eq!(parse_document(&value), doc);
    }
}
