//! Block document rendering.
//!
//! [`DocumentRenderer::render`] turns parsed blocks into a tree of
//! [`RenderedNode`]s in input order. Every piece of span text is passed
//! through [`sanitize_text`] first, and [`to_markup`] escapes it again when
//! producing HTML with [maud](https://maud.lambda.xyz/).
//!
//! Unsafe fragments are omitted, never substituted:
//! - image blocks whose URL fails validation are dropped (warning logged)
//! - link marks with an unsafe target lose the link but keep their text
//! - unknown blocks are dropped silently

use maud::{Markup, html};
use serde::Serialize;

use crate::document::{Block, BlockStyle, ImageBlock, Mark, Span, TextBlock};
use crate::image::{Dimensions, ImageOptions, ImageUrlBuilder};
use crate::sanitize::{sanitize_text, validate_image_url, validate_link_url};

/// Image sizing used when rendering embedded images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Width of the default `src`.
    pub image_width: u32,
    /// Widths emitted in the `srcset`.
    pub src_set_widths: Vec<u32>,
    /// Encoding quality for all image URLs.
    pub quality: i64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            image_width: 1200,
            src_set_widths: vec![480, 800, 1200],
            quality: 80,
        }
    }
}

/// Container and inline elements produced by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementTag {
    Paragraph,
    Heading(u8),
    Blockquote,
    Strong,
    Emphasis,
    Underline,
}

impl ElementTag {
    fn for_style(style: BlockStyle) -> Self {
        match style {
            BlockStyle::Normal => Self::Paragraph,
            BlockStyle::Heading(level) => Self::Heading(level.clamp(1, 6)),
            BlockStyle::Quote => Self::Blockquote,
        }
    }
}

/// An embedded image ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Figure {
    pub src: String,
    pub src_set: String,
    pub alt: String,
    pub caption: Option<String>,
    pub dimensions: Option<Dimensions>,
}

/// Display-ready node. All text inside has already been sanitized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "node", rename_all = "camelCase")]
pub enum RenderedNode {
    Element {
        tag: ElementTag,
        children: Vec<RenderedNode>,
    },
    Link {
        href: String,
        children: Vec<RenderedNode>,
    },
    Text {
        text: String,
    },
    Figure(Figure),
}

/// Renders block documents using one image builder configuration.
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    images: ImageUrlBuilder,
    options: RenderOptions,
}

impl DocumentRenderer {
    pub fn new(images: ImageUrlBuilder, options: RenderOptions) -> Self {
        Self { images, options }
    }

    /// The image builder used for embedded images.
    pub fn images(&self) -> &ImageUrlBuilder {
        &self.images
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render `blocks` into display nodes, one node per kept block.
    pub fn render(&self, blocks: &[Block]) -> Vec<RenderedNode> {
        blocks
            .iter()
            .enumerate()
            .filter_map(|(index, block)| match block {
                Block::Text(text) => Some(render_text_block(text)),
                Block::Image(image) => self.render_image_block(image, index),
                Block::Unknown { kind } => {
                    tracing::debug!(index, kind = %kind, "skipping unknown block");
                    None
                }
            })
            .collect()
    }

    /// Render `blocks` straight to an HTML string.
    pub fn render_html(&self, blocks: &[Block]) -> String {
        to_markup(&self.render(blocks)).into_string()
    }

    fn render_image_block(&self, block: &ImageBlock, index: usize) -> Option<RenderedNode> {
        let opts = ImageOptions {
            width: Some(self.options.image_width),
            quality: Some(self.options.quality),
            ..ImageOptions::default()
        };
        let url = self.images.build_image_url(&block.image, &opts);

        let Some(src) = validate_image_url(&url) else {
            tracing::warn!(
                index,
                asset_ref = %block.image.asset_ref,
                "dropping image block with unsafe url"
            );
            metrics::counter!("render_blocks_dropped_total", "reason" => "unsafe_url")
                .increment(1);
            return None;
        };

        let src_set = self
            .images
            .build_src_set(&block.image, &self.options.src_set_widths, &opts);

        let caption = block
            .caption
            .as_deref()
            .map(sanitize_text)
            .filter(|c| !c.trim().is_empty());
        let alt = block
            .alt
            .as_deref()
            .map(sanitize_text)
            .or_else(|| caption.clone())
            .unwrap_or_default();

        Some(RenderedNode::Figure(Figure {
            src,
            src_set,
            alt,
            caption,
            dimensions: block.image.dimensions,
        }))
    }
}

fn render_text_block(block: &TextBlock) -> RenderedNode {
    RenderedNode::Element {
        tag: ElementTag::for_style(block.style),
        children: block.spans.iter().map(render_span).collect(),
    }
}

/// Wrap a span's sanitized text in its marks; the last mark ends up outermost.
fn render_span(span: &Span) -> RenderedNode {
    let mut node = RenderedNode::Text {
        text: sanitize_text(&span.text),
    };

    for mark in &span.marks {
        node = match mark {
            Mark::Bold => wrap(ElementTag::Strong, node),
            Mark::Italic => wrap(ElementTag::Emphasis, node),
            Mark::Underline => wrap(ElementTag::Underline, node),
            Mark::Link(href) => match validate_link_url(href) {
                Some(href) => RenderedNode::Link {
                    href,
                    children: vec![node],
                },
                None => {
                    tracing::warn!(href = %href, "omitting link with unsafe target");
                    node
                }
            },
        };
    }

    node
}

fn wrap(tag: ElementTag, child: RenderedNode) -> RenderedNode {
    RenderedNode::Element {
        tag,
        children: vec![child],
    }
}

/// Convert rendered nodes to HTML markup. Text is escaped by maud.
pub fn to_markup(nodes: &[RenderedNode]) -> Markup {
    html! {
        @for node in nodes {
            (node_markup(node))
        }
    }
}

fn node_markup(node: &RenderedNode) -> Markup {
    match node {
        RenderedNode::Text { text } => html! { (text) },
        RenderedNode::Link { href, children } => html! {
            a href=(href) rel="noopener noreferrer" { (to_markup(children)) }
        },
        RenderedNode::Figure(figure) => html! {
            figure {
                img src=(figure.src)
                    srcset=(figure.src_set)
                    sizes="(max-width: 800px) 100vw, 800px"
                    alt=(figure.alt)
                    width=[figure.dimensions.map(|d| d.width)]
                    height=[figure.dimensions.map(|d| d.height)]
                    loading="lazy";
                @if let Some(caption) = &figure.caption {
                    figcaption { (caption) }
                }
            }
        },
        RenderedNode::Element { tag, children } => {
            let inner = to_markup(children);
            match tag {
                ElementTag::Paragraph => html! { p { (inner) } },
                ElementTag::Heading(1) => html! { h1 { (inner) } },
                ElementTag::Heading(2) => html! { h2 { (inner) } },
                ElementTag::Heading(3) => html! { h3 { (inner) } },
                ElementTag::Heading(4) => html! { h4 { (inner) } },
                ElementTag::Heading(5) => html! { h5 { (inner) } },
                ElementTag::Heading(_) => html! { h6 { (inner) } },
                ElementTag::Blockquote => html! { blockquote { (inner) } },
                ElementTag::Strong => html! { strong { (inner) } },
                ElementTag::Emphasis => html! { em { (inner) } },
                ElementTag::Underline => html! { u { (inner) } },
            }
        }
    }
}

/// Sanitized plain text of all text blocks, paragraphs separated by a blank line.
pub fn plain_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .filter_map(|block| match block {
            Block::Text(text) => Some(
                text.spans
                    .iter()
                    .map(|s| sanitize_text(&s.text))
                    .collect::<String>(),
            ),
            _ => None,
        })
        .filter(|t| !t.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
