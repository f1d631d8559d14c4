//! Core content pipeline for the Sahakari cooperative website.
//!
//! This crate provides:
//! - Sanitization of untrusted CMS text and URLs
//! - Deterministic CDN image URL and `srcset` construction
//! - The block document schema and its fail-closed parse step
//! - Rendering of block documents into display nodes and HTML
//! - Read/write models for CMS records
//! - Prometheus metrics helpers
//!
//! Nothing in here performs I/O except [`metrics::start_metrics_server`].

pub mod document;
mod error;
pub mod image;
pub mod metrics;
pub mod model;
pub mod render;
pub mod sanitize;

// ═══════════════════════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════════════════════

/// Default freshness window for cached homepage and board data (5 minutes).
pub const DEFAULT_FRESHNESS_WINDOW: std::time::Duration = std::time::Duration::from_secs(300);

pub use document::{Block, BlockStyle, Document, ImageBlock, Mark, Span, TextBlock, parse_document};
pub use error::{Error, Result};
pub use image::{ImageFormat, ImageOptions, ImageRef, ImageUrlBuilder};
pub use render::{DocumentRenderer, RenderOptions, RenderedNode, plain_text, to_markup};
pub use sanitize::{sanitize_text, validate_image_url, validate_link_url};
