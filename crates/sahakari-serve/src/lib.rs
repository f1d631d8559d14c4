//! Sahakari Serve - content API for the cooperative's public website.
//!
//! Reads homepage, board, staff, announcement and news content from the
//! hosted CMS, renders rich text to sanitized HTML, and accepts contact form
//! submissions.
//!
//! # Architecture
//!
//! - **Source**: [`source::ContentSource`] over the CMS HTTP API
//! - **Loaders**: cancellable fetches, homepage and board data cached for a
//!   freshness window with single-flight refresh
//! - **Views**: CMS records turned into response bodies via `sahakari-core`
//!
//! # Security
//!
//! - All CMS text is sanitized and then escaped by maud
//! - Image and link URLs are validated before they reach a response
//! - Upstream errors are logged, never returned to clients

pub mod cache;
pub mod config;
pub mod error;
pub mod loaders;
pub mod query;
pub mod routes;
pub mod source;
pub mod state;
pub mod views;

pub use config::Config;
pub use routes::router;
pub use state::AppState;
