//! Application state shared across all request handlers.

use std::sync::Arc;

use sahakari_core::{DocumentRenderer, ImageUrlBuilder, RenderOptions};

use crate::cache::{CacheService, Clock, SystemClock};
use crate::config::Config;
use crate::loaders::ContentLoaders;
use crate::source::{ContentSource, SanityClient};

/// Shared application state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,

    /// Content service, used directly for writes.
    pub source: Arc<dyn ContentSource>,

    /// Loaders for every content endpoint, sharing one cache.
    pub loaders: ContentLoaders,

    /// Renderer for rich text and images.
    pub renderer: Arc<DocumentRenderer>,
}

impl AppState {
    /// Create application state backed by the configured content service.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let source = Arc::new(SanityClient::new(&config.sanity)?);
        Ok(Self::with_source(config, source, Arc::new(SystemClock)))
    }

    /// Create application state over any content source and clock.
    pub fn with_source(
        config: Config,
        source: Arc<dyn ContentSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(CacheService::with_clock(config.cache_ttl, clock));
        let loaders = ContentLoaders::new(source.clone(), cache);

        let images = ImageUrlBuilder::new(
            &config.cdn_base,
            &config.sanity.project_id,
            &config.sanity.dataset,
        );
        let renderer = DocumentRenderer::new(images, RenderOptions::default());

        tracing::info!(
            cache_ttl_secs = config.cache_ttl.as_secs(),
            cdn_base = %config.cdn_base,
            "application state initialized"
        );

        Self {
            config: Arc::new(config),
            source,
            loaders,
            renderer: Arc::new(renderer),
        }
    }
}
