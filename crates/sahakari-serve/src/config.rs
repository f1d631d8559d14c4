//! Application configuration loaded from environment variables.

use std::time::Duration;

use anyhow::Context;
use sahakari_core::DEFAULT_FRESHNESS_WINDOW;
use sahakari_core::image::DEFAULT_CDN_BASE;

/// Connection settings for the content service.
#[derive(Debug, Clone)]
pub struct SanityConfig {
    /// Project identifier (first label of the API host).
    pub project_id: String,

    /// Dataset name (e.g., "production").
    pub dataset: String,

    /// Dated API version without the leading `v` (e.g., "2024-01-01").
    pub api_version: String,

    /// Read through the API CDN.
    pub use_cdn: bool,

    /// API token. Required for contact submissions.
    pub token: Option<String>,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8080").
    pub bind_addr: String,

    pub sanity: SanityConfig,

    /// Image CDN origin.
    pub cdn_base: String,

    /// Freshness window for cached homepage and board data.
    pub cache_ttl: Duration,

    /// Port for the Prometheus `/metrics` listener. Disabled when unset.
    pub metrics_port: Option<u16>,
}

impl Config {
    /// Configuration with defaults for everything but the project id.
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            sanity: SanityConfig {
                project_id: project_id.into(),
                dataset: "production".to_string(),
                api_version: "2024-01-01".to_string(),
                use_cdn: true,
                token: None,
            },
            cdn_base: DEFAULT_CDN_BASE.to_string(),
            cache_ttl: DEFAULT_FRESHNESS_WINDOW,
            metrics_port: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `SANITY_PROJECT_ID`: Content project id
    ///
    /// Optional:
    /// - `SAHAKARI_BIND_ADDR`: Server bind address (default: "0.0.0.0:8080")
    /// - `SANITY_DATASET`: Dataset (default: "production")
    /// - `SANITY_API_VERSION`: API version, with or without `v` (default: "2024-01-01")
    /// - `SANITY_USE_CDN`: Read through the API CDN (default: true)
    /// - `SANITY_API_TOKEN`: API token for writes
    /// - `SANITY_CDN_BASE`: Image CDN origin (default: "https://cdn.sanity.io")
    /// - `CONTENT_CACHE_TTL_SECS`: Cache freshness window in seconds (default: 300)
    /// - `SAHAKARI_METRICS_PORT`: Port for `/metrics`
    pub fn from_env() -> anyhow::Result<Self> {
        let project_id = std::env::var("SANITY_PROJECT_ID")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .context("SANITY_PROJECT_ID must be set")?;

        let mut config = Self::new(project_id);

        if let Ok(addr) = std::env::var("SAHAKARI_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(dataset) = std::env::var("SANITY_DATASET") {
            config.sanity.dataset = dataset;
        }
        if let Ok(version) = std::env::var("SANITY_API_VERSION") {
            config.sanity.api_version = version.trim_start_matches('v').to_string();
        }
        if let Ok(flag) = std::env::var("SANITY_USE_CDN") {
            config.sanity.use_cdn = parse_bool(&flag)
                .with_context(|| format!("SANITY_USE_CDN is not a boolean: {flag}"))?;
        }
        config.sanity.token = std::env::var("SANITY_API_TOKEN")
            .ok()
            .filter(|s| !s.trim().is_empty());
        if let Ok(base) = std::env::var("SANITY_CDN_BASE") {
            config.cdn_base = base.trim_end_matches('/').to_string();
        }
        if let Ok(secs) = std::env::var("CONTENT_CACHE_TTL_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("CONTENT_CACHE_TTL_SECS is not a number: {secs}"))?;
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Ok(port) = std::env::var("SAHAKARI_METRICS_PORT") {
            config.metrics_port = Some(
                port.parse::<u16>()
                    .with_context(|| format!("SAHAKARI_METRICS_PORT is not a port: {port}"))?,
            );
        }

        tracing::info!(
            bind_addr = %config.bind_addr,
            project_id = %config.sanity.project_id,
            dataset = %config.sanity.dataset,
            api_version = %config.sanity.api_version,
            use_cdn = config.sanity.use_cdn,
            has_token = config.sanity.token.is_some(),
            cache_ttl_secs = config.cache_ttl.as_secs(),
            "configuration loaded"
        );

        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
