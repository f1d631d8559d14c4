//! Prometheus metrics helpers.
//!
//! Metrics are recorded with the `metrics` facade macros anywhere in the
//! workspace. Without an installed recorder they are no-ops, so library code
//! and tests never need to initialise anything.
//!
//! # Metric Naming Conventions
//!
//! - Prefix: subsystem (`content_`, `contact_`, `render_`)
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: low cardinality only (`key`, `reason`)

use std::net::SocketAddr;

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Try to install the Prometheus recorder.
///
/// Returns `None` if a recorder is already installed.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().ok()?;
    register_metrics();
    Some(handle)
}

/// Serve `/metrics` on `port` from a background task.
pub async fn start_metrics_server(port: u16, handle: PrometheusHandle) -> std::io::Result<()> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "metrics server listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });

    Ok(())
}

/// Register descriptions for every metric the workspace records.
fn register_metrics() {
    describe_counter!(
        "content_cache_hits_total",
        "Loader activations served from a fresh cache entry (label: key)"
    );
    describe_counter!(
        "content_cache_misses_total",
        "Loader activations that had to query the content service (label: key)"
    );
    describe_counter!(
        "content_fetch_errors_total",
        "Content queries that failed (label: key)"
    );
    describe_histogram!(
        "content_fetch_duration_seconds",
        "Time spent waiting on the content service (label: key)"
    );
    describe_counter!(
        "contact_submissions_total",
        "Contact form submissions (label: outcome)"
    );
    describe_counter!(
        "render_blocks_dropped_total",
        "Document blocks omitted during rendering (label: reason)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_init_metrics_idempotent() {
        let handle1 = try_init_metrics();
        let handle2 = try_init_metrics();
        // At most one install can succeed
        assert!(handle1.is_none() || handle2.is_none());
    }

    #[test]
    fn test_register_metrics_does_not_panic() {
        register_metrics();
        register_metrics();
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        metrics::counter!("content_cache_hits_total", "key" => "test").increment(1);
        metrics::histogram!("content_fetch_duration_seconds", "key" => "test").record(0.01);
    }
}
