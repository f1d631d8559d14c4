//! Health check endpoint.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::loaders::keys;
use crate::state::AppState;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    /// Whether the homepage aggregate is currently served from cache.
    homepage_cached: bool,
}

/// Public health check endpoint.
///
/// Returns basic service health for load balancer checks. Never calls the
/// content service.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "sahakari-serve",
        version: env!("CARGO_PKG_VERSION"),
        homepage_cached: state.loaders.cache().is_fresh(keys::HOMEPAGE),
    })
}
