//! Read-only content endpoints.
//!
//! Each handler activates a loader, waits for it to settle and answers with
//! the fetch state, data mapped through [`crate::views`]. A client that
//! disconnects drops the handler future, which drops the loader handle and
//! aborts its query.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::ApiError;
use crate::loaders::FetchState;
use crate::state::AppState;
use crate::views;

/// Browser and CDN caching for successful content responses.
const CACHE_CONTROL: &str = "public, max-age=60, s-maxage=300, stale-while-revalidate=600";

/// GET /api/homepage
pub async fn homepage(State(state): State<AppState>) -> Result<Response, ApiError> {
    let fetched = state.loaders.homepage().settled().await;
    respond(fetched.map(|data| views::homepage(&state.renderer, &data)))
}

/// GET /api/introduction
pub async fn introduction(State(state): State<AppState>) -> Result<Response, ApiError> {
    let fetched = state.loaders.introduction().settled().await;
    respond(fetched.map(|section| {
        section.map(|s| views::introduction(&state.renderer, &s))
    }))
}

/// GET /api/board-members
pub async fn board_members(State(state): State<AppState>) -> Result<Response, ApiError> {
    let fetched = state.loaders.board_members().settled().await;
    respond(fetched.map(|members| {
        members
            .iter()
            .map(|m| views::board_member(&state.renderer, m))
            .collect::<Vec<_>>()
    }))
}

/// GET /api/staff
pub async fn staff(State(state): State<AppState>) -> Result<Response, ApiError> {
    let fetched = state.loaders.staff_members().settled().await;
    respond(fetched.map(|members| {
        members
            .iter()
            .map(|m| views::staff_member(&state.renderer, m))
            .collect::<Vec<_>>()
    }))
}

/// GET /api/announcements
pub async fn announcements(State(state): State<AppState>) -> Result<Response, ApiError> {
    let fetched = state.loaders.announcements().settled().await;
    respond(fetched.map(|items| {
        items
            .iter()
            .map(|a| views::announcement(&state.renderer, a))
            .collect::<Vec<_>>()
    }))
}

/// GET /api/news/{slug}
pub async fn news_article(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let fetched = state.loaders.news_article(&slug).settled().await;
    if matches!(fetched.data, Some(None)) {
        return Err(ApiError::NotFound(format!("no news article with slug '{slug}'")));
    }
    respond(fetched.map(|item| {
        item.map(|n| views::news_article(&state.renderer, &n))
    }))
}

/// Serialize a settled fetch state.
///
/// Error states answer 503 with the state body (generic message plus any
/// previous data) and are never cached downstream.
fn respond<T: Serialize>(fetched: FetchState<T>) -> Result<Response, ApiError> {
    let body = serde_json::to_string(&fetched)?;
    if fetched.error.is_some() || fetched.loading {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        return Ok((StatusCode::SERVICE_UNAVAILABLE, headers, body).into_response());
    }
    Ok(build_response(body))
}

/// Build a 200 JSON response with caching and content-type headers.
fn build_response(body: String) -> Response {
    let mut headers = HeaderMap::new();

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    // ETag (xxHash of body)
    let hash = xxhash_rust::xxh3::xxh3_64(body.as_bytes());
    let etag = format!("\"{}\"", hex_fmt::HexFmt(&hash.to_be_bytes()));
    if let Ok(val) = HeaderValue::from_str(&etag) {
        headers.insert(header::ETAG, val);
    }

    (StatusCode::OK, headers, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStatus;

    #[test]
    fn etag_is_stable_for_identical_bodies() {
        let a = build_response("{\"data\":1}".to_string());
        let b = build_response("{\"data\":1}".to_string());
        let c = build_response("{\"data\":2}".to_string());
        assert_eq!(a.headers()[header::ETAG], b.headers()[header::ETAG]);
        assert_ne!(a.headers()[header::ETAG], c.headers()[header::ETAG]);
        assert_eq!(a.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    }

    #[test]
    fn error_state_is_unavailable_and_uncached() {
        let response = respond(FetchState::<i32>::failed("Failed to load content", None)).unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert!(response.headers().get(header::ETAG).is_none());
    }

    #[test]
    fn ready_state_is_ok() {
        let response = respond(FetchState::ready(1, Some(CacheStatus::Miss))).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], CACHE_CONTROL);
    }
}
