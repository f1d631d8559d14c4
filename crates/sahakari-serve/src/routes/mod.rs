//! Route definitions for the content service.
//!
//! ## Routes
//!
//! - `GET /health` - Health check (JSON)
//! - `GET /api/homepage` - Settings, introduction and latest news
//! - `GET /api/introduction` - Introduction section
//! - `GET /api/board-members` - Board of directors
//! - `GET /api/staff` - Staff members
//! - `GET /api/announcements` - Active announcements
//! - `GET /api/news/{slug}` - Single news article
//! - `POST /api/contact` - Contact form submission

mod contact;
mod content;
mod health;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

/// Build the complete content service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/homepage", get(content::homepage))
        .route("/api/introduction", get(content::introduction))
        .route("/api/board-members", get(content::board_members))
        .route("/api/staff", get(content::staff))
        .route("/api/announcements", get(content::announcements))
        .route("/api/news/{slug}", get(content::news_article))
        .route(
            "/api/contact",
            post(contact::submit).fallback(contact::method_not_allowed),
        )
        .with_state(state)
}
