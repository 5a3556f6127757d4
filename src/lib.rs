//! Islands of Bharath - backend for the island tourism site
//!
//! Serves the static site, aggregates island news from RSS feeds, mails
//! thank-you notes for visitor forms, proxies the travel chatbot and
//! manages the analytics dashboard process.

pub mod chat;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetcher;
pub mod forms;
pub mod mailer;
pub mod news;
pub mod routes;

use std::path::Path;
use std::sync::Arc;

use axum::{
    handler::HandlerWithoutStateExt,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::routes::AppState;

/// All API routes, with `static_dir` served for everything else. Every
/// response allows cross-origin requests.
pub fn build_router<P: AsRef<Path>>(state: Arc<AppState>, static_dir: P) -> Router {
    let static_files =
        ServeDir::new(static_dir.as_ref()).not_found_service(routes::not_found.into_service());

    Router::new()
        .route("/", get(routes::root))
        .route("/api/island-news", get(routes::island_news))
        .route("/api/enquiry", post(routes::enquiry))
        .route("/api/review", post(routes::review))
        .route("/api/feedback", post(routes::feedback))
        .route("/chat", post(routes::chat))
        .route("/dashboard", get(routes::dashboard))
        .route("/dashboard-embed", get(routes::dashboard_embed))
        .route("/dashboard/health", get(routes::dashboard_health))
        .route("/health", get(routes::health))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
