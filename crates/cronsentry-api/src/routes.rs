//! HTTP route definitions.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::jobs;
use crate::handlers::ping;
use crate::state::AppState;

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;

/// Build the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(ping::health))
        .route("/api/ping/{id}", get(ping::ping).post(ping::ping))
        .route("/api/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route(
            "/api/jobs/{id}",
            get(jobs::get_job).put(jobs::update_job).delete(jobs::delete_job),
        )
        .route("/api/jobs/{id}/pause", post(jobs::pause_job))
        .route("/api/jobs/{id}/resume", post(jobs::resume_job))
        .route("/api/jobs/{id}/events", get(jobs::list_events))
        .route("/api/jobs/{id}/notifications", get(jobs::list_notifications))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
