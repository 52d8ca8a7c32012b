//! Check-in and health handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use cronsentry_protocols::JobStatus;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub job_id: String,
    pub job_status: JobStatus,
    pub recovered: bool,
    pub next_expect: DateTime<Utc>,
}

/// GET|POST /api/ping/{id}
///
/// Unauthenticated: the job ID is the capability.
pub async fn ping(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PingResponse>, ApiError> {
    let outcome = state.ping.handle(&id).await?;
    Ok(Json(PingResponse {
        status: "ok",
        recovered: outcome.recovered(),
        job_id: outcome.job_id,
        job_status: outcome.status,
        next_expect: outcome.next_expect,
    }))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "healthy", "store": state.store.id() })),
        ),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unhealthy", "error": e.to_string() })),
            )
        }
    }
}
