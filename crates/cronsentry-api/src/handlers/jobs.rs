//! Job management handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use cronsentry_core::{JobPatch, NewJob};
use cronsentry_protocols::{Job, JobEvent, Notification};

use crate::error::ApiError;
use crate::extract::Owner;
use crate::state::AppState;

const DEFAULT_EVENT_LIMIT: usize = 50;
const MAX_EVENT_LIMIT: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

impl EventsQuery {
    fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_EVENT_LIMIT)
            .clamp(1, MAX_EVENT_LIMIT)
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// POST /api/jobs
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    payload: Result<Json<NewJob>, JsonRejection>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let job = state.jobs.create(&owner, body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> Result<Json<Vec<Job>>, ApiError> {
    Ok(Json(state.jobs.list(&owner).await?))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.jobs.get(&owner, &id).await?))
}

/// PUT /api/jobs/{id}
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    payload: Result<Json<JobPatch>, JsonRejection>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.jobs.update(&owner, &id, body(payload)?).await?))
}

/// DELETE /api/jobs/{id}
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.jobs.delete(&owner, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/jobs/{id}/pause
pub async fn pause_job(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.jobs.pause(&owner, &id).await?))
}

/// POST /api/jobs/{id}/resume
pub async fn resume_job(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.jobs.resume(&owner, &id).await?))
}

/// GET /api/jobs/{id}/events?limit=N
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<JobEvent>>, ApiError> {
    Ok(Json(state.jobs.events(&owner, &id, query.limit()).await?))
}

/// GET /api/jobs/{id}/notifications
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Path(id): Path<String>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(state.jobs.notifications(&owner, &id).await?))
}
