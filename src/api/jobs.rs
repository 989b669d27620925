//! Job board API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use super::{error, refresh_search, required, required_if_set, success, written, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateJobRequest, Job, UpdateJobRequest};
use crate::AppState;

/// GET /api/jobs - Unexpired postings, newest first.
pub async fn list_open_jobs(State(state): State<AppState>) -> ApiResult<Vec<Job>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_jobs(Some(Utc::now())).await {
        Ok(jobs) => success(jobs, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/jobs/:id - An unexpired posting.
pub async fn get_open_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Job> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_job(&id).await {
        Ok(Some(job)) if job.is_open_at(Utc::now()) => success(job, revision_id),
        Ok(_) => error(
            AppError::NotFound(format!("Job {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/admin/jobs - Every posting including expired ones.
pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Vec<Job>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_jobs(None).await {
        Ok(jobs) => success(jobs, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/admin/jobs/:id
pub async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Job> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_job(&id).await {
        Ok(Some(job)) => success(job, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Job {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/admin/jobs
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<Job> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = required(&request.title, "Title")
        .and_then(|_| required(&request.organization, "Organization"))
        .and_then(|_| required(&request.location, "Location"))
        .and_then(|_| required(&request.description, "Description"))
    {
        return error(e, revision_id);
    }

    let result = state.repo.create_job(&request, Utc::now()).await;
    if result.is_ok() {
        refresh_search(&state).await;
    }
    written(&state, result, revision_id).await
}

/// PUT /api/admin/jobs/:id
pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateJobRequest>,
) -> ApiResult<Job> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = required_if_set(&request.title, "Title")
        .and_then(|_| required_if_set(&request.organization, "Organization"))
        .and_then(|_| required_if_set(&request.location, "Location"))
        .and_then(|_| required_if_set(&request.description, "Description"))
    {
        return error(e, revision_id);
    }

    let result = state.repo.update_job(&id, &request, Utc::now()).await;
    if result.is_ok() {
        refresh_search(&state).await;
    }
    written(&state, result, revision_id).await
}

/// DELETE /api/admin/jobs/:id
pub async fn delete_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = state.repo.delete_job(&id).await;
    if result.is_ok() {
        refresh_search(&state).await;
    }
    written(&state, result, revision_id).await
}
