//! CEU course API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use super::{error, refresh_search, required, required_if_set, success, written, ApiResult};
use crate::errors::AppError;
use crate::models::{Course, CreateCourseRequest, UpdateCourseRequest};
use crate::AppState;

fn validate_numbers(ceu_credits: Option<f64>, price_cents: Option<i64>) -> Result<(), AppError> {
    if ceu_credits.is_some_and(|c| !(c.is_finite() && c > 0.0)) {
        return Err(AppError::Validation(
            "ceuCredits must be greater than zero".to_string(),
        ));
    }
    if price_cents.is_some_and(|p| p < 0) {
        return Err(AppError::Validation(
            "priceCents must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/courses - Published courses by start date.
pub async fn list_published_courses(State(state): State<AppState>) -> ApiResult<Vec<Course>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_courses(true).await {
        Ok(courses) => success(courses, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/courses/:id - A published course.
pub async fn get_published_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Course> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_course(&id).await {
        Ok(Some(course)) if course.published => success(course, revision_id),
        Ok(_) => error(
            AppError::NotFound(format!("Course {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/admin/courses
pub async fn list_courses(State(state): State<AppState>) -> ApiResult<Vec<Course>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_courses(false).await {
        Ok(courses) => success(courses, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/admin/courses/:id
pub async fn get_course(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Course> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_course(&id).await {
        Ok(Some(course)) => success(course, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Course {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/admin/courses
pub async fn create_course(
    State(state): State<AppState>,
    Json(request): Json<CreateCourseRequest>,
) -> ApiResult<Course> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = required(&request.title, "Title")
        .and_then(|_| required(&request.description, "Description"))
        .and_then(|_| required(&request.instructor, "Instructor"))
        .and_then(|_| validate_numbers(Some(request.ceu_credits), Some(request.price_cents)))
    {
        return error(e, revision_id);
    }

    let result = state.repo.create_course(&request, Utc::now()).await;
    if result.is_ok() {
        refresh_search(&state).await;
    }
    written(&state, result, revision_id).await
}

/// PUT /api/admin/courses/:id
pub async fn update_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateCourseRequest>,
) -> ApiResult<Course> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = required_if_set(&request.title, "Title")
        .and_then(|_| required_if_set(&request.description, "Description"))
        .and_then(|_| required_if_set(&request.instructor, "Instructor"))
        .and_then(|_| validate_numbers(request.ceu_credits, request.price_cents))
    {
        return error(e, revision_id);
    }

    let result = state.repo.update_course(&id, &request, Utc::now()).await;
    if result.is_ok() {
        refresh_search(&state).await;
    }
    written(&state, result, revision_id).await
}

/// DELETE /api/admin/courses/:id
pub async fn delete_course(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = state.repo.delete_course(&id).await;
    if result.is_ok() {
        refresh_search(&state).await;
    }
    written(&state, result, revision_id).await
}
