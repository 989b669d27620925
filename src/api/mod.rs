//! REST API module.
//!
//! Contains all API routes and handlers following the website's fetch contract.
//! Every response is wrapped in the `{success, data|error, revisionId}` envelope.

mod blogs;
mod chat;
mod contact;
mod courses;
mod dashboard;
mod events;
mod jobs;
mod members;
mod registrations;
mod search;
mod webhooks;

pub use blogs::*;
pub use chat::*;
pub use contact::*;
pub use courses::*;
pub use dashboard::*;
pub use events::*;
pub use jobs::*;
pub use members::*;
pub use registrations::*;
pub use search::*;
pub use webhooks::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, crate::errors::AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: crate::errors::AppError, revision_id: i64) -> ApiResult<T> {
    Err(crate::errors::AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Wrap the outcome of a write, reporting the revision it produced.
async fn written<T: Serialize>(
    state: &AppState,
    result: Result<T, crate::errors::AppError>,
    revision_id: i64,
) -> ApiResult<T> {
    match result {
        Ok(data) => {
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(data, new_revision)
        }
        Err(e) => error(e, revision_id),
    }
}

/// Rebuild the search index after a content write. Failure only degrades search.
async fn refresh_search(state: &AppState) {
    if let Err(e) = crate::search::reindex(&state.repo, &state.search, Utc::now()).await {
        tracing::warn!("Failed to refresh search index: {}", e);
    }
}

/// Reject blank required text.
fn required(value: &str, field: &str) -> Result<(), crate::errors::AppError> {
    if value.trim().is_empty() {
        return Err(crate::errors::AppError::Validation(format!(
            "{} is required",
            field
        )));
    }
    Ok(())
}

/// Reject a field an update explicitly blanks.
fn required_if_set(value: &Option<String>, field: &str) -> Result<(), crate::errors::AppError> {
    match value {
        Some(v) => required(v, field),
        None => Ok(()),
    }
}
