//! Event registration endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use super::{written, ApiResult};
use crate::checkout;
use crate::models::{
    CancelRegistrationRequest, CreateRegistrationRequest, Registration, RegistrationCheckout,
    RegistrationStatus,
};
use crate::AppState;

/// POST /api/events/:id/registrations - Take a seat.
pub async fn register_for_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(request): Json<CreateRegistrationRequest>,
) -> ApiResult<RegistrationCheckout> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = checkout::register(
        &state,
        &event_id,
        &request.name,
        &request.email,
        request.member_id.as_deref(),
        Utc::now(),
    )
    .await;
    written(&state, result, revision_id).await
}

/// POST /api/registrations/:id/confirm - Confirm after the browser paid.
pub async fn confirm_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Registration> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = checkout::confirm_registration(&state, &id, Utc::now()).await;
    written(&state, result, revision_id).await
}

/// POST /api/registrations/:id/cancel - Self-service cancellation by email.
pub async fn cancel_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CancelRegistrationRequest>,
) -> ApiResult<Registration> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result =
        checkout::cancel_registration(&state, &id, Some(&request.email), Utc::now()).await;
    written(&state, result, revision_id).await
}

/// POST /api/admin/registrations/:id/cancel
pub async fn admin_cancel_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Registration> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = checkout::cancel_registration(&state, &id, None, Utc::now()).await;
    written(&state, result, revision_id).await
}

/// POST /api/admin/registrations/:id/check-in - Mark a confirmed registrant as attended.
pub async fn check_in_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Registration> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = state
        .repo
        .transition_registration(
            &id,
            &[RegistrationStatus::Confirmed],
            RegistrationStatus::Attended,
            Utc::now(),
        )
        .await;
    written(&state, result, revision_id).await
}
