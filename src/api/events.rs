//! Event API endpoints, including price quotes and the attendee report.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use super::{error, refresh_search, success, written, ApiResult};
use crate::checkout;
use crate::errors::AppError;
use crate::models::{AttendeeReport, CreateEventRequest, Event, RegistrationTotals, UpdateEventRequest};
use crate::pricing::PriceQuote;
use crate::AppState;

/// Query parameters for the public event list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListQuery {
    #[serde(default)]
    pub include_past: bool,
}

/// Who is asking for a quote.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteQuery {
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// GET /api/events - Upcoming events by start time.
pub async fn list_public_events(
    State(state): State<AppState>,
    Query(params): Query<EventListQuery>,
) -> ApiResult<Vec<Event>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let from = (!params.include_past).then(Utc::now);
    match state.repo.list_events(from).await {
        Ok(events) => success(events, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/events/:id (also /api/admin/events/:id)
pub async fn get_event(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Event> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_event(&id).await {
        Ok(Some(event)) => success(event, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Event {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/events/:id/quote - The price a registrant would pay right now.
pub async fn quote_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<QuoteQuery>,
) -> ApiResult<PriceQuote> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match checkout::quote(
        &state,
        &id,
        params.member_id.as_deref(),
        params.email.as_deref(),
        Utc::now(),
    )
    .await
    {
        Ok(quote) => success(quote, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/admin/events - Every event, past ones included.
pub async fn list_events(State(state): State<AppState>) -> ApiResult<Vec<Event>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_events(None).await {
        Ok(events) => success(events, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/admin/events
pub async fn create_event(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> ApiResult<Event> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = state.repo.create_event(&request, Utc::now()).await;
    if result.is_ok() {
        refresh_search(&state).await;
    }
    written(&state, result, revision_id).await
}

/// PUT /api/admin/events/:id
pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateEventRequest>,
) -> ApiResult<Event> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = state.repo.update_event(&id, &request, Utc::now()).await;
    if result.is_ok() {
        refresh_search(&state).await;
    }
    written(&state, result, revision_id).await
}

/// DELETE /api/admin/events/:id - Removes the event and its registrations.
pub async fn delete_event(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = state.repo.delete_event(&id).await;
    if result.is_ok() {
        refresh_search(&state).await;
    }
    written(&state, result, revision_id).await
}

/// GET /api/admin/events/:id/registrations - Attendee list with totals.
pub async fn event_registrations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<AttendeeReport> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let event = match state.repo.get_event(&id).await {
        Ok(Some(event)) => event,
        Ok(None) => {
            return error(
                AppError::NotFound(format!("Event {} not found", id)),
                revision_id,
            )
        }
        Err(e) => return error(e, revision_id),
    };

    match state.repo.list_registrations(&id).await {
        Ok(registrations) => {
            let totals = RegistrationTotals::tally(&registrations);
            success(
                AttendeeReport {
                    event,
                    registrations,
                    totals,
                },
                revision_id,
            )
        }
        Err(e) => error(e, revision_id),
    }
}
