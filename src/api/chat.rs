//! Chat forum endpoints and the live SSE stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    Json,
};
use chrono::Utc;
use futures::{Stream, StreamExt};
use serde::Deserialize;

use super::{error, success, ApiResult};
use crate::chat::{self, ChatEvent};
use crate::models::{ChatMessage, Page, PostMessageRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// GET /api/chat/messages - Newest-first top-level messages.
pub async fn list_chat_messages(
    State(state): State<AppState>,
    Query(params): Query<PageQuery>,
) -> ApiResult<Page<ChatMessage>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match chat::message_page(&state.repo, params.limit, params.cursor.as_deref()).await {
        Ok(page) => success(page, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/chat/messages/:id/comments - Oldest-first comments on a message.
pub async fn list_chat_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PageQuery>,
) -> ApiResult<Page<ChatMessage>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match chat::comment_page(&state.repo, &id, params.limit, params.cursor.as_deref()).await {
        Ok(page) => success(page, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/chat/messages - Post a message or comment.
pub async fn post_chat_message(
    State(state): State<AppState>,
    Json(request): Json<PostMessageRequest>,
) -> ApiResult<ChatMessage> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match chat::post_message(&state.repo, &state.chat, &request, Utc::now()).await {
        Ok(message) => success(message, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/admin/chat/messages/:id - Remove a message and its comments.
pub async fn delete_chat_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match chat::delete_message(&state.repo, &state.chat, &id).await {
        Ok(()) => success((), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/chat/stream - Server-sent chat events.
pub async fn chat_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let events = state.chat.subscribe();
    tracing::debug!(
        subscribers = state.chat.subscriber_count(),
        "Chat stream opened"
    );

    let stream = events.map(|event: ChatEvent| {
        let sse = SseEvent::default().event(event.name());
        Ok(sse.json_data(&event).unwrap_or_else(|e| {
            tracing::warn!("Failed to encode chat event: {}", e);
            SseEvent::default().event("resync").data("{}")
        }))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
