//! Chat forum: paginated reads, posting rules and the live update hub.
//!
//! Every create or delete is published on a tokio broadcast channel. SSE
//! subscribers that fall behind the channel's buffer skip the missed events
//! and get a single `resync` event instead.

mod cursor;

pub use cursor::Cursor;

use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{ChatMessage, Page, PostMessageRequest, MAX_MESSAGE_CHARS};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Events buffered per subscriber before it is considered lagging.
const HUB_CAPACITY: usize = 256;

/// A change pushed to live subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ChatEvent {
    #[serde(rename = "message.created")]
    MessageCreated(ChatMessage),
    #[serde(rename = "comment.created")]
    CommentCreated(ChatMessage),
    #[serde(rename = "message.deleted", rename_all = "camelCase")]
    MessageDeleted {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parent_id: Option<String>,
    },
    /// The subscriber missed events and should reload the first page.
    #[serde(rename = "resync")]
    Resync { skipped: u64 },
}

impl ChatEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ChatEvent::MessageCreated(_) => "message.created",
            ChatEvent::CommentCreated(_) => "comment.created",
            ChatEvent::MessageDeleted { .. } => "message.deleted",
            ChatEvent::Resync { .. } => "resync",
        }
    }
}

/// In-process fan-out of chat events.
#[derive(Clone)]
pub struct ChatHub {
    sender: broadcast::Sender<ChatEvent>,
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new(HUB_CAPACITY)
    }
}

impl ChatHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to current subscribers. Having none is not an error.
    pub fn publish(&self, event: ChatEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Stream of events from now on, with lag reported as `Resync`.
    pub fn subscribe(&self) -> impl Stream<Item = ChatEvent> + Send + 'static {
        let mut receiver = self.sender.subscribe();
        async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(event) => yield event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Chat subscriber lagged");
                        yield ChatEvent::Resync { skipped };
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}

pub fn page_size(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

/// Newest-first page of top-level messages.
pub async fn message_page(
    repo: &Repository,
    limit: Option<i64>,
    cursor: Option<&str>,
) -> Result<Page<ChatMessage>, AppError> {
    let limit = page_size(limit);
    let cursor = cursor.map(Cursor::decode).transpose()?;
    let rows = repo
        .list_top_level_messages(cursor.as_ref().map(Cursor::key), limit + 1)
        .await?;
    into_page(rows, limit)
}

/// Oldest-first page of comments on a top-level message.
pub async fn comment_page(
    repo: &Repository,
    parent_id: &str,
    limit: Option<i64>,
    cursor: Option<&str>,
) -> Result<Page<ChatMessage>, AppError> {
    let limit = page_size(limit);
    let cursor = cursor.map(Cursor::decode).transpose()?;
    let parent = repo
        .get_message(parent_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Message {} not found", parent_id)))?;
    if parent.parent_id.is_some() {
        return Err(AppError::Validation("Comments do not have comments".to_string()));
    }
    let rows = repo
        .list_comments(parent_id, cursor.as_ref().map(Cursor::key), limit + 1)
        .await?;
    into_page(rows, limit)
}

fn into_page(mut rows: Vec<ChatMessage>, limit: i64) -> Result<Page<ChatMessage>, AppError> {
    let has_more = rows.len() as i64 > limit;
    rows.truncate(limit as usize);
    let next_cursor = match rows.last() {
        Some(last) if has_more => Some(Cursor::after(last).encode()?),
        _ => None,
    };
    Ok(Page {
        items: rows,
        next_cursor,
    })
}

/// Post a message or comment as an active member and announce it.
pub async fn post_message(
    repo: &Repository,
    hub: &ChatHub,
    request: &PostMessageRequest,
    now: DateTime<Utc>,
) -> Result<ChatMessage, AppError> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Message content is required".to_string()));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "Message content exceeds {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let member = repo
        .get_member(&request.member_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {} not found", request.member_id)))?;
    if !member.is_active_at(now) {
        return Err(AppError::InvalidState(
            "Only active members can post in the forum".to_string(),
        ));
    }

    if let Some(parent_id) = request.parent_id.as_deref() {
        let parent = repo
            .get_message(parent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {} not found", parent_id)))?;
        if parent.parent_id.is_some() {
            return Err(AppError::Validation(
                "Comments can only reply to top-level messages".to_string(),
            ));
        }
    }

    let message = repo
        .insert_message(
            &member.id,
            &member.full_name(),
            content,
            request.parent_id.as_deref(),
            now,
        )
        .await?;

    let event = if message.parent_id.is_some() {
        ChatEvent::CommentCreated(message.clone())
    } else {
        ChatEvent::MessageCreated(message.clone())
    };
    let delivered = hub.publish(event);
    tracing::debug!(message_id = %message.id, delivered, "Chat message posted");

    Ok(message)
}

/// Remove a message (and its comments) and announce it.
pub async fn delete_message(repo: &Repository, hub: &ChatHub, id: &str) -> Result<(), AppError> {
    let message = repo
        .get_message(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Message {} not found", id)))?;
    repo.delete_message(id).await?;
    hub.publish(ChatEvent::MessageDeleted {
        id: message.id,
        parent_id: message.parent_id,
    });
    Ok(())
}
