//! Chat forum message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest message body accepted, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// A forum post, or a comment on one when `parent_id` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub member_id: String,
    pub author_name: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Number of comments; always 0 for comments themselves
    #[serde(default)]
    pub comment_count: i64,
}

/// Request body for posting a message or comment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMessageRequest {
    pub member_id: String,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// One page of a keyset-paginated listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}
