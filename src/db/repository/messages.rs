//! Chat forum persistence.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{time_col, Repository};
use crate::db::to_db_time;
use crate::errors::AppError;
use crate::models::ChatMessage;

const MESSAGE_COLUMNS: &str = "m.id, m.member_id, m.author_name, m.content, m.parent_id, m.created_at, (SELECT COUNT(*) FROM chat_messages c WHERE c.parent_id = m.id) AS comment_count";

impl Repository {
    /// Store a post or comment. The author name is copied so deleted members'
    /// names don't need a join.
    pub async fn insert_message(
        &self,
        member_id: &str,
        author_name: &str,
        content: &str,
        parent_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage, AppError> {
        let message = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            member_id: member_id.to_string(),
            author_name: author_name.to_string(),
            content: content.to_string(),
            parent_id: parent_id.map(str::to_string),
            created_at: now,
            comment_count: 0,
        };

        sqlx::query(
            "INSERT INTO chat_messages (id, member_id, author_name, content, parent_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id)
        .bind(&message.member_id)
        .bind(&message.author_name)
        .bind(&message.content)
        .bind(&message.parent_id)
        .bind(to_db_time(now))
        .execute(&self.pool)
        .await?;

        Ok(message)
    }

    pub async fn get_message(&self, id: &str) -> Result<Option<ChatMessage>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages m WHERE m.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(message_from_row).transpose()
    }

    /// Top-level posts, newest first, strictly older than the `before` key.
    ///
    /// Fetches up to `fetch` rows; callers ask for one more than a page to
    /// learn whether another page exists.
    pub async fn list_top_level_messages(
        &self,
        before: Option<(DateTime<Utc>, &str)>,
        fetch: i64,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let rows = match before {
            Some((created_at, id)) => {
                sqlx::query(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM chat_messages m WHERE m.parent_id IS NULL AND (m.created_at < ?1 OR (m.created_at = ?1 AND m.id < ?2)) ORDER BY m.created_at DESC, m.id DESC LIMIT ?3"
                ))
                .bind(to_db_time(created_at))
                .bind(id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM chat_messages m WHERE m.parent_id IS NULL ORDER BY m.created_at DESC, m.id DESC LIMIT ?"
                ))
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(message_from_row).collect()
    }

    /// Comments on a post in conversation order, strictly after the `after` key.
    pub async fn list_comments(
        &self,
        parent_id: &str,
        after: Option<(DateTime<Utc>, &str)>,
        fetch: i64,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let rows = match after {
            Some((created_at, id)) => {
                sqlx::query(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM chat_messages m WHERE m.parent_id = ?1 AND (m.created_at > ?2 OR (m.created_at = ?2 AND m.id > ?3)) ORDER BY m.created_at, m.id LIMIT ?4"
                ))
                .bind(parent_id)
                .bind(to_db_time(created_at))
                .bind(id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {MESSAGE_COLUMNS} FROM chat_messages m WHERE m.parent_id = ? ORDER BY m.created_at, m.id LIMIT ?"
                ))
                .bind(parent_id)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(message_from_row).collect()
    }

    /// Delete a message and, through the foreign key, its comments.
    pub async fn delete_message(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Message {} not found", id)));
        }
        Ok(())
    }
}

fn message_from_row(row: &SqliteRow) -> Result<ChatMessage, AppError> {
    Ok(ChatMessage {
        id: row.try_get("id")?,
        member_id: row.try_get("member_id")?,
        author_name: row.try_get("author_name")?,
        content: row.try_get("content")?,
        parent_id: row.try_get("parent_id")?,
        created_at: time_col(row, "created_at")?,
        comment_count: row.try_get("comment_count")?,
    })
}
