//! Database repository for CRUD operations.
//!
//! Uses prepared statements and transactions for data integrity. Each content
//! write bumps the site revision so clients can detect change.

mod blogs;
mod courses;
mod events;
mod jobs;
mod members;
mod messages;
mod registrations;

pub use registrations::NewRegistration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use super::{from_db_time, to_db_time, SCHEMA_VERSION};
use crate::errors::AppError;
use crate::models::{DashboardSummary, MemberCounts, RevisionInfo};

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("revision_id")?)
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.try_get("revision_id")?,
            generated_at: row.try_get("generated_at")?,
        })
    }

    /// Increment the revision ID and return the new value.
    pub async fn increment_revision(&self) -> Result<i64, AppError> {
        let now = to_db_time(Utc::now());
        let row = sqlx::query(
            "UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1 RETURNING revision_id",
        )
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("revision_id")?)
    }

    /// Headline counts for the admin dashboard.
    pub async fn dashboard_summary(&self, now: DateTime<Utc>) -> Result<DashboardSummary, AppError> {
        let now_str = to_db_time(now);
        let meta = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;

        let counts = sqlx::query(
            r#"SELECT
                (SELECT COUNT(*) FROM blogs WHERE published = 1) AS published_blogs,
                (SELECT COUNT(*) FROM blogs WHERE published = 0) AS draft_blogs,
                (SELECT COUNT(*) FROM courses WHERE published = 1) AS published_courses,
                (SELECT COUNT(*) FROM jobs WHERE expires_at IS NULL OR expires_at > ?1) AS open_jobs,
                (SELECT COUNT(*) FROM events WHERE starts_at > ?1) AS upcoming_events,
                (SELECT COUNT(*) FROM registrations r JOIN events e ON e.id = r.event_id
                    WHERE r.status != 'cancelled' AND e.starts_at > ?1) AS live_registrations,
                (SELECT COUNT(*) FROM chat_messages) AS chat_messages,
                (SELECT COUNT(*) FROM members WHERE status = 'pending_payment') AS pending_members,
                (SELECT COUNT(*) FROM members WHERE status = 'active'
                    AND (membership_expires_at IS NULL OR membership_expires_at > ?1)) AS active_members,
                (SELECT COUNT(*) FROM members WHERE status = 'expired'
                    OR (status = 'active' AND membership_expires_at <= ?1)) AS expired_members,
                (SELECT COUNT(*) FROM members WHERE status = 'cancelled') AS cancelled_members"#,
        )
        .bind(&now_str)
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardSummary {
            schema_version: SCHEMA_VERSION,
            revision_id: meta.try_get("revision_id")?,
            generated_at: meta.try_get("generated_at")?,
            published_blogs: counts.try_get("published_blogs")?,
            draft_blogs: counts.try_get("draft_blogs")?,
            published_courses: counts.try_get("published_courses")?,
            open_jobs: counts.try_get("open_jobs")?,
            upcoming_events: counts.try_get("upcoming_events")?,
            live_registrations: counts.try_get("live_registrations")?,
            chat_messages: counts.try_get("chat_messages")?,
            members: MemberCounts {
                pending_payment: counts.try_get("pending_members")?,
                active: counts.try_get("active_members")?,
                expired: counts.try_get("expired_members")?,
                cancelled: counts.try_get("cancelled_members")?,
            },
        })
    }

    /// Record that a payment intent has been applied.
    ///
    /// Returns false when the intent was already recorded, which makes the
    /// confirm endpoints and the webhook safe to race each other.
    async fn claim_payment(
        tx: &mut Transaction<'_, Sqlite>,
        payment_intent_id: &str,
        kind: &str,
        target_id: &str,
        now: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO processed_payments (payment_intent_id, kind, target_id, applied_at) VALUES (?, ?, ?, ?) ON CONFLICT(payment_intent_id) DO NOTHING",
        )
        .bind(payment_intent_id)
        .bind(kind)
        .bind(target_id)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Increment the revision inside an open transaction.
    async fn bump_revision_tx(
        tx: &mut Transaction<'_, Sqlite>,
        now: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(now)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

// Helper functions for row conversion

fn time_col(row: &SqliteRow, col: &str) -> Result<DateTime<Utc>, AppError> {
    let raw: String = row.try_get(col)?;
    from_db_time(&raw)
}

fn opt_time_col(row: &SqliteRow, col: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    let raw: Option<String> = row.try_get(col)?;
    raw.as_deref().map(from_db_time).transpose()
}

fn bool_col(row: &SqliteRow, col: &str) -> Result<bool, AppError> {
    let raw: i64 = row.try_get(col)?;
    Ok(raw != 0)
}

fn enum_col<T>(row: &SqliteRow, col: &str, parse: fn(&str) -> Option<T>) -> Result<T, AppError> {
    let raw: String = row.try_get(col)?;
    parse(&raw).ok_or_else(|| AppError::Database(format!("Unknown {} value '{}'", col, raw)))
}

/// Optimistic concurrency check against the stored version.
fn check_version(expected: Option<i64>, current: i64) -> Result<(), AppError> {
    match expected {
        Some(expected) if expected != current => Err(AppError::version_mismatch(expected, current)),
        _ => Ok(()),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// A conditional UPDATE matched no row: either it vanished or its version moved.
fn concurrent_modification(current_version: Option<i64>) -> AppError {
    AppError::Conflict {
        message: "Concurrent modification detected".to_string(),
        current_version: current_version.unwrap_or(0),
    }
}
