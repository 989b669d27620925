//! Event persistence. Seat counts are derived from live registrations.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{bool_col, check_version, concurrent_modification, opt_time_col, time_col, Repository};
use crate::db::to_db_time;
use crate::errors::AppError;
use crate::models::{CreateEventRequest, Event, TierPrice, UpdateEventRequest};

const EVENT_COLUMNS: &str = "e.id, e.title, e.description, e.location, e.starts_at, e.ends_at, e.capacity, e.non_member_price_cents, e.member_price_cents, e.tier_prices, e.ceu_credits, e.registration_open, e.created_at, e.updated_at, e.version, (SELECT COUNT(*) FROM registrations r WHERE r.event_id = e.id AND r.status != 'cancelled') AS registered_count";

impl Repository {
    /// List events by start time. With `from`, events that already started are hidden.
    pub async fn list_events(&self, from: Option<DateTime<Utc>>) -> Result<Vec<Event>, AppError> {
        let rows = match from {
            Some(now) => {
                sqlx::query(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events e WHERE e.starts_at > ? ORDER BY e.starts_at, e.id"
                ))
                .bind(to_db_time(now))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events e ORDER BY e.starts_at, e.id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(event_from_row).collect()
    }

    pub async fn get_event(&self, id: &str) -> Result<Option<Event>, AppError> {
        let row = sqlx::query(&format!("SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(event_from_row).transpose()
    }

    /// Create an event.
    pub async fn create_event(
        &self,
        request: &CreateEventRequest,
        now: DateTime<Utc>,
    ) -> Result<Event, AppError> {
        let event = Event {
            id: uuid::Uuid::new_v4().to_string(),
            title: request.title.clone(),
            description: request.description.clone(),
            location: request.location.clone(),
            starts_at: request.starts_at,
            ends_at: request.ends_at,
            capacity: request.capacity,
            non_member_price_cents: request.non_member_price_cents,
            member_price_cents: request.member_price_cents,
            tier_prices: request.tier_prices.clone(),
            ceu_credits: request.ceu_credits,
            registration_open: request.registration_open,
            created_at: now,
            updated_at: now,
            version: 1,
            registered_count: 0,
            spots_remaining: None,
        }
        .with_registered_count(0);
        event.validate()?;

        sqlx::query(
            "INSERT INTO events (id, title, description, location, starts_at, ends_at, capacity, non_member_price_cents, member_price_cents, tier_prices, ceu_credits, registration_open, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(&event.location)
        .bind(to_db_time(event.starts_at))
        .bind(event.ends_at.map(to_db_time))
        .bind(event.capacity)
        .bind(event.non_member_price_cents)
        .bind(event.member_price_cents)
        .bind(serde_json::to_string(&event.tier_prices)?)
        .bind(event.ceu_credits)
        .bind(event.registration_open as i32)
        .bind(to_db_time(now))
        .bind(to_db_time(now))
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;
        Ok(event)
    }

    /// Update an event with optimistic concurrency control.
    ///
    /// Capacity may not drop below the number of seats already taken.
    pub async fn update_event(
        &self,
        id: &str,
        request: &UpdateEventRequest,
        now: DateTime<Utc>,
    ) -> Result<Event, AppError> {
        let existing = self
            .get_event(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))?;
        check_version(request.expected_version, existing.version)?;

        let capacity = request.capacity.unwrap_or(existing.capacity);
        if let Some(cap) = capacity {
            if cap < existing.registered_count {
                return Err(AppError::Validation(format!(
                    "Capacity {} is below the {} seats already registered",
                    cap, existing.registered_count
                )));
            }
        }

        let updated = Event {
            id: existing.id.clone(),
            title: request.title.clone().unwrap_or(existing.title),
            description: request.description.clone().unwrap_or(existing.description),
            location: request.location.clone().unwrap_or(existing.location),
            starts_at: request.starts_at.unwrap_or(existing.starts_at),
            ends_at: request.ends_at.unwrap_or(existing.ends_at),
            capacity,
            non_member_price_cents: request
                .non_member_price_cents
                .unwrap_or(existing.non_member_price_cents),
            member_price_cents: request
                .member_price_cents
                .unwrap_or(existing.member_price_cents),
            tier_prices: request
                .tier_prices
                .clone()
                .unwrap_or(existing.tier_prices),
            ceu_credits: request.ceu_credits.unwrap_or(existing.ceu_credits),
            registration_open: request
                .registration_open
                .unwrap_or(existing.registration_open),
            created_at: existing.created_at,
            updated_at: now,
            version: existing.version + 1,
            registered_count: 0,
            spots_remaining: None,
        }
        .with_registered_count(existing.registered_count);
        updated.validate()?;

        let result = sqlx::query(
            "UPDATE events SET title = ?, description = ?, location = ?, starts_at = ?, ends_at = ?, capacity = ?, non_member_price_cents = ?, member_price_cents = ?, tier_prices = ?, ceu_credits = ?, registration_open = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(&updated.title)
        .bind(&updated.description)
        .bind(&updated.location)
        .bind(to_db_time(updated.starts_at))
        .bind(updated.ends_at.map(to_db_time))
        .bind(updated.capacity)
        .bind(updated.non_member_price_cents)
        .bind(updated.member_price_cents)
        .bind(serde_json::to_string(&updated.tier_prices)?)
        .bind(updated.ceu_credits)
        .bind(updated.registration_open as i32)
        .bind(to_db_time(now))
        .bind(updated.version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_event(id).await?;
            return Err(concurrent_modification(current.map(|e| e.version)));
        }

        self.increment_revision().await?;
        Ok(updated)
    }

    /// Delete an event together with its registrations.
    pub async fn delete_event(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Event {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }
}

fn event_from_row(row: &SqliteRow) -> Result<Event, AppError> {
    let tier_json: String = row.try_get("tier_prices")?;
    let tier_prices: Vec<TierPrice> = serde_json::from_str(&tier_json)?;
    let registered_count: i64 = row.try_get("registered_count")?;

    Ok(Event {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        location: row.try_get("location")?,
        starts_at: time_col(row, "starts_at")?,
        ends_at: opt_time_col(row, "ends_at")?,
        capacity: row.try_get("capacity")?,
        non_member_price_cents: row.try_get("non_member_price_cents")?,
        member_price_cents: row.try_get("member_price_cents")?,
        tier_prices,
        ceu_credits: row.try_get("ceu_credits")?,
        registration_open: bool_col(row, "registration_open")?,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
        version: row.try_get("version")?,
        registered_count: 0,
        spots_remaining: None,
    }
    .with_registered_count(registered_count))
}
