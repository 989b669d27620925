//! Event registrations: seat holds, payment confirmation and check-in.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{enum_col, is_unique_violation, opt_time_col, time_col, Repository};
use crate::db::to_db_time;
use crate::errors::AppError;
use crate::models::{Registration, RegistrationStatus};
use crate::pricing::PricingTier;

const REGISTRATION_COLUMNS: &str = "id, event_id, member_id, name, email, pricing_tier, price_cents, status, payment_intent_id, hold_expires_at, created_at, updated_at";

/// SQL predicate that is true while the event bound to `?1` still has a free seat.
const SEAT_AVAILABLE: &str = "((SELECT capacity FROM events WHERE id = ?1) IS NULL OR (SELECT COUNT(*) FROM registrations WHERE event_id = ?1 AND status != 'cancelled') < (SELECT capacity FROM events WHERE id = ?1))";

/// A registration about to be inserted, with its price already resolved.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub event_id: String,
    pub member_id: Option<String>,
    pub name: String,
    pub email: String,
    pub pricing_tier: PricingTier,
    pub price_cents: i64,
    pub status: RegistrationStatus,
    pub hold_expires_at: Option<DateTime<Utc>>,
}

impl Repository {
    /// Take a seat for a new registration.
    ///
    /// The capacity check and the insert are one statement, so two requests
    /// racing for the last seat cannot both win.
    pub async fn create_registration(
        &self,
        new: &NewRegistration,
        now: DateTime<Utc>,
    ) -> Result<Registration, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let email = new.email.trim().to_string();
        let now_str = to_db_time(now);

        let result = sqlx::query(&format!(
            "INSERT INTO registrations (id, event_id, member_id, name, email, pricing_tier, price_cents, status, payment_intent_id, hold_expires_at, created_at, updated_at) SELECT ?2, ?1, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9, ?10, ?10 WHERE {SEAT_AVAILABLE}"
        ))
        .bind(&new.event_id)
        .bind(&id)
        .bind(&new.member_id)
        .bind(&new.name)
        .bind(&email)
        .bind(new.pricing_tier.label())
        .bind(new.price_cents)
        .bind(new.status.as_str())
        .bind(new.hold_expires_at.map(to_db_time))
        .bind(&now_str)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::AlreadyExists(format!("{} is already registered for this event", email))
            } else {
                e.into()
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::CapacityExceeded("This event is full".to_string()));
        }

        self.increment_revision().await?;

        Ok(Registration {
            id,
            event_id: new.event_id.clone(),
            member_id: new.member_id.clone(),
            name: new.name.clone(),
            email,
            pricing_tier: new.pricing_tier,
            price_cents: new.price_cents,
            status: new.status,
            payment_intent_id: None,
            hold_expires_at: new.hold_expires_at,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_registration(&self, id: &str) -> Result<Option<Registration>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(registration_from_row).transpose()
    }

    pub async fn find_registration_by_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<Registration>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE payment_intent_id = ?"
        ))
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(registration_from_row).transpose()
    }

    /// All registrations for an event in signup order, cancelled ones included.
    pub async fn list_registrations(&self, event_id: &str) -> Result<Vec<Registration>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE event_id = ? ORDER BY created_at, id"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(registration_from_row).collect()
    }

    /// Attach the payment a pending registration must complete.
    pub async fn set_registration_intent(
        &self,
        id: &str,
        payment_intent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Registration, AppError> {
        let row = sqlx::query(&format!(
            "UPDATE registrations SET payment_intent_id = ?, updated_at = ? WHERE id = ? AND status = 'pending_payment' RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(payment_intent_id)
        .bind(to_db_time(now))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => registration_from_row(&row),
            None => Err(self.transition_error(id, RegistrationStatus::PendingPayment).await),
        }
    }

    /// Move a registration to `to` if it is currently in one of `from`.
    pub async fn transition_registration(
        &self,
        id: &str,
        from: &[RegistrationStatus],
        to: RegistrationStatus,
        now: DateTime<Utc>,
    ) -> Result<Registration, AppError> {
        let placeholders = vec!["?"; from.len()].join(", ");
        let sql = format!(
            "UPDATE registrations SET status = ?, hold_expires_at = CASE WHEN ? = 'pending_payment' THEN hold_expires_at ELSE NULL END, updated_at = ? WHERE id = ? AND status IN ({placeholders}) RETURNING {REGISTRATION_COLUMNS}"
        );
        let mut query = sqlx::query(&sql)
            .bind(to.as_str())
            .bind(to.as_str())
            .bind(to_db_time(now))
            .bind(id);
        for status in from {
            query = query.bind(status.as_str());
        }

        match query.fetch_optional(&self.pool).await? {
            Some(row) => {
                self.increment_revision().await?;
                registration_from_row(&row)
            }
            None => Err(self.transition_error(id, to).await),
        }
    }

    /// Apply a succeeded registration payment.
    ///
    /// A pending registration is confirmed. One whose hold already lapsed is
    /// reinstated if a seat is still free. Applying the same intent twice
    /// returns the registration unchanged with a false flag.
    pub async fn confirm_registration_payment(
        &self,
        id: &str,
        payment_intent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Registration, bool), AppError> {
        let now_str = to_db_time(now);
        let mut tx = self.pool.begin().await?;

        let claimed =
            Self::claim_payment(&mut tx, payment_intent_id, "registration", id, &now_str).await?;

        let row = sqlx::query(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(existing) = row.as_ref().map(registration_from_row).transpose()? else {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!("Registration {} not found", id)));
        };

        if existing.payment_intent_id.as_deref() != Some(payment_intent_id) {
            tx.rollback().await?;
            return Err(AppError::Validation(
                "Payment does not belong to this registration".to_string(),
            ));
        }

        if !claimed {
            tx.rollback().await?;
            tracing::debug!(registration_id = %id, payment_intent_id, "Registration payment already applied");
            return Ok((existing, false));
        }

        let newly_confirmed = !matches!(
            existing.status,
            RegistrationStatus::Confirmed | RegistrationStatus::Attended
        );
        let confirmed = match existing.status {
            RegistrationStatus::PendingPayment => {
                let row = sqlx::query(&format!(
                    "UPDATE registrations SET status = 'confirmed', hold_expires_at = NULL, updated_at = ? WHERE id = ? RETURNING {REGISTRATION_COLUMNS}"
                ))
                .bind(&now_str)
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
                registration_from_row(&row)?
            }
            RegistrationStatus::Cancelled => {
                let row = sqlx::query(&format!(
                    "UPDATE registrations SET status = 'confirmed', hold_expires_at = NULL, updated_at = ?2 WHERE id = ?3 AND {SEAT_AVAILABLE} RETURNING {REGISTRATION_COLUMNS}"
                ))
                .bind(&existing.event_id)
                .bind(&now_str)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await;

                match row {
                    Ok(Some(row)) => {
                        tracing::info!(registration_id = %id, "Lapsed registration reinstated after payment");
                        registration_from_row(&row)?
                    }
                    Ok(None) => {
                        tx.rollback().await?;
                        tracing::warn!(
                            registration_id = %id,
                            payment_intent_id,
                            "Payment arrived after the hold lapsed and the event filled; refund required"
                        );
                        return Err(AppError::InvalidState(
                            "The registration hold expired and the event is now full".to_string(),
                        ));
                    }
                    Err(e) if is_unique_violation(&e) => {
                        tx.rollback().await?;
                        tracing::warn!(
                            registration_id = %id,
                            payment_intent_id,
                            "Payment arrived for a lapsed registration superseded by a newer one; refund required"
                        );
                        return Err(AppError::InvalidState(
                            "The registration hold expired and was replaced".to_string(),
                        ));
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            RegistrationStatus::Confirmed | RegistrationStatus::Attended => existing,
        };

        Self::bump_revision_tx(&mut tx, &now_str).await?;
        tx.commit().await?;

        tracing::info!(
            registration_id = %confirmed.id,
            event_id = %confirmed.event_id,
            payment_intent_id,
            "Registration confirmed"
        );
        Ok((confirmed, newly_confirmed))
    }

    /// Release seats whose payment hold ran out. Returns the released registrations.
    pub async fn expire_stale_holds(&self, now: DateTime<Utc>) -> Result<Vec<Registration>, AppError> {
        let rows = sqlx::query(&format!(
            "UPDATE registrations SET status = 'cancelled', updated_at = ?1 WHERE status = 'pending_payment' AND hold_expires_at IS NOT NULL AND hold_expires_at <= ?1 RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(to_db_time(now))
        .fetch_all(&self.pool)
        .await?;

        if !rows.is_empty() {
            self.increment_revision().await?;
        }
        rows.iter().map(registration_from_row).collect()
    }

    async fn transition_error(&self, id: &str, to: RegistrationStatus) -> AppError {
        match self.get_registration(id).await {
            Ok(Some(current)) => AppError::InvalidState(format!(
                "Registration is {} and cannot become {}",
                current.status.as_str(),
                to.as_str()
            )),
            Ok(None) => AppError::NotFound(format!("Registration {} not found", id)),
            Err(e) => e,
        }
    }
}

fn registration_from_row(row: &SqliteRow) -> Result<Registration, AppError> {
    Ok(Registration {
        id: row.try_get("id")?,
        event_id: row.try_get("event_id")?,
        member_id: row.try_get("member_id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        pricing_tier: enum_col(row, "pricing_tier", PricingTier::parse)?,
        price_cents: row.try_get("price_cents")?,
        status: enum_col(row, "status", RegistrationStatus::parse)?,
        payment_intent_id: row.try_get("payment_intent_id")?,
        hold_expires_at: opt_time_col(row, "hold_expires_at")?,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
    })
}
