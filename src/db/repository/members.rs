//! Member persistence and membership lifecycle.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{
    check_version, concurrent_modification, enum_col, is_unique_violation, opt_time_col,
    time_col, Repository,
};
use crate::db::to_db_time;
use crate::errors::AppError;
use crate::models::{
    Member, MemberRole, MembershipStatus, SignupRequest, UpdateMemberRequest,
};

const MEMBER_COLUMNS: &str = "id, first_name, last_name, email, role, credential, bacb_certification_number, organization, phone, status, membership_expires_at, last_payment_intent_id, created_at, updated_at, version";

impl Repository {
    /// List all members ordered by name.
    pub async fn list_members(&self) -> Result<Vec<Member>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members ORDER BY last_name, first_name, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(member_from_row).collect()
    }

    pub async fn get_member(&self, id: &str) -> Result<Option<Member>, AppError> {
        let row = sqlx::query(&format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(member_from_row).transpose()
    }

    /// Emails compare case-insensitively (the column is NOCASE).
    pub async fn find_member_by_email(&self, email: &str) -> Result<Option<Member>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE email = ?"
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(member_from_row).transpose()
    }

    /// Create a member awaiting their first dues payment.
    pub async fn create_member(
        &self,
        request: &SignupRequest,
        now: DateTime<Utc>,
    ) -> Result<Member, AppError> {
        let member = Member {
            id: uuid::Uuid::new_v4().to_string(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email: request.email.trim().to_string(),
            role: request.role,
            credential: request.credential.clone(),
            bacb_certification_number: request.bacb_certification_number.clone(),
            organization: request.organization.clone(),
            phone: request.phone.clone(),
            status: MembershipStatus::PendingPayment,
            membership_expires_at: None,
            last_payment_intent_id: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };

        sqlx::query(
            "INSERT INTO members (id, first_name, last_name, email, role, credential, bacb_certification_number, organization, phone, status, membership_expires_at, last_payment_intent_id, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?, 1)",
        )
        .bind(&member.id)
        .bind(&member.first_name)
        .bind(&member.last_name)
        .bind(&member.email)
        .bind(member.role.as_str())
        .bind(&member.credential)
        .bind(&member.bacb_certification_number)
        .bind(&member.organization)
        .bind(&member.phone)
        .bind(member.status.as_str())
        .bind(to_db_time(now))
        .bind(to_db_time(now))
        .execute(&self.pool)
        .await
        .map_err(|e| email_conflict(e, &member.email))?;

        self.increment_revision().await?;
        Ok(member)
    }

    /// Admin update with optimistic concurrency control.
    pub async fn update_member(
        &self,
        id: &str,
        request: &UpdateMemberRequest,
        now: DateTime<Utc>,
    ) -> Result<Member, AppError> {
        let existing = self
            .get_member(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))?;
        check_version(request.expected_version, existing.version)?;

        let updated = Member {
            id: existing.id.clone(),
            first_name: request.first_name.clone().unwrap_or(existing.first_name),
            last_name: request.last_name.clone().unwrap_or(existing.last_name),
            email: request
                .email
                .as_deref()
                .map(|e| e.trim().to_string())
                .unwrap_or(existing.email),
            role: request.role.unwrap_or(existing.role),
            credential: request.credential.clone().unwrap_or(existing.credential),
            bacb_certification_number: request
                .bacb_certification_number
                .clone()
                .unwrap_or(existing.bacb_certification_number),
            organization: request.organization.clone().unwrap_or(existing.organization),
            phone: request.phone.clone().unwrap_or(existing.phone),
            status: request.status.unwrap_or(existing.status),
            membership_expires_at: request
                .membership_expires_at
                .unwrap_or(existing.membership_expires_at),
            last_payment_intent_id: existing.last_payment_intent_id,
            created_at: existing.created_at,
            updated_at: now,
            version: existing.version + 1,
        };

        let result = sqlx::query(
            "UPDATE members SET first_name = ?, last_name = ?, email = ?, role = ?, credential = ?, bacb_certification_number = ?, organization = ?, phone = ?, status = ?, membership_expires_at = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(&updated.first_name)
        .bind(&updated.last_name)
        .bind(&updated.email)
        .bind(updated.role.as_str())
        .bind(&updated.credential)
        .bind(&updated.bacb_certification_number)
        .bind(&updated.organization)
        .bind(&updated.phone)
        .bind(updated.status.as_str())
        .bind(updated.membership_expires_at.map(to_db_time))
        .bind(to_db_time(now))
        .bind(updated.version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await
        .map_err(|e| email_conflict(e, &updated.email))?;

        if result.rows_affected() == 0 {
            let current = self.get_member(id).await?;
            return Err(concurrent_modification(current.map(|m| m.version)));
        }

        self.increment_revision().await?;
        Ok(updated)
    }

    pub async fn delete_member(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM members WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Member {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }

    /// Remember the dues payment a member was last sent to.
    pub async fn set_member_payment_intent(
        &self,
        id: &str,
        payment_intent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Member, AppError> {
        let row = sqlx::query(&format!(
            "UPDATE members SET last_payment_intent_id = ?, updated_at = ?, version = version + 1 WHERE id = ? RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(payment_intent_id)
        .bind(to_db_time(now))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(member_from_row)
            .transpose()?
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))
    }

    /// Apply a succeeded dues payment: activate the member and extend their term.
    ///
    /// The term runs from the later of `now` and the current expiry, so renewing
    /// early never loses days. Applying the same intent twice is a no-op that
    /// returns the member unchanged. The flag is true only for the call that
    /// applied the payment.
    pub async fn activate_membership(
        &self,
        id: &str,
        payment_intent_id: &str,
        term_days: i64,
        now: DateTime<Utc>,
    ) -> Result<(Member, bool), AppError> {
        let now_str = to_db_time(now);
        let mut tx = self.pool.begin().await?;

        // Claim first so the transaction starts as a writer.
        let claimed =
            Self::claim_payment(&mut tx, payment_intent_id, "membership", id, &now_str).await?;

        let row = sqlx::query(&format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(existing) = row.as_ref().map(member_from_row).transpose()? else {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!("Member {} not found", id)));
        };

        if !claimed {
            tx.rollback().await?;
            tracing::debug!(member_id = %id, payment_intent_id, "Dues payment already applied");
            return Ok((existing, false));
        }

        let term_start = match existing.membership_expires_at {
            Some(expires)
                if expires > now
                    && matches!(
                        existing.status,
                        MembershipStatus::Active | MembershipStatus::Expired
                    ) =>
            {
                expires
            }
            _ => now,
        };
        let expires_at = term_start + Duration::days(term_days);

        let row = sqlx::query(&format!(
            "UPDATE members SET status = 'active', membership_expires_at = ?, last_payment_intent_id = ?, updated_at = ?, version = version + 1 WHERE id = ? RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(to_db_time(expires_at))
        .bind(payment_intent_id)
        .bind(&now_str)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        let member = member_from_row(&row)?;

        Self::bump_revision_tx(&mut tx, &now_str).await?;
        tx.commit().await?;

        tracing::info!(
            member_id = %member.id,
            payment_intent_id,
            expires_at = %expires_at,
            "Membership activated"
        );
        Ok((member, true))
    }

    /// Persist the expiry of memberships whose term has run out.
    pub async fn expire_lapsed_memberships(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let now_str = to_db_time(now);
        let result = sqlx::query(
            "UPDATE members SET status = 'expired', updated_at = ?1, version = version + 1 WHERE status = 'active' AND membership_expires_at IS NOT NULL AND membership_expires_at <= ?1",
        )
        .bind(&now_str)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            self.increment_revision().await?;
        }
        Ok(result.rows_affected())
    }
}

fn email_conflict(err: sqlx::Error, email: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::AlreadyExists(format!("A member with email {} already exists", email))
    } else {
        err.into()
    }
}

fn member_from_row(row: &SqliteRow) -> Result<Member, AppError> {
    Ok(Member {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        role: enum_col(row, "role", MemberRole::parse)?,
        credential: row.try_get("credential")?,
        bacb_certification_number: row.try_get("bacb_certification_number")?,
        organization: row.try_get("organization")?,
        phone: row.try_get("phone")?,
        status: enum_col(row, "status", MembershipStatus::parse)?,
        membership_expires_at: opt_time_col(row, "membership_expires_at")?,
        last_payment_intent_id: row.try_get("last_payment_intent_id")?,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
        version: row.try_get("version")?,
    })
}
