//! Job board persistence.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{check_version, concurrent_modification, enum_col, opt_time_col, time_col, Repository};
use crate::db::to_db_time;
use crate::errors::AppError;
use crate::models::{CreateJobRequest, EmploymentType, Job, UpdateJobRequest};

const JOB_COLUMNS: &str = "id, title, organization, location, employment_type, description, salary_range, apply_url, contact_email, expires_at, created_at, updated_at, version";

impl Repository {
    /// List jobs newest first. With `open_at`, postings expired by then are hidden.
    pub async fn list_jobs(&self, open_at: Option<DateTime<Utc>>) -> Result<Vec<Job>, AppError> {
        let rows = match open_at {
            Some(now) => {
                sqlx::query(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE expires_at IS NULL OR expires_at > ? ORDER BY created_at DESC, id"
                ))
                .bind(to_db_time(now))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC, id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(job_from_row).collect()
    }

    pub async fn get_job(&self, id: &str) -> Result<Option<Job>, AppError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    pub async fn create_job(
        &self,
        request: &CreateJobRequest,
        now: DateTime<Utc>,
    ) -> Result<Job, AppError> {
        let job = Job {
            id: uuid::Uuid::new_v4().to_string(),
            title: request.title.clone(),
            organization: request.organization.clone(),
            location: request.location.clone(),
            employment_type: request.employment_type,
            description: request.description.clone(),
            salary_range: request.salary_range.clone(),
            apply_url: request.apply_url.clone(),
            contact_email: request.contact_email.clone(),
            expires_at: request.expires_at,
            created_at: now,
            updated_at: now,
            version: 1,
        };

        sqlx::query(
            "INSERT INTO jobs (id, title, organization, location, employment_type, description, salary_range, apply_url, contact_email, expires_at, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&job.id)
        .bind(&job.title)
        .bind(&job.organization)
        .bind(&job.location)
        .bind(job.employment_type.as_str())
        .bind(&job.description)
        .bind(&job.salary_range)
        .bind(&job.apply_url)
        .bind(&job.contact_email)
        .bind(job.expires_at.map(to_db_time))
        .bind(to_db_time(now))
        .bind(to_db_time(now))
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;
        Ok(job)
    }

    /// Update a job posting with optimistic concurrency control.
    pub async fn update_job(
        &self,
        id: &str,
        request: &UpdateJobRequest,
        now: DateTime<Utc>,
    ) -> Result<Job, AppError> {
        let existing = self
            .get_job(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;
        check_version(request.expected_version, existing.version)?;

        let updated = Job {
            id: existing.id.clone(),
            title: request.title.clone().unwrap_or(existing.title),
            organization: request.organization.clone().unwrap_or(existing.organization),
            location: request.location.clone().unwrap_or(existing.location),
            employment_type: request.employment_type.unwrap_or(existing.employment_type),
            description: request.description.clone().unwrap_or(existing.description),
            salary_range: request.salary_range.clone().unwrap_or(existing.salary_range),
            apply_url: request.apply_url.clone().unwrap_or(existing.apply_url),
            contact_email: request
                .contact_email
                .clone()
                .unwrap_or(existing.contact_email),
            expires_at: request.expires_at.unwrap_or(existing.expires_at),
            created_at: existing.created_at,
            updated_at: now,
            version: existing.version + 1,
        };

        let result = sqlx::query(
            "UPDATE jobs SET title = ?, organization = ?, location = ?, employment_type = ?, description = ?, salary_range = ?, apply_url = ?, contact_email = ?, expires_at = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(&updated.title)
        .bind(&updated.organization)
        .bind(&updated.location)
        .bind(updated.employment_type.as_str())
        .bind(&updated.description)
        .bind(&updated.salary_range)
        .bind(&updated.apply_url)
        .bind(&updated.contact_email)
        .bind(updated.expires_at.map(to_db_time))
        .bind(to_db_time(now))
        .bind(updated.version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_job(id).await?;
            return Err(concurrent_modification(current.map(|j| j.version)));
        }

        self.increment_revision().await?;
        Ok(updated)
    }

    pub async fn delete_job(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Job {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }
}

fn job_from_row(row: &SqliteRow) -> Result<Job, AppError> {
    Ok(Job {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        organization: row.try_get("organization")?,
        location: row.try_get("location")?,
        employment_type: enum_col(row, "employment_type", EmploymentType::parse)?,
        description: row.try_get("description")?,
        salary_range: row.try_get("salary_range")?,
        apply_url: row.try_get("apply_url")?,
        contact_email: row.try_get("contact_email")?,
        expires_at: opt_time_col(row, "expires_at")?,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
        version: row.try_get("version")?,
    })
}
