//! CEU course persistence.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{
    bool_col, check_version, concurrent_modification, enum_col, opt_time_col, time_col,
    Repository,
};
use crate::db::to_db_time;
use crate::errors::AppError;
use crate::models::{CeuCategory, Course, CourseFormat, CreateCourseRequest, UpdateCourseRequest};

const COURSE_COLUMNS: &str = "id, title, description, instructor, ceu_credits, ceu_category, format, location, starts_at, price_cents, registration_url, bacb_provider_number, published, created_at, updated_at, version";

impl Repository {
    /// List courses by start date, undated (on-demand) courses last.
    pub async fn list_courses(&self, published_only: bool) -> Result<Vec<Course>, AppError> {
        let filter = if published_only { "WHERE published = 1" } else { "" };
        let rows = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses {filter} ORDER BY starts_at IS NULL, starts_at, title"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(course_from_row).collect()
    }

    pub async fn get_course(&self, id: &str) -> Result<Option<Course>, AppError> {
        let row = sqlx::query(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(course_from_row).transpose()
    }

    pub async fn create_course(
        &self,
        request: &CreateCourseRequest,
        now: DateTime<Utc>,
    ) -> Result<Course, AppError> {
        let course = Course {
            id: uuid::Uuid::new_v4().to_string(),
            title: request.title.clone(),
            description: request.description.clone(),
            instructor: request.instructor.clone(),
            ceu_credits: request.ceu_credits,
            ceu_category: request.ceu_category,
            format: request.format,
            location: request.location.clone(),
            starts_at: request.starts_at,
            price_cents: request.price_cents,
            registration_url: request.registration_url.clone(),
            bacb_provider_number: request.bacb_provider_number.clone(),
            published: request.published,
            created_at: now,
            updated_at: now,
            version: 1,
        };

        sqlx::query(
            "INSERT INTO courses (id, title, description, instructor, ceu_credits, ceu_category, format, location, starts_at, price_cents, registration_url, bacb_provider_number, published, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&course.id)
        .bind(&course.title)
        .bind(&course.description)
        .bind(&course.instructor)
        .bind(course.ceu_credits)
        .bind(course.ceu_category.as_str())
        .bind(course.format.as_str())
        .bind(&course.location)
        .bind(course.starts_at.map(to_db_time))
        .bind(course.price_cents)
        .bind(&course.registration_url)
        .bind(&course.bacb_provider_number)
        .bind(course.published as i32)
        .bind(to_db_time(now))
        .bind(to_db_time(now))
        .execute(&self.pool)
        .await?;

        self.increment_revision().await?;
        Ok(course)
    }

    /// Update a course with optimistic concurrency control.
    pub async fn update_course(
        &self,
        id: &str,
        request: &UpdateCourseRequest,
        now: DateTime<Utc>,
    ) -> Result<Course, AppError> {
        let existing = self
            .get_course(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Course {} not found", id)))?;
        check_version(request.expected_version, existing.version)?;

        let updated = Course {
            id: existing.id.clone(),
            title: request.title.clone().unwrap_or(existing.title),
            description: request.description.clone().unwrap_or(existing.description),
            instructor: request.instructor.clone().unwrap_or(existing.instructor),
            ceu_credits: request.ceu_credits.unwrap_or(existing.ceu_credits),
            ceu_category: request.ceu_category.unwrap_or(existing.ceu_category),
            format: request.format.unwrap_or(existing.format),
            location: request.location.clone().unwrap_or(existing.location),
            starts_at: request.starts_at.unwrap_or(existing.starts_at),
            price_cents: request.price_cents.unwrap_or(existing.price_cents),
            registration_url: request
                .registration_url
                .clone()
                .unwrap_or(existing.registration_url),
            bacb_provider_number: request
                .bacb_provider_number
                .clone()
                .unwrap_or(existing.bacb_provider_number),
            published: request.published.unwrap_or(existing.published),
            created_at: existing.created_at,
            updated_at: now,
            version: existing.version + 1,
        };

        let result = sqlx::query(
            "UPDATE courses SET title = ?, description = ?, instructor = ?, ceu_credits = ?, ceu_category = ?, format = ?, location = ?, starts_at = ?, price_cents = ?, registration_url = ?, bacb_provider_number = ?, published = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(&updated.title)
        .bind(&updated.description)
        .bind(&updated.instructor)
        .bind(updated.ceu_credits)
        .bind(updated.ceu_category.as_str())
        .bind(updated.format.as_str())
        .bind(&updated.location)
        .bind(updated.starts_at.map(to_db_time))
        .bind(updated.price_cents)
        .bind(&updated.registration_url)
        .bind(&updated.bacb_provider_number)
        .bind(updated.published as i32)
        .bind(to_db_time(now))
        .bind(updated.version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_course(id).await?;
            return Err(concurrent_modification(current.map(|c| c.version)));
        }

        self.increment_revision().await?;
        Ok(updated)
    }

    pub async fn delete_course(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM courses WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Course {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }
}

fn course_from_row(row: &SqliteRow) -> Result<Course, AppError> {
    Ok(Course {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        instructor: row.try_get("instructor")?,
        ceu_credits: row.try_get("ceu_credits")?,
        ceu_category: enum_col(row, "ceu_category", CeuCategory::parse)?,
        format: enum_col(row, "format", CourseFormat::parse)?,
        location: row.try_get("location")?,
        starts_at: opt_time_col(row, "starts_at")?,
        price_cents: row.try_get("price_cents")?,
        registration_url: row.try_get("registration_url")?,
        bacb_provider_number: row.try_get("bacb_provider_number")?,
        published: bool_col(row, "published")?,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
        version: row.try_get("version")?,
    })
}
