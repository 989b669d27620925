//! Blog post persistence.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{
    bool_col, check_version, concurrent_modification, is_unique_violation, opt_time_col,
    time_col, Repository,
};
use crate::db::to_db_time;
use crate::errors::AppError;
use crate::models::{BlogPost, CreateBlogRequest, UpdateBlogRequest};

const BLOG_COLUMNS: &str = "id, title, slug, author, summary, content, image_url, published, published_at, created_at, updated_at, version";

impl Repository {
    /// List blog posts; the public site only sees published ones, newest first.
    pub async fn list_blogs(&self, published_only: bool) -> Result<Vec<BlogPost>, AppError> {
        let sql = if published_only {
            format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE published = 1 ORDER BY published_at DESC, id")
        } else {
            format!("SELECT {BLOG_COLUMNS} FROM blogs ORDER BY created_at DESC, id")
        };
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(blog_from_row).collect()
    }

    pub async fn get_blog(&self, id: &str) -> Result<Option<BlogPost>, AppError> {
        let row = sqlx::query(&format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(blog_from_row).transpose()
    }

    pub async fn get_blog_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, AppError> {
        let row = sqlx::query(&format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE slug = ?"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(blog_from_row).transpose()
    }

    /// Create a blog post under an already-validated slug.
    pub async fn create_blog(
        &self,
        request: &CreateBlogRequest,
        slug: &str,
        now: DateTime<Utc>,
    ) -> Result<BlogPost, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let published_at = request.published.then_some(now);

        sqlx::query(
            "INSERT INTO blogs (id, title, slug, author, summary, content, image_url, published, published_at, created_at, updated_at, version) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&id)
        .bind(&request.title)
        .bind(slug)
        .bind(&request.author)
        .bind(&request.summary)
        .bind(&request.content)
        .bind(&request.image_url)
        .bind(request.published as i32)
        .bind(published_at.map(to_db_time))
        .bind(to_db_time(now))
        .bind(to_db_time(now))
        .execute(&self.pool)
        .await
        .map_err(|e| slug_conflict(e, slug))?;

        self.increment_revision().await?;

        Ok(BlogPost {
            id,
            title: request.title.clone(),
            slug: slug.to_string(),
            author: request.author.clone(),
            summary: request.summary.clone(),
            content: request.content.clone(),
            image_url: request.image_url.clone(),
            published: request.published,
            published_at,
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }

    /// Update a blog post with optimistic concurrency control.
    ///
    /// The first transition to published stamps `published_at`; later edits keep it.
    pub async fn update_blog(
        &self,
        id: &str,
        request: &UpdateBlogRequest,
        now: DateTime<Utc>,
    ) -> Result<BlogPost, AppError> {
        let existing = self
            .get_blog(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Blog post {} not found", id)))?;
        check_version(request.expected_version, existing.version)?;

        let published = request.published.unwrap_or(existing.published);
        let updated = BlogPost {
            id: existing.id.clone(),
            title: request.title.clone().unwrap_or(existing.title),
            slug: request.slug.clone().unwrap_or(existing.slug),
            author: request.author.clone().unwrap_or(existing.author),
            summary: request.summary.clone().unwrap_or(existing.summary),
            content: request.content.clone().unwrap_or(existing.content),
            image_url: request.image_url.clone().unwrap_or(existing.image_url),
            published,
            published_at: match (published, existing.published_at) {
                (true, None) => Some(now),
                (_, at) => at,
            },
            created_at: existing.created_at,
            updated_at: now,
            version: existing.version + 1,
        };

        let result = sqlx::query(
            "UPDATE blogs SET title = ?, slug = ?, author = ?, summary = ?, content = ?, image_url = ?, published = ?, published_at = ?, updated_at = ?, version = ? WHERE id = ? AND version = ?",
        )
        .bind(&updated.title)
        .bind(&updated.slug)
        .bind(&updated.author)
        .bind(&updated.summary)
        .bind(&updated.content)
        .bind(&updated.image_url)
        .bind(updated.published as i32)
        .bind(updated.published_at.map(to_db_time))
        .bind(to_db_time(now))
        .bind(updated.version)
        .bind(id)
        .bind(existing.version)
        .execute(&self.pool)
        .await
        .map_err(|e| slug_conflict(e, &updated.slug))?;

        if result.rows_affected() == 0 {
            let current = self.get_blog(id).await?;
            return Err(concurrent_modification(current.map(|b| b.version)));
        }

        self.increment_revision().await?;
        Ok(updated)
    }

    pub async fn delete_blog(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM blogs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Blog post {} not found", id)));
        }

        self.increment_revision().await?;
        Ok(())
    }
}

fn slug_conflict(err: sqlx::Error, slug: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::AlreadyExists(format!("A blog post with slug '{}' already exists", slug))
    } else {
        err.into()
    }
}

fn blog_from_row(row: &SqliteRow) -> Result<BlogPost, AppError> {
    Ok(BlogPost {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        author: row.try_get("author")?,
        summary: row.try_get("summary")?,
        content: row.try_get("content")?,
        image_url: row.try_get("image_url")?,
        published: bool_col(row, "published")?,
        published_at: opt_time_col(row, "published_at")?,
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
        version: row.try_get("version")?,
    })
}
