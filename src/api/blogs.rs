//! Blog API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use super::{error, refresh_search, required, required_if_set, success, written, ApiResult};
use crate::errors::AppError;
use crate::models::{slugify, BlogPost, CreateBlogRequest, UpdateBlogRequest};
use crate::AppState;

/// Normalize a requested slug, falling back to the title.
fn resolve_slug(slug: Option<&str>, title: &str) -> Result<String, AppError> {
    let source = slug.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(title);
    let slug = slugify(source);
    if slug.is_empty() {
        return Err(AppError::Validation(
            "Slug must contain at least one letter or digit".to_string(),
        ));
    }
    Ok(slug)
}

/// GET /api/blogs - Published posts, newest first.
pub async fn list_published_blogs(State(state): State<AppState>) -> ApiResult<Vec<BlogPost>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_blogs(true).await {
        Ok(blogs) => success(blogs, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/blogs/:slug - A published post by slug.
pub async fn get_published_blog(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<BlogPost> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_blog_by_slug(&slug).await {
        Ok(Some(blog)) if blog.published => success(blog, revision_id),
        Ok(_) => error(
            AppError::NotFound(format!("Blog post {} not found", slug)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/admin/blogs - Every post including drafts.
pub async fn list_blogs(State(state): State<AppState>) -> ApiResult<Vec<BlogPost>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.list_blogs(false).await {
        Ok(blogs) => success(blogs, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/admin/blogs/:id
pub async fn get_blog(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<BlogPost> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_blog(&id).await {
        Ok(Some(blog)) => success(blog, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Blog post {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// POST /api/admin/blogs - Create a post.
pub async fn create_blog(
    State(state): State<AppState>,
    Json(request): Json<CreateBlogRequest>,
) -> ApiResult<BlogPost> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let validated = required(&request.title, "Title")
        .and_then(|_| required(&request.author, "Author"))
        .and_then(|_| required(&request.content, "Content"))
        .and_then(|_| resolve_slug(request.slug.as_deref(), &request.title));
    let slug = match validated {
        Ok(slug) => slug,
        Err(e) => return error(e, revision_id),
    };

    let result = state.repo.create_blog(&request, &slug, Utc::now()).await;
    if result.is_ok() {
        refresh_search(&state).await;
    }
    written(&state, result, revision_id).await
}

/// PUT /api/admin/blogs/:id - Update a post.
pub async fn update_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateBlogRequest>,
) -> ApiResult<BlogPost> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let validated = required_if_set(&request.title, "Title")
        .and_then(|_| required_if_set(&request.author, "Author"))
        .and_then(|_| required_if_set(&request.content, "Content"))
        .and_then(|_| {
            request
                .slug
                .as_deref()
                .map(|slug| resolve_slug(Some(slug), ""))
                .transpose()
        });
    let slug = match validated {
        Ok(slug) => slug,
        Err(e) => return error(e, revision_id),
    };

    let request = UpdateBlogRequest { slug, ..request };
    let result = state.repo.update_blog(&id, &request, Utc::now()).await;
    if result.is_ok() {
        refresh_search(&state).await;
    }
    written(&state, result, revision_id).await
}

/// DELETE /api/admin/blogs/:id
pub async fn delete_blog(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = state.repo.delete_blog(&id).await;
    if result.is_ok() {
        refresh_search(&state).await;
    }
    written(&state, result, revision_id).await
}
