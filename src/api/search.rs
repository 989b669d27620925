//! Search API endpoints.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::{error, success, ApiResult};
use crate::errors::AppError;
use crate::search::SearchHit;
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Search query string.
    #[serde(default)]
    pub q: String,
    /// Maximum number of results (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

/// One page of hits plus paging metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Maximum number of search results allowed.
const MAX_SEARCH_LIMIT: usize = 50;

/// Deepest page a client may ask for.
const MAX_SEARCH_OFFSET: usize = 10_000;

/// GET /api/search - Search the public site content.
pub async fn search_site(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    // Limit the maximum number of results
    let limit = params.limit.clamp(1, MAX_SEARCH_LIMIT);
    if params.offset > MAX_SEARCH_OFFSET {
        return error(
            AppError::BadRequest(format!("Offset may not exceed {}", MAX_SEARCH_OFFSET)),
            revision_id,
        );
    }

    match state.search.search(&params.q, limit, params.offset) {
        Ok((results, total)) => success(
            SearchResponse {
                results,
                total,
                limit,
                offset: params.offset,
            },
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}
