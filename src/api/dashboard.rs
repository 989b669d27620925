//! Dashboard and revision endpoints.

use axum::extract::State;
use chrono::Utc;

use super::{success, ApiResult};
use crate::errors::AppErrorWithRevision;
use crate::models::{DashboardSummary, RevisionInfo};
use crate::AppState;

/// GET /api/admin/dashboard - Counts for the admin landing page.
pub async fn get_dashboard(State(state): State<AppState>) -> ApiResult<DashboardSummary> {
    let summary = state
        .repo
        .dashboard_summary(Utc::now())
        .await
        .map_err(|e| AppErrorWithRevision {
            error: e,
            revision_id: 0,
        })?;

    let revision_id = summary.revision_id;
    success(summary, revision_id)
}

/// GET /api/revision - Get the current revision info.
pub async fn get_revision(State(state): State<AppState>) -> ApiResult<RevisionInfo> {
    let revision_info = state
        .repo
        .get_revision_info()
        .await
        .map_err(|e| AppErrorWithRevision {
            error: e,
            revision_id: 0,
        })?;

    success(revision_info.clone(), revision_info.revision_id)
}
