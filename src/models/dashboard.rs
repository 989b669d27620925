//! Admin dashboard summary and revision info.

use serde::{Deserialize, Serialize};

/// Revision information for change detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInfo {
    pub revision_id: i64,
    pub generated_at: String,
}

/// Members grouped by effective status.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberCounts {
    pub pending_payment: i64,
    pub active: i64,
    pub expired: i64,
    pub cancelled: i64,
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub schema_version: i32,
    pub revision_id: i64,
    pub generated_at: String,
    pub published_blogs: i64,
    pub draft_blogs: i64,
    pub published_courses: i64,
    pub open_jobs: i64,
    pub upcoming_events: i64,
    pub live_registrations: i64,
    pub members: MemberCounts,
    pub chat_messages: i64,
}
