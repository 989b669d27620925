//! Membership API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{error, required_if_set, success, written, ApiResult};
use crate::checkout::{self, validate_email};
use crate::errors::AppError;
use crate::models::{
    ConfirmPaymentRequest, Member, MemberLookup, MemberRole, MembershipCheckout,
    MembershipStatus, SignupRequest, UpdateMemberRequest,
};
use crate::pricing::membership_dues;
use crate::AppState;

/// Query parameters for the admin member list.
#[derive(Debug, Deserialize)]
pub struct MemberListQuery {
    /// Filter on effective status
    #[serde(default)]
    pub status: Option<MembershipStatus>,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub email: String,
}

/// Annual dues for one membership level.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuesEntry {
    pub role: MemberRole,
    pub amount_cents: i64,
    pub currency: String,
}

/// GET /api/membership/dues
pub async fn list_dues(State(state): State<AppState>) -> ApiResult<Vec<DuesEntry>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let dues = MemberRole::ALL
        .iter()
        .map(|&role| DuesEntry {
            role,
            amount_cents: membership_dues(role),
            currency: state.config.currency.clone(),
        })
        .collect();
    success(dues, revision_id)
}

/// POST /api/members/signup - Join and start the dues payment.
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> ApiResult<MembershipCheckout> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = checkout::signup(&state, &request, Utc::now()).await;
    written(&state, result, revision_id).await
}

/// POST /api/members/:id/confirm - Apply a completed dues payment.
pub async fn confirm_membership(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> ApiResult<Member> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result =
        checkout::confirm_membership(&state, &id, &request.payment_intent_id, Utc::now()).await;
    written(&state, result, revision_id).await
}

/// POST /api/members/:id/renew - Start another year of dues.
pub async fn renew_membership(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<MembershipCheckout> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = checkout::renew(&state, &id, Utc::now()).await;
    written(&state, result, revision_id).await
}

/// GET /api/members/lookup?email= - Public membership status check.
pub async fn lookup_member(
    State(state): State<AppState>,
    Query(params): Query<LookupQuery>,
) -> ApiResult<MemberLookup> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    if let Err(e) = validate_email(&params.email) {
        return error(e, revision_id);
    }

    match state.repo.find_member_by_email(&params.email).await {
        Ok(Some(member)) => success(MemberLookup::from_member(&member, Utc::now()), revision_id),
        Ok(None) => error(
            AppError::NotFound("No member with that email".to_string()),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/admin/members - All members, optionally filtered by effective status.
pub async fn list_members(
    State(state): State<AppState>,
    Query(params): Query<MemberListQuery>,
) -> ApiResult<Vec<Member>> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let now = Utc::now();
    match state.repo.list_members().await {
        Ok(members) => {
            let members = match params.status {
                Some(status) => members
                    .into_iter()
                    .filter(|m| m.effective_status(now) == status)
                    .collect(),
                None => members,
            };
            success(members, revision_id)
        }
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/admin/members/:id
pub async fn get_member(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Member> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    match state.repo.get_member(&id).await {
        Ok(Some(member)) => success(member, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Member {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}

/// PUT /api/admin/members/:id
pub async fn update_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateMemberRequest>,
) -> ApiResult<Member> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let validated = required_if_set(&request.first_name, "First name")
        .and_then(|_| required_if_set(&request.last_name, "Last name"))
        .and_then(|_| request.email.as_deref().map(validate_email).transpose());
    if let Err(e) = validated {
        return error(e, revision_id);
    }

    let result = state.repo.update_member(&id, &request, Utc::now()).await;
    written(&state, result, revision_id).await
}

/// DELETE /api/admin/members/:id
pub async fn delete_member(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let result = state.repo.delete_member(&id).await;
    written(&state, result, revision_id).await
}
