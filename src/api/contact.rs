//! Contact form endpoint.

use axum::{extract::State, Json};

use super::{error, required, success, ApiResult};
use crate::checkout::validate_email;
use crate::mail;
use crate::models::ContactRequest;
use crate::AppState;

/// Longest message the form accepts.
const MAX_CONTACT_CHARS: usize = 5000;

/// POST /api/contact - Forward a website inquiry to the association inbox.
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(request): Json<ContactRequest>,
) -> ApiResult<()> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let validated = required(&request.name, "Name")
        .and_then(|_| validate_email(&request.email))
        .and_then(|_| required(&request.message, "Message"));
    if let Err(e) = validated {
        return error(e, revision_id);
    }
    if request.message.chars().count() > MAX_CONTACT_CHARS {
        return error(
            crate::errors::AppError::Validation(format!(
                "Message exceeds {} characters",
                MAX_CONTACT_CHARS
            )),
            revision_id,
        );
    }

    let email = mail::contact_forward(&request, &state.config.mail.admin_email);
    match state.mailer.send(email).await {
        Ok(()) => {
            tracing::info!(from = %request.email.trim(), "Contact form forwarded");
            success((), revision_id)
        }
        Err(e) => error(e, revision_id),
    }
}
