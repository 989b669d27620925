//! Stripe webhook endpoint.

use axum::{body::Bytes, extract::State, http::HeaderMap};
use chrono::Utc;
use serde::Serialize;

use super::{error, success, ApiResult};
use crate::checkout::{self, Applied};
use crate::errors::AppError;
use crate::payments::{verify_signature, WebhookEvent};
use crate::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

/// What the backend did with a delivery.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub event_id: String,
    pub handled: bool,
}

/// POST /api/webhooks/stripe - Signed payment notifications.
///
/// Only transient failures answer with an error, so Stripe retries those
/// and nothing else.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<WebhookAck> {
    let revision_id = state.repo.get_revision_id().await.unwrap_or(0);

    let Some(secret) = state.config.stripe.webhook_secret.as_deref() else {
        return error(
            AppError::PaymentsUnavailable("Webhook signing secret is not configured".to_string()),
            revision_id,
        );
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if let Err(e) = verify_signature(&body, signature, secret, Utc::now().timestamp()) {
        return error(e, revision_id);
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => return error(e.into(), revision_id),
    };

    let intent = match event.succeeded_intent() {
        Ok(Some(intent)) => intent,
        Ok(None) => {
            tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Webhook event ignored");
            return success(
                WebhookAck {
                    event_id: event.id,
                    handled: false,
                },
                revision_id,
            );
        }
        Err(e) => return error(e, revision_id),
    };

    match checkout::apply_intent(&state, &intent, Utc::now()).await {
        Ok(applied) => {
            tracing::info!(event_id = %event.id, payment_intent_id = %intent.id, ?applied, "Webhook payment applied");
            let new_revision = state.repo.get_revision_id().await.unwrap_or(revision_id);
            success(
                WebhookAck {
                    event_id: event.id,
                    handled: applied != Applied::Ignored,
                },
                new_revision,
            )
        }
        Err(e @ (AppError::Database(_) | AppError::Internal(_))) => error(e, revision_id),
        Err(e) => {
            tracing::warn!(
                event_id = %event.id,
                payment_intent_id = %intent.id,
                error = %e,
                "Webhook payment could not be applied"
            );
            success(
                WebhookAck {
                    event_id: event.id,
                    handled: false,
                },
                revision_id,
            )
        }
    }
}
