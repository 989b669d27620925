//! Admin authentication.
//!
//! Routes under `/api/admin` require the pre-shared key, sent either as
//! `x-api-key` or as a bearer token. Keys are compared in constant time.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::{AppError, AppErrorWithRevision};
use crate::AppState;

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Middleware guarding the admin router.
pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    // Without a configured key the admin API is open (local development only)
    let Some(expected) = state.config.api_psk.as_deref() else {
        return next.run(request).await;
    };

    let verdict = provided_key(request.headers()).map(|key| constant_time_compare(key, expected));
    match verdict {
        Some(true) => next.run(request).await,
        Some(false) => {
            tracing::warn!(path = %request.uri().path(), "Rejected admin request with wrong key");
            unauthorized("Invalid API key")
        }
        None => unauthorized("Missing API key"),
    }
}

/// The key a request presents, preferring `x-api-key` over a bearer token.
fn provided_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key);
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn unauthorized(message: &str) -> Response {
    AppErrorWithRevision {
        error: AppError::Unauthorized(message.to_string()),
        revision_id: 0,
    }
    .into_response()
}
