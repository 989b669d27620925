//! Stripe webhook signature verification and event parsing.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::PaymentIntent;
use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age, in seconds, of a signed webhook delivery.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

const MAX_SIGNATURE_HEADER_LEN: usize = 1024;

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`)
/// against the raw request body.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<(), AppError> {
    if header.len() > MAX_SIGNATURE_HEADER_LEN {
        return Err(invalid("signature header too long"));
    }

    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| invalid("missing timestamp"))?;
    if candidates.is_empty() {
        return Err(invalid("missing v1 signature"));
    }
    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(invalid("timestamp outside tolerance"));
    }

    let expected = compute_signature(payload, secret, timestamp)?;
    let matched = candidates
        .iter()
        .any(|candidate| bool::from(candidate.as_bytes().ct_eq(expected.as_bytes())));
    if matched {
        Ok(())
    } else {
        Err(invalid("signature mismatch"))
    }
}

fn compute_signature(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn invalid(reason: &str) -> AppError {
    tracing::warn!(reason, "Rejected webhook delivery");
    AppError::BadRequest("Invalid webhook signature".to_string())
}

/// Header value a Stripe delivery of `payload` at `timestamp` would carry.
#[cfg(test)]
pub(crate) fn signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signature = compute_signature(payload, secret, timestamp).unwrap();
    format!("t={},v1={}", timestamp, signature)
}

/// The subset of a Stripe event the backend reads.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// The succeeded payment intent this event carries, if that is what it is.
    pub fn succeeded_intent(&self) -> Result<Option<PaymentIntent>, AppError> {
        if self.event_type != "payment_intent.succeeded" {
            return Ok(None);
        }
        let intent = serde_json::from_value(self.data.object.clone())?;
        Ok(Some(intent))
    }
}
