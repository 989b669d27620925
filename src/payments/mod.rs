//! Card payments through a hosted gateway.
//!
//! Dues and paid event registrations create a payment intent up front; the
//! browser completes it with the returned client secret and the backend
//! applies it once the gateway reports `succeeded`, either through a confirm
//! endpoint or the signed webhook.

mod stripe;
mod webhook;

pub use stripe::StripeGateway;
pub use webhook::{verify_signature, WebhookEvent};

#[cfg(test)]
pub(crate) use webhook::signature_header;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::PaymentInstructions;

/// What a payment is for. Stored in the intent metadata as `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentPurpose {
    Membership,
    Registration,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::Membership => "membership",
            PaymentPurpose::Registration => "registration",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "membership" => Some(PaymentPurpose::Membership),
            "registration" => Some(PaymentPurpose::Registration),
            _ => None,
        }
    }
}

/// Gateway-side lifecycle of an intent. Unrecognized states read as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

/// A payment intent as reported by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub status: IntentStatus,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    pub fn succeeded(&self) -> bool {
        self.status == IntentStatus::Succeeded
    }

    /// The member or registration this intent pays for.
    pub fn target(&self) -> Option<(PaymentPurpose, &str)> {
        let purpose = PaymentPurpose::parse(self.metadata.get("kind")?)?;
        let id = self.metadata.get("id")?;
        Some((purpose, id.as_str()))
    }

    pub fn is_for(&self, purpose: PaymentPurpose, id: &str) -> bool {
        self.target() == Some((purpose, id))
    }

    /// What the browser needs to complete the payment.
    pub fn instructions(&self) -> Result<PaymentInstructions, AppError> {
        let client_secret = self.client_secret.clone().ok_or_else(|| {
            AppError::Payment(format!("Payment intent {} has no client secret", self.id))
        })?;
        Ok(PaymentInstructions {
            payment_intent_id: self.id.clone(),
            client_secret,
            amount_cents: self.amount,
            currency: self.currency.clone(),
        })
    }
}

/// Parameters for a new intent.
#[derive(Debug, Clone)]
pub struct NewIntent<'a> {
    pub amount_cents: i64,
    pub currency: &'a str,
    pub purpose: PaymentPurpose,
    pub target_id: &'a str,
    pub description: String,
    pub receipt_email: Option<&'a str>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, intent: &NewIntent<'_>) -> Result<PaymentIntent, AppError>;

    async fn retrieve_intent(&self, id: &str) -> Result<PaymentIntent, AppError>;
}

/// Gateway used when no Stripe key is configured.
pub struct DisabledGateway;

#[async_trait]
impl PaymentGateway for DisabledGateway {
    async fn create_intent(&self, _intent: &NewIntent<'_>) -> Result<PaymentIntent, AppError> {
        Err(unavailable())
    }

    async fn retrieve_intent(&self, _id: &str) -> Result<PaymentIntent, AppError> {
        Err(unavailable())
    }
}

fn unavailable() -> AppError {
    AppError::PaymentsUnavailable("Online payments are not configured".to_string())
}
