//! Event registration model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PaymentInstructions;
use crate::pricing::PricingTier;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    PendingPayment,
    Confirmed,
    Cancelled,
    Attended,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::PendingPayment => "pending_payment",
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Cancelled => "cancelled",
            RegistrationStatus::Attended => "attended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_payment" => Some(RegistrationStatus::PendingPayment),
            "confirmed" => Some(RegistrationStatus::Confirmed),
            "cancelled" => Some(RegistrationStatus::Cancelled),
            "attended" => Some(RegistrationStatus::Attended),
            _ => None,
        }
    }
}

/// One person's registration for an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    pub name: String,
    pub email: String,
    pub pricing_tier: PricingTier,
    pub price_cents: i64,
    pub status: RegistrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for registering for an event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegistrationRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub member_id: Option<String>,
}

/// Registration plus the payment to complete, when the price is not zero.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationCheckout {
    pub registration: Registration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentInstructions>,
}

/// Public self-service cancellation; the email must match the registration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRegistrationRequest {
    pub email: String,
}

/// Per-status counters for an event's registrations.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationTotals {
    pub pending_payment: i64,
    pub confirmed: i64,
    pub cancelled: i64,
    pub attended: i64,
    /// Sum of prices over confirmed and attended registrations
    pub revenue_cents: i64,
}

impl RegistrationTotals {
    pub fn tally(registrations: &[Registration]) -> Self {
        let mut totals = Self::default();
        for r in registrations {
            match r.status {
                RegistrationStatus::PendingPayment => totals.pending_payment += 1,
                RegistrationStatus::Confirmed => totals.confirmed += 1,
                RegistrationStatus::Cancelled => totals.cancelled += 1,
                RegistrationStatus::Attended => totals.attended += 1,
            }
            if matches!(
                r.status,
                RegistrationStatus::Confirmed | RegistrationStatus::Attended
            ) {
                totals.revenue_cents += r.price_cents;
            }
        }
        totals
    }
}

/// Attendee list for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeReport {
    pub event: super::Event,
    pub registrations: Vec<Registration>,
    pub totals: RegistrationTotals,
}
