//! Event model with tiered pricing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MemberRole;
use crate::errors::AppError;
use crate::pricing::validate_pricing;

/// Price charged to active members holding a given role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TierPrice {
    pub role: MemberRole,
    pub price_cents: i64,
}

/// An association event members and the public can register for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    /// None means unlimited seats
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,
    pub non_member_price_cents: i64,
    /// Fallback price for active members whose role has no tier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_price_cents: Option<i64>,
    #[serde(default)]
    pub tier_prices: Vec<TierPrice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ceu_credits: Option<f64>,
    pub registration_open: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: i64,
    /// Live registrations (pending payment, confirmed, attended)
    #[serde(default)]
    pub registered_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spots_remaining: Option<i64>,
}

impl Event {
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now
    }

    /// Check the schedule, capacity and prices before a write.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        if self.location.trim().is_empty() {
            return Err(AppError::Validation("Location is required".to_string()));
        }
        if self.ends_at.is_some_and(|ends| ends < self.starts_at) {
            return Err(AppError::Validation(
                "endsAt must not be before startsAt".to_string(),
            ));
        }
        if self.capacity.is_some_and(|cap| cap <= 0) {
            return Err(AppError::Validation(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if self.ceu_credits.is_some_and(|c| !(c.is_finite() && c >= 0.0)) {
            return Err(AppError::Validation(
                "ceuCredits must not be negative".to_string(),
            ));
        }
        validate_pricing(
            self.non_member_price_cents,
            self.member_price_cents,
            &self.tier_prices,
        )
    }

    /// Fill the derived seat counters from a live registration count.
    pub fn with_registered_count(mut self, count: i64) -> Self {
        self.registered_count = count;
        self.spots_remaining = self.capacity.map(|cap| (cap - count).max(0));
        self
    }
}

/// Request body for creating an event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub capacity: Option<i64>,
    #[serde(default)]
    pub non_member_price_cents: i64,
    #[serde(default)]
    pub member_price_cents: Option<i64>,
    #[serde(default)]
    pub tier_prices: Vec<TierPrice>,
    #[serde(default)]
    pub ceu_credits: Option<f64>,
    #[serde(default = "default_registration_open")]
    pub registration_open: bool,
}

fn default_registration_open() -> bool {
    true
}

/// Request body for updating an event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub ends_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub capacity: Option<Option<i64>>,
    #[serde(default)]
    pub non_member_price_cents: Option<i64>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub member_price_cents: Option<Option<i64>>,
    #[serde(default)]
    pub tier_prices: Option<Vec<TierPrice>>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub ceu_credits: Option<Option<f64>>,
    #[serde(default)]
    pub registration_open: Option<bool>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}
