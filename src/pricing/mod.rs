//! Membership dues and event price-tier resolution.
//!
//! An event carries a non-member price, an optional generic member price and
//! optional per-role tier prices. Which one applies depends on whether the
//! registrant is a member whose membership is active at registration time.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::AppError;
use crate::models::{Event, Member, MemberRole, TierPrice};

/// Annual dues per membership level, in cents.
pub fn membership_dues(role: MemberRole) -> i64 {
    match role {
        MemberRole::Professional => 7500,
        MemberRole::Paraprofessional => 4500,
        MemberRole::Student => 2500,
        MemberRole::Affiliate => 5000,
    }
}

/// Which price of an event was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingTier {
    /// The tier price for an active member's role
    Role(MemberRole),
    /// The generic member price
    Member,
    NonMember,
}

impl PricingTier {
    pub fn label(&self) -> &'static str {
        match self {
            PricingTier::Role(role) => role.as_str(),
            PricingTier::Member => "member",
            PricingTier::NonMember => "non_member",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "member" => Some(PricingTier::Member),
            "non_member" => Some(PricingTier::NonMember),
            other => MemberRole::parse(other).map(PricingTier::Role),
        }
    }
}

impl fmt::Display for PricingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for PricingTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for PricingTier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PricingTier::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown pricing tier '{}'", s)))
    }
}

/// A resolved price for one registrant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub event_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    pub pricing_tier: PricingTier,
    pub price_cents: i64,
    pub currency: String,
}

/// Resolve the price an event charges a registrant.
///
/// Only a member who is active at `now` gets member pricing. The role tier wins
/// over the generic member price, which wins over the non-member price.
pub fn resolve_price(
    event: &Event,
    member: Option<&Member>,
    now: DateTime<Utc>,
) -> (PricingTier, i64) {
    let Some(member) = member.filter(|m| m.is_active_at(now)) else {
        return (PricingTier::NonMember, event.non_member_price_cents);
    };

    if let Some(tier) = event.tier_prices.iter().find(|t| t.role == member.role) {
        return (PricingTier::Role(member.role), tier.price_cents);
    }

    match event.member_price_cents {
        Some(price) => (PricingTier::Member, price),
        None => (PricingTier::NonMember, event.non_member_price_cents),
    }
}

/// Reject negative prices and duplicate role tiers.
pub fn validate_pricing(
    non_member_price_cents: i64,
    member_price_cents: Option<i64>,
    tier_prices: &[TierPrice],
) -> Result<(), AppError> {
    if non_member_price_cents < 0 {
        return Err(AppError::Validation(
            "nonMemberPriceCents must not be negative".to_string(),
        ));
    }
    if member_price_cents.is_some_and(|p| p < 0) {
        return Err(AppError::Validation(
            "memberPriceCents must not be negative".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for tier in tier_prices {
        if tier.price_cents < 0 {
            return Err(AppError::Validation(format!(
                "Tier price for {} must not be negative",
                tier.role.as_str()
            )));
        }
        if !seen.insert(tier.role) {
            return Err(AppError::Validation(format!(
                "Duplicate tier price for {}",
                tier.role.as_str()
            )));
        }
    }
    Ok(())
}
