//! Association member model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Membership level. Drives annual dues and event pricing tiers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    /// BCBA / BCBA-D
    Professional,
    /// BCaBA / RBT
    Paraprofessional,
    Student,
    Affiliate,
}

impl MemberRole {
    pub const ALL: [MemberRole; 4] = [
        MemberRole::Professional,
        MemberRole::Paraprofessional,
        MemberRole::Student,
        MemberRole::Affiliate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Professional => "professional",
            MemberRole::Paraprofessional => "paraprofessional",
            MemberRole::Student => "student",
            MemberRole::Affiliate => "affiliate",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        MemberRole::ALL.into_iter().find(|r| r.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    PendingPayment,
    Active,
    Expired,
    Cancelled,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::PendingPayment => "pending_payment",
            MembershipStatus::Active => "active",
            MembershipStatus::Expired => "expired",
            MembershipStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_payment" => Some(MembershipStatus::PendingPayment),
            "active" => Some(MembershipStatus::Active),
            "expired" => Some(MembershipStatus::Expired),
            "cancelled" => Some(MembershipStatus::Cancelled),
            _ => None,
        }
    }
}

/// A person who signed up for membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: MemberRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bacb_certification_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub status: MembershipStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: i64,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Stored status, except that an active membership past its expiry reads as expired.
    pub fn effective_status(&self, now: DateTime<Utc>) -> MembershipStatus {
        match (self.status, self.membership_expires_at) {
            (MembershipStatus::Active, Some(expires)) if expires <= now => {
                MembershipStatus::Expired
            }
            (status, _) => status,
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == MembershipStatus::Active
    }
}

/// Request body for the public signup form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: MemberRole,
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default)]
    pub bacb_certification_number: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Admin edit of a member record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<MemberRole>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub credential: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub bacb_certification_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub organization: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub phone: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<MembershipStatus>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub membership_expires_at: Option<Option<DateTime<Utc>>>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Result of a signup or renewal: the member plus the dues payment to complete.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipCheckout {
    pub member: Member,
    pub payment: super::PaymentInstructions,
}

/// Public answer to "is this email a member?".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberLookup {
    pub first_name: String,
    pub last_name: String,
    pub role: MemberRole,
    pub status: MembershipStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_expires_at: Option<DateTime<Utc>>,
}

impl MemberLookup {
    pub fn from_member(member: &Member, now: DateTime<Utc>) -> Self {
        Self {
            first_name: member.first_name.clone(),
            last_name: member.last_name.clone(),
            role: member.role,
            status: member.effective_status(now),
            membership_expires_at: member.membership_expires_at,
        }
    }
}
