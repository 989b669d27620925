//! CEU course model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// BACB continuing-education category a course counts toward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CeuCategory {
    General,
    Ethics,
    Supervision,
    Dei,
}

impl CeuCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CeuCategory::General => "general",
            CeuCategory::Ethics => "ethics",
            CeuCategory::Supervision => "supervision",
            CeuCategory::Dei => "dei",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "general" => Some(CeuCategory::General),
            "ethics" => Some(CeuCategory::Ethics),
            "supervision" => Some(CeuCategory::Supervision),
            "dei" => Some(CeuCategory::Dei),
            _ => None,
        }
    }
}

/// How a course is delivered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CourseFormat {
    InPerson,
    Online,
    Hybrid,
}

impl CourseFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseFormat::InPerson => "in_person",
            CourseFormat::Online => "online",
            CourseFormat::Hybrid => "hybrid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_person" => Some(CourseFormat::InPerson),
            "online" => Some(CourseFormat::Online),
            "hybrid" => Some(CourseFormat::Hybrid),
            _ => None,
        }
    }
}

/// A course offering continuing education units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub instructor: String,
    pub ceu_credits: f64,
    pub ceu_category: CeuCategory,
    pub format: CourseFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    pub price_cents: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bacb_provider_number: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: i64,
}

/// Request body for creating a course.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: String,
    pub instructor: String,
    pub ceu_credits: f64,
    #[serde(default = "default_category")]
    pub ceu_category: CeuCategory,
    #[serde(default = "default_format")]
    pub format: CourseFormat,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub registration_url: Option<String>,
    #[serde(default)]
    pub bacb_provider_number: Option<String>,
    #[serde(default = "default_published")]
    pub published: bool,
}

fn default_category() -> CeuCategory {
    CeuCategory::General
}

fn default_format() -> CourseFormat {
    CourseFormat::Online
}

fn default_published() -> bool {
    true
}

/// Request body for updating a course.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCourseRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub ceu_credits: Option<f64>,
    #[serde(default)]
    pub ceu_category: Option<CeuCategory>,
    #[serde(default)]
    pub format: Option<CourseFormat>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub starts_at: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub price_cents: Option<i64>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub registration_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub bacb_provider_number: Option<Option<String>>,
    #[serde(default)]
    pub published: Option<bool>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}
