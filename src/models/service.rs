use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: String,
    pub professional_id: String,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub price_type: PriceType,
    pub duration_minutes: i32,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceType {
    PerJob,
    PerHour,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::PerJob => "PER_JOB",
            PriceType::PerHour => "PER_HOUR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PER_JOB" => Some(PriceType::PerJob),
            "PER_HOUR" => Some(PriceType::PerHour),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Validate)]
pub struct ServiceDraft {
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    pub title: String,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 0.0, message = "must not be negative"))]
    pub price: f64,
    pub price_type: PriceType,
    #[validate(range(min = 1, max = 1440, message = "must be between 1 and 1440 minutes"))]
    pub duration_minutes: i32,
}
