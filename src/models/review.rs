use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: String,
    pub booking_id: String,
    pub client_id: String,
    pub professional_id: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Aggregate rating of a professional, always derived from every review.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct RatingSummary {
    pub rating: f64,
    pub review_count: i64,
}
