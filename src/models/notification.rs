use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationType,
    pub booking_id: Option<String>,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    BookingRequest,
    BookingConfirmed,
    ServiceStarted,
    BookingCancelled,
    ServiceCompleted,
    NewReview,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::BookingRequest => "BOOKING_REQUEST",
            NotificationType::BookingConfirmed => "BOOKING_CONFIRMED",
            NotificationType::ServiceStarted => "SERVICE_STARTED",
            NotificationType::BookingCancelled => "BOOKING_CANCELLED",
            NotificationType::ServiceCompleted => "SERVICE_COMPLETED",
            NotificationType::NewReview => "NEW_REVIEW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BOOKING_REQUEST" => Some(NotificationType::BookingRequest),
            "BOOKING_CONFIRMED" => Some(NotificationType::BookingConfirmed),
            "SERVICE_STARTED" => Some(NotificationType::ServiceStarted),
            "BOOKING_CANCELLED" => Some(NotificationType::BookingCancelled),
            "SERVICE_COMPLETED" => Some(NotificationType::ServiceCompleted),
            "NEW_REVIEW" => Some(NotificationType::NewReview),
            _ => None,
        }
    }
}

/// A notification the core wants delivered; storage and push belong to the sink.
#[derive(Clone, Debug, PartialEq)]
pub struct NotificationDraft {
    pub recipient_id: String,
    pub title: String,
    pub message: String,
    pub kind: NotificationType,
    pub booking_id: Option<String>,
}
