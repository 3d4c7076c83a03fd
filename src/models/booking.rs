use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: String,
    pub client_id: String,
    pub professional_id: String,
    pub service_id: String,
    pub status: BookingStatus,
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: i32,
    pub total_price: f64,
    pub notes: Option<String>,
    pub confirmed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub cancellation_reason: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.client_id == user_id || self.professional_id == user_id
    }

    /// The role `user_id` plays on this booking, if any.
    pub fn party_of(&self, user_id: &str) -> Option<Party> {
        if self.professional_id == user_id {
            Some(Party::Professional)
        } else if self.client_id == user_id {
            Some(Party::Client)
        } else {
            None
        }
    }

    pub fn counterpart_of(&self, user_id: &str) -> Option<&str> {
        match self.party_of(user_id)? {
            Party::Client => Some(&self.professional_id),
            Party::Professional => Some(&self.client_id),
        }
    }

    /// `None` when the end falls outside the representable range.
    pub fn ends_at(&self) -> Option<NaiveDateTime> {
        self.scheduled_at
            .checked_add_signed(chrono::Duration::minutes(self.duration_minutes as i64))
    }

    /// Appends a line to the notes log. Existing content is never rewritten.
    pub fn append_note(&mut self, at: NaiveDateTime, party: Party, message: &str) {
        let line = note_line(at, party, message);
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.is_empty() => format!("{existing}\n{line}"),
            _ => line,
        });
    }
}

pub fn note_line(at: NaiveDateTime, party: Party, message: &str) -> String {
    format!(
        "[{}] {}: {}",
        at.format("%Y-%m-%d %H:%M"),
        party.as_str(),
        message.trim()
    )
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub const ACTIVE: [BookingStatus; 3] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "IN_PROGRESS" => Some(BookingStatus::InProgress),
            "COMPLETED" => Some(BookingStatus::Completed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn allowed_transitions(&self) -> &'static [BookingStatus] {
        match self {
            BookingStatus::Pending => &[BookingStatus::Confirmed, BookingStatus::Cancelled],
            BookingStatus::Confirmed => &[
                BookingStatus::InProgress,
                BookingStatus::Cancelled,
                BookingStatus::Completed,
            ],
            BookingStatus::InProgress => &[BookingStatus::Completed, BookingStatus::Cancelled],
            BookingStatus::Completed | BookingStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a booking a user is on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Client,
    Professional,
}

impl Party {
    pub fn as_str(&self) -> &'static str {
        match self {
            Party::Client => "client",
            Party::Professional => "professional",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Some(Party::Client),
            "professional" => Some(Party::Professional),
            _ => None,
        }
    }
}

/// Everything needed to insert a new booking row.
#[derive(Debug, Clone)]
pub struct BookingDraft {
    pub client_id: String,
    pub professional_id: String,
    pub service_id: String,
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: i32,
    pub total_price: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilters {
    pub status: Option<BookingStatus>,
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_strings() {
        for status in BookingStatus::ALL {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("in_progress"), Some(BookingStatus::InProgress));
        assert_eq!(BookingStatus::parse("done"), None);
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        assert!(BookingStatus::Completed.allowed_transitions().is_empty());
        assert!(BookingStatus::Cancelled.allowed_transitions().is_empty());
        assert!(BookingStatus::Confirmed.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::InProgress));
    }

    #[test]
    fn test_notes_are_appended() {
        let at = NaiveDateTime::parse_from_str("2025-06-01 09:30", "%Y-%m-%d %H:%M").unwrap();
        let mut booking = Booking {
            id: "b".to_string(),
            client_id: "c".to_string(),
            professional_id: "p".to_string(),
            service_id: "s".to_string(),
            status: BookingStatus::Pending,
            scheduled_at: at,
            duration_minutes: 30,
            total_price: 1.0,
            notes: None,
            confirmed_at: None,
            cancelled_at: None,
            completed_at: None,
            cancellation_reason: None,
            created_at: at,
            updated_at: at,
        };
        booking.append_note(at, Party::Client, " please bring tools ");
        booking.append_note(at, Party::Professional, "will do");
        assert_eq!(
            booking.notes.as_deref(),
            Some("[2025-06-01 09:30] client: please bring tools\n[2025-06-01 09:30] professional: will do")
        );
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        let json = serde_json::to_string(&BookingStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }
}
