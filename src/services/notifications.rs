use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::db::{self, queries};
use crate::models::{Booking, BookingStatus, Notification, NotificationDraft, NotificationType, Review};

/// Delivery side of notification fan-out: storage plus live push.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, drafts: &[NotificationDraft]) -> anyhow::Result<()>;
}

/// Stores notifications in the database and broadcasts them to live
/// subscribers of the event stream.
pub struct DbNotificationSink {
    db: Arc<Mutex<Connection>>,
    tx: broadcast::Sender<Notification>,
}

impl DbNotificationSink {
    pub fn new(db: Arc<Mutex<Connection>>, tx: broadcast::Sender<Notification>) -> Self {
        Self { db, tx }
    }
}

#[async_trait]
impl NotificationSink for DbNotificationSink {
    async fn emit(&self, drafts: &[NotificationDraft]) -> anyhow::Result<()> {
        let stored = {
            let conn = db::lock(&self.db).map_err(|e| anyhow::anyhow!("{e}"))?;
            let tx = conn.unchecked_transaction()?;
            let mut stored = Vec::with_capacity(drafts.len());
            for draft in drafts {
                stored.push(queries::insert_notification(&tx, draft)?);
            }
            tx.commit()?;
            stored
        };

        for notification in stored {
            // Broadcast to SSE subscribers; ignore if no receivers
            let _ = self.tx.send(notification);
        }
        Ok(())
    }
}

/// Hands drafts to the sink. Failures are logged and never reach the caller.
pub async fn dispatch(sink: &dyn NotificationSink, drafts: Vec<NotificationDraft>) {
    if drafts.is_empty() {
        return;
    }
    if let Err(e) = sink.emit(&drafts).await {
        tracing::warn!(error = %e, count = drafts.len(), "failed to emit notifications");
    }
}

/// Who hears about a change made by `actor_id`: the other party, plus the
/// professional even when they made the change themselves.
pub fn recipients(booking: &Booking, actor_id: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(2);
    if let Some(counterpart) = booking.counterpart_of(actor_id) {
        out.push(counterpart.to_string());
    }
    if !out.contains(&booking.professional_id) {
        out.push(booking.professional_id.clone());
    }
    out
}

fn when(booking: &Booking) -> String {
    booking.scheduled_at.format("%b %-d, %Y at %H:%M").to_string()
}

fn fan_out(
    booking: &Booking,
    actor_id: &str,
    kind: NotificationType,
    title: &str,
    message: String,
) -> Vec<NotificationDraft> {
    recipients(booking, actor_id)
        .into_iter()
        .map(|recipient_id| NotificationDraft {
            recipient_id,
            title: title.to_string(),
            message: message.clone(),
            kind,
            booking_id: Some(booking.id.clone()),
        })
        .collect()
}

pub fn for_transition(booking: &Booking, actor_id: &str, service_title: &str) -> Vec<NotificationDraft> {
    let when = when(booking);
    let (kind, title, message) = match booking.status {
        BookingStatus::Confirmed => (
            NotificationType::BookingConfirmed,
            "Booking confirmed",
            format!("The booking for {service_title} on {when} has been confirmed."),
        ),
        BookingStatus::InProgress => (
            NotificationType::ServiceStarted,
            "Service started",
            format!("Work on {service_title} scheduled for {when} has started."),
        ),
        BookingStatus::Completed => (
            NotificationType::ServiceCompleted,
            "Service completed",
            format!("{service_title} on {when} has been marked as completed."),
        ),
        BookingStatus::Cancelled => {
            let mut message = format!("The booking for {service_title} on {when} was cancelled.");
            if let Some(reason) = &booking.cancellation_reason {
                message.push_str(&format!(" Reason: {reason}"));
            }
            (NotificationType::BookingCancelled, "Booking cancelled", message)
        }
        BookingStatus::Pending => (
            NotificationType::BookingRequest,
            "Booking pending",
            format!("The booking for {service_title} on {when} is awaiting confirmation."),
        ),
    };
    fan_out(booking, actor_id, kind, title, message)
}

pub fn for_reschedule(
    booking: &Booking,
    actor_id: &str,
    service_title: &str,
    note: Option<&str>,
) -> Vec<NotificationDraft> {
    let mut message = format!("{service_title} has been moved to {}.", when(booking));
    if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
        message.push_str(&format!(" Message: {note}"));
    }
    fan_out(
        booking,
        actor_id,
        NotificationType::BookingRequest,
        "Reschedule requested",
        message,
    )
}

pub fn for_new_booking(booking: &Booking, service_title: &str) -> Vec<NotificationDraft> {
    vec![NotificationDraft {
        recipient_id: booking.professional_id.clone(),
        title: "New booking request".to_string(),
        message: format!("You have a new request for {service_title} on {}.", when(booking)),
        kind: NotificationType::BookingRequest,
        booking_id: Some(booking.id.clone()),
    }]
}

pub fn for_review(review: &Review, service_title: &str) -> Vec<NotificationDraft> {
    vec![NotificationDraft {
        recipient_id: review.professional_id.clone(),
        title: "New review".to_string(),
        message: format!("You received a {}-star review for {service_title}.", review.rating),
        kind: NotificationType::NewReview,
        booking_id: Some(review.booking_id.clone()),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn booking(status: BookingStatus) -> Booking {
        let at = NaiveDateTime::parse_from_str("2025-06-02 14:00", "%Y-%m-%d %H:%M").unwrap();
        Booking {
            id: "bk-1".to_string(),
            client_id: "client".to_string(),
            professional_id: "pro".to_string(),
            service_id: "svc".to_string(),
            status,
            scheduled_at: at,
            duration_minutes: 60,
            total_price: 10.0,
            notes: None,
            confirmed_at: None,
            cancelled_at: None,
            completed_at: None,
            cancellation_reason: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_professional_action_notifies_both() {
        let b = booking(BookingStatus::Confirmed);
        assert_eq!(recipients(&b, "pro"), vec!["client".to_string(), "pro".to_string()]);
    }

    #[test]
    fn test_client_action_notifies_professional_once() {
        let b = booking(BookingStatus::Cancelled);
        assert_eq!(recipients(&b, "client"), vec!["pro".to_string()]);
    }

    #[test]
    fn test_transition_types() {
        let cases = [
            (BookingStatus::Confirmed, NotificationType::BookingConfirmed),
            (BookingStatus::InProgress, NotificationType::ServiceStarted),
            (BookingStatus::Completed, NotificationType::ServiceCompleted),
            (BookingStatus::Cancelled, NotificationType::BookingCancelled),
        ];
        for (status, kind) in cases {
            let drafts = for_transition(&booking(status), "pro", "Haircut");
            assert_eq!(drafts.len(), 2);
            assert!(drafts.iter().all(|d| d.kind == kind));
            assert!(drafts.iter().all(|d| d.booking_id.as_deref() == Some("bk-1")));
        }
    }

    #[test]
    fn test_cancellation_message_carries_reason() {
        let mut b = booking(BookingStatus::Cancelled);
        b.cancellation_reason = Some("sick".to_string());
        let drafts = for_transition(&b, "client", "Haircut");
        assert!(drafts[0].message.contains("Reason: sick"));
        assert!(drafts[0].message.contains("Jun 2, 2025 at 14:00"));
    }

    #[test]
    fn test_reschedule_is_a_booking_request() {
        let b = booking(BookingStatus::Confirmed);
        let drafts = for_reschedule(&b, "client", "Haircut", Some("running late"));
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].recipient_id, "pro");
        assert_eq!(drafts[0].kind, NotificationType::BookingRequest);
        assert!(drafts[0].message.contains("running late"));
    }

    struct FailingSink(AtomicUsize);

    #[async_trait]
    impl NotificationSink for FailingSink {
        async fn emit(&self, _drafts: &[NotificationDraft]) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("sink down")
        }
    }

    #[tokio::test]
    async fn test_dispatch_swallows_sink_errors() {
        let sink = FailingSink(AtomicUsize::new(0));
        dispatch(&sink, for_new_booking(&booking(BookingStatus::Pending), "Haircut")).await;
        dispatch(&sink, vec![]).await;
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }
}
