use chrono::NaiveDateTime;

use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Party};

/// Moves `booking` to `requested` on behalf of `actor_id`.
///
/// Pure: the caller persists the returned booking. Checks run in a fixed
/// order: the actor must be a party to the booking, the move must be in the
/// transition table, and only the professional may start or complete work.
pub fn apply_transition(
    booking: &Booking,
    requested: BookingStatus,
    actor_id: &str,
    reason: Option<&str>,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let party = booking
        .party_of(actor_id)
        .ok_or_else(|| AppError::Forbidden("not a participant in this booking".to_string()))?;

    if !booking.status.can_transition_to(requested) {
        tracing::debug!(
            booking_id = %booking.id,
            current = %booking.status,
            requested = %requested,
            "rejected transition"
        );
        return Err(AppError::InvalidTransition {
            current: booking.status,
            requested,
        });
    }

    if requires_professional(requested) && party != Party::Professional {
        return Err(AppError::Forbidden(format!(
            "only the professional can move a booking to {requested}"
        )));
    }

    let mut next = booking.clone();
    next.status = requested;
    next.updated_at = now;

    match requested {
        BookingStatus::Confirmed => next.confirmed_at = Some(now),
        BookingStatus::Completed => next.completed_at = Some(now),
        BookingStatus::Cancelled => {
            next.cancelled_at = Some(now);
            next.cancellation_reason = reason
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string);
        }
        BookingStatus::InProgress | BookingStatus::Pending => {}
    }

    Ok(next)
}

fn requires_professional(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::InProgress | BookingStatus::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT: &str = "client-1";
    const PRO: &str = "pro-1";

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn booking(status: BookingStatus) -> Booking {
        let created = dt("2025-05-01 09:00");
        Booking {
            id: "bk-1".to_string(),
            client_id: CLIENT.to_string(),
            professional_id: PRO.to_string(),
            service_id: "svc-1".to_string(),
            status,
            scheduled_at: dt("2025-06-02 14:00"),
            duration_minutes: 60,
            total_price: 50000.0,
            notes: None,
            confirmed_at: None,
            cancelled_at: None,
            completed_at: None,
            cancellation_reason: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn is_allowed(from: BookingStatus, to: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (from, to),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, InProgress)
                | (Confirmed, Cancelled)
                | (Confirmed, Completed)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }

    #[test]
    fn test_every_pair_outside_table_is_rejected() {
        let now = dt("2025-06-01 10:00");
        for from in BookingStatus::ALL {
            for to in BookingStatus::ALL {
                let original = booking(from);
                let result = apply_transition(&original, to, PRO, None, now);
                if is_allowed(from, to) {
                    let next = result.unwrap();
                    assert_eq!(next.status, to);
                } else {
                    match result {
                        Err(AppError::InvalidTransition { current, requested }) => {
                            assert_eq!(current, from);
                            assert_eq!(requested, to);
                        }
                        other => panic!("{from} -> {to}: expected InvalidTransition, got {other:?}"),
                    }
                    assert_eq!(original, booking(from));
                }
            }
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        let now = dt("2025-06-01 10:00");
        for terminal in [BookingStatus::Completed, BookingStatus::Cancelled] {
            for to in BookingStatus::ALL {
                for actor in [CLIENT, PRO] {
                    assert!(apply_transition(&booking(terminal), to, actor, None, now).is_err());
                }
            }
        }
    }

    #[test]
    fn test_client_cannot_start_or_complete() {
        let now = dt("2025-06-01 10:00");
        let cases = [
            (BookingStatus::Confirmed, BookingStatus::InProgress),
            (BookingStatus::Confirmed, BookingStatus::Completed),
            (BookingStatus::InProgress, BookingStatus::Completed),
        ];
        for (from, to) in cases {
            let result = apply_transition(&booking(from), to, CLIENT, None, now);
            assert!(matches!(result, Err(AppError::Forbidden(_))), "{from} -> {to}");
        }
    }

    #[test]
    fn test_either_party_can_confirm_or_cancel() {
        let now = dt("2025-06-01 10:00");
        for actor in [CLIENT, PRO] {
            assert!(apply_transition(&booking(BookingStatus::Pending), BookingStatus::Confirmed, actor, None, now).is_ok());
            assert!(apply_transition(&booking(BookingStatus::InProgress), BookingStatus::Cancelled, actor, None, now).is_ok());
        }
    }

    #[test]
    fn test_stranger_is_forbidden() {
        let now = dt("2025-06-01 10:00");
        let result = apply_transition(
            &booking(BookingStatus::Pending),
            BookingStatus::Confirmed,
            "someone-else",
            None,
            now,
        );
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[test]
    fn test_timestamps_match_new_status() {
        let now = dt("2025-06-01 10:00");

        let confirmed =
            apply_transition(&booking(BookingStatus::Pending), BookingStatus::Confirmed, PRO, None, now).unwrap();
        assert_eq!(confirmed.confirmed_at, Some(now));
        assert!(confirmed.cancelled_at.is_none());
        assert!(confirmed.completed_at.is_none());

        let later = dt("2025-06-02 15:00");
        let completed =
            apply_transition(&confirmed, BookingStatus::Completed, PRO, None, later).unwrap();
        assert_eq!(completed.completed_at, Some(later));
        assert_eq!(completed.confirmed_at, Some(now));
        assert!(completed.cancelled_at.is_none());

        let started =
            apply_transition(&confirmed, BookingStatus::InProgress, PRO, None, later).unwrap();
        assert!(started.completed_at.is_none());
        assert!(started.cancelled_at.is_none());
        assert_eq!(started.updated_at, later);
    }

    #[test]
    fn test_cancellation_records_reason() {
        let now = dt("2025-06-01 10:00");
        let cancelled = apply_transition(
            &booking(BookingStatus::Pending),
            BookingStatus::Cancelled,
            CLIENT,
            Some("  found someone closer "),
            now,
        )
        .unwrap();
        assert_eq!(cancelled.cancelled_at, Some(now));
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("found someone closer"));
        assert!(cancelled.completed_at.is_none());

        let blank = apply_transition(
            &booking(BookingStatus::Pending),
            BookingStatus::Cancelled,
            CLIENT,
            Some("   "),
            now,
        )
        .unwrap();
        assert!(blank.cancellation_reason.is_none());
    }
}
