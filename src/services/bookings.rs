use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::booking::note_line;
use crate::models::{Booking, BookingDraft, BookingFilters, BookingStatus, Page, Pagination, Party, Role};
use crate::services::auth::Actor;
use crate::services::{catalog, lifecycle, notifications, pricing, scheduling};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub service_id: String,
    pub scheduled_at: NaiveDateTime,
    pub notes: Option<String>,
}

/// Books `service_id` for the actor. The booking starts out PENDING with the
/// duration and price fixed from the service at this moment.
pub async fn create_booking(state: &AppState, actor: &Actor, input: NewBooking) -> Result<Booking, AppError> {
    let (booking, title) = {
        let conn = db::lock(&state.db)?;
        let service = catalog::get_active_service(&conn, &input.service_id)?;
        if service.professional_id == actor.id {
            return Err(AppError::SelfBooking);
        }

        let now = queries::now();
        let draft = BookingDraft {
            client_id: actor.id.clone(),
            professional_id: service.professional_id.clone(),
            service_id: service.id.clone(),
            scheduled_at: input.scheduled_at,
            duration_minutes: service.duration_minutes,
            total_price: pricing::total_price(service.price, service.price_type, service.duration_minutes),
            notes: input
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(|n| note_line(now, Party::Client, n)),
        };

        let tx = conn.unchecked_transaction()?;
        ensure_slot_free(&tx, state, &draft.professional_id, &draft.scheduled_at, draft.duration_minutes, None)?;
        let booking = queries::create_booking(&tx, &draft).map_err(slot_error)?;
        tx.commit()?;
        (booking, service.title)
    };

    tracing::info!(
        booking_id = %booking.id,
        client_id = %booking.client_id,
        professional_id = %booking.professional_id,
        scheduled_at = %booking.scheduled_at,
        "booking created"
    );
    notifications::dispatch(
        state.notifier.as_ref(),
        notifications::for_new_booking(&booking, &title),
    )
    .await;
    Ok(booking)
}

/// Applies a lifecycle transition and persists it with a compare-and-set on
/// the status read here. A concurrent change surfaces as InvalidTransition.
pub async fn change_booking_status(
    state: &AppState,
    actor: &Actor,
    booking_id: &str,
    requested: BookingStatus,
    reason: Option<&str>,
) -> Result<Booking, AppError> {
    let (updated, title) = {
        let conn = db::lock(&state.db)?;
        let current = find_booking(&conn, booking_id)?;
        let next = lifecycle::apply_transition(&current, requested, &actor.id, reason, queries::now())?;

        if !queries::update_booking(&conn, &next, current.status)? {
            let fresh = find_booking(&conn, booking_id)?;
            return Err(AppError::InvalidTransition {
                current: fresh.status,
                requested,
            });
        }
        (next, catalog::service_title(&conn, &current.service_id))
    };

    tracing::info!(
        booking_id = %updated.id,
        actor_id = %actor.id,
        status = %updated.status,
        "booking status changed"
    );
    notifications::dispatch(
        state.notifier.as_ref(),
        notifications::for_transition(&updated, &actor.id, &title),
    )
    .await;
    Ok(updated)
}

/// Moves a non-terminal booking to a new start time. Status is unchanged;
/// the optional message is appended to the notes log.
pub async fn reschedule_booking(
    state: &AppState,
    actor: &Actor,
    booking_id: &str,
    new_time: NaiveDateTime,
    message: Option<&str>,
) -> Result<Booking, AppError> {
    let message = message.map(str::trim).filter(|m| !m.is_empty());

    let (updated, title) = {
        let conn = db::lock(&state.db)?;
        let current = find_booking(&conn, booking_id)?;
        let party = current
            .party_of(&actor.id)
            .ok_or_else(|| AppError::Forbidden("not a participant in this booking".to_string()))?;
        if current.status.is_terminal() {
            return Err(AppError::TerminalState(current.status));
        }

        let now = queries::now();
        let mut next = current.clone();
        next.scheduled_at = new_time;
        next.updated_at = now;
        if let Some(message) = message {
            next.append_note(now, party, &format!("Reschedule request: {message}"));
        }

        let tx = conn.unchecked_transaction()?;
        ensure_slot_free(
            &tx,
            state,
            &current.professional_id,
            &new_time,
            current.duration_minutes,
            Some(&current.id),
        )?;
        if !queries::update_booking(&tx, &next, current.status).map_err(slot_error)? {
            let fresh = find_booking(&tx, booking_id)?;
            return Err(if fresh.status.is_terminal() {
                AppError::TerminalState(fresh.status)
            } else {
                AppError::InvalidTransition {
                    current: fresh.status,
                    requested: current.status,
                }
            });
        }
        tx.commit()?;
        (next, catalog::service_title(&conn, &current.service_id))
    };

    tracing::info!(
        booking_id = %updated.id,
        actor_id = %actor.id,
        scheduled_at = %updated.scheduled_at,
        "booking rescheduled"
    );
    notifications::dispatch(
        state.notifier.as_ref(),
        notifications::for_reschedule(&updated, &actor.id, &title, message),
    )
    .await;
    Ok(updated)
}

/// Appends a participant message to the notes log without touching status.
pub fn add_note(state: &AppState, actor: &Actor, booking_id: &str, message: &str) -> Result<Booking, AppError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(AppError::invalid("message", "must not be empty"));
    }

    let conn = db::lock(&state.db)?;
    let current = find_booking(&conn, booking_id)?;
    let party = current
        .party_of(&actor.id)
        .ok_or_else(|| AppError::Forbidden("not a participant in this booking".to_string()))?;

    let now = queries::now();
    let mut next = current.clone();
    next.append_note(now, party, message);
    next.updated_at = now;

    if !queries::update_booking(&conn, &next, current.status)? {
        let fresh = find_booking(&conn, booking_id)?;
        return Err(AppError::InvalidTransition {
            current: fresh.status,
            requested: current.status,
        });
    }
    Ok(next)
}

/// Participants and admins may read a booking; everyone else gets 403.
pub fn get_booking(state: &AppState, actor: &Actor, booking_id: &str) -> Result<Booking, AppError> {
    let conn = db::lock(&state.db)?;
    let booking = find_booking(&conn, booking_id)?;
    if !booking.is_participant(&actor.id) && actor.role != Role::Admin {
        return Err(AppError::Forbidden("not a participant in this booking".to_string()));
    }
    Ok(booking)
}

/// The actor's bookings from one side, newest scheduled first.
pub fn list_bookings(
    state: &AppState,
    actor: &Actor,
    party: Party,
    filters: &BookingFilters,
    pagination: Pagination,
) -> Result<Page<Booking>, AppError> {
    let conn = db::lock(&state.db)?;
    let (items, total) = queries::list_bookings_for_user(
        &conn,
        &actor.id,
        party,
        filters,
        pagination.limit,
        pagination.offset(),
    )?;
    Ok(Page::new(items, total, pagination))
}

pub(crate) fn find_booking(conn: &Connection, id: &str) -> Result<Booking, AppError> {
    queries::get_booking_by_id(conn, id)?.ok_or_else(|| AppError::NotFound("booking".to_string()))
}

fn ensure_slot_free(
    conn: &Connection,
    state: &AppState,
    professional_id: &str,
    scheduled_at: &NaiveDateTime,
    duration_minutes: i32,
    exclude_id: Option<&str>,
) -> Result<(), AppError> {
    let taken = scheduling::has_conflict(
        conn,
        state.config.conflict_mode,
        professional_id,
        scheduled_at,
        duration_minutes,
        exclude_id,
    )?;
    if taken {
        tracing::debug!(%professional_id, %scheduled_at, "slot already taken");
        return Err(AppError::SlotConflict);
    }
    Ok(())
}

/// The unique slot index is the last line of defence against a racing insert.
fn slot_error(err: anyhow::Error) -> AppError {
    if db::is_unique_violation(&err) {
        AppError::SlotConflict
    } else {
        err.into()
    }
}
