use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use crate::errors::AppError;
use crate::handlers::extract::AppJson;
use crate::handlers::{parse_optional_timestamp, parse_timestamp};
use crate::models::{Booking, BookingFilters, BookingStatus, Page, Pagination, Party};
use crate::services::auth::Actor;
use crate::services::bookings::{self, NewBooking};
use crate::state::AppState;

// POST /api/bookings
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookingRequest {
    #[serde(alias = "serviceId")]
    #[validate(length(min = 1, message = "is required"))]
    pub service_id: String,
    #[serde(alias = "scheduledAt")]
    pub scheduled_at: String,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub notes: Option<String>,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    AppJson(body): AppJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    body.validate()?;
    let scheduled_at = parse_timestamp("scheduled_at", &body.scheduled_at)?;

    let booking = bookings::create_booking(
        &state,
        &actor,
        NewBooking {
            service_id: body.service_id,
            scheduled_at,
            notes: body.notes,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

// POST /api/bookings/:id/status
#[derive(Debug, Deserialize, Validate)]
pub struct StatusRequest {
    pub status: String,
    #[validate(length(max = 500, message = "must be at most 500 characters"))]
    pub reason: Option<String>,
}

pub async fn change_status(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    AppJson(body): AppJson<StatusRequest>,
) -> Result<Json<Booking>, AppError> {
    body.validate()?;
    let requested = BookingStatus::parse(&body.status)
        .ok_or_else(|| AppError::invalid("status", format!("unknown status {:?}", body.status)))?;

    let booking =
        bookings::change_booking_status(&state, &actor, &id, requested, body.reason.as_deref()).await?;
    Ok(Json(booking))
}

// POST /api/bookings/:id/reschedule
#[derive(Debug, Deserialize, Validate)]
pub struct RescheduleRequest {
    #[serde(alias = "scheduledAt", alias = "newScheduledAt")]
    pub scheduled_at: String,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub message: Option<String>,
}

pub async fn reschedule(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    AppJson(body): AppJson<RescheduleRequest>,
) -> Result<Json<Booking>, AppError> {
    body.validate()?;
    let new_time = parse_timestamp("scheduled_at", &body.scheduled_at)?;

    let booking =
        bookings::reschedule_booking(&state, &actor, &id, new_time, body.message.as_deref()).await?;
    Ok(Json(booking))
}

// GET /api/bookings
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "as")]
    pub side: Option<String>,
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Booking>>, AppError> {
    let party = match query.side.as_deref() {
        None => Party::Client,
        Some(raw) => Party::parse(raw)
            .ok_or_else(|| AppError::invalid("as", "must be client or professional"))?,
    };
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            BookingStatus::parse(s).ok_or_else(|| AppError::invalid("status", format!("unknown status {s:?}")))
        })
        .transpose()?;
    let filters = BookingFilters {
        status,
        from: parse_optional_timestamp("from", query.from.as_deref())?,
        to: parse_optional_timestamp("to", query.to.as_deref())?,
    };

    let page = bookings::list_bookings(
        &state,
        &actor,
        party,
        &filters,
        Pagination::new(query.page, query.limit),
    )?;
    Ok(Json(page))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(bookings::get_booking(&state, &actor, &id)?))
}

// POST /api/bookings/:id/notes
#[derive(Debug, Deserialize, Validate)]
pub struct NoteRequest {
    #[validate(length(min = 1, max = 2000, message = "must be 1 to 2000 characters"))]
    pub message: String,
}

pub async fn add_note(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    AppJson(body): AppJson<NoteRequest>,
) -> Result<Json<Booking>, AppError> {
    body.validate()?;
    Ok(Json(bookings::add_note(&state, &actor, &id, &body.message)?))
}
