use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::services::auth::Actor;
use crate::services::bookings;
use crate::services::calendar::generate_ics;
use crate::state::AppState;

// GET /api/bookings/:id/calendar.ics
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(booking_id): Path<String>,
) -> Result<Response, AppError> {
    let booking = bookings::get_booking(&state, &actor, &booking_id)?;

    let (service_title, professional_name) = {
        let conn = db::lock(&state.db)?;
        let title = queries::get_service(&conn, &booking.service_id)?
            .map(|s| s.title)
            .unwrap_or_else(|| "Booking".to_string());
        let name = queries::get_user(&conn, &booking.professional_id)?
            .map(|u| u.name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "your professional".to_string());
        (title, name)
    };

    let ics = generate_ics(&booking, &service_title, &professional_name)?;
    let filename = format!("booking-{}.ics", booking.id);

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response())
}
