use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::handlers::extract::AppJson;
use crate::models::{Booking, BookingStatus, RatingSummary, Role, Session, User};
use crate::services::auth::bearer_token;
use crate::services::reviews;
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    match bearer_token(headers) {
        Some(token) if token == expected_token => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

// GET /api/admin/status
#[derive(Serialize)]
pub struct StatusResponse {
    bookings: serde_json::Map<String, serde_json::Value>,
    users: i64,
    services: i64,
    conflict_mode: &'static str,
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let (by_status, users, services) = {
        let conn = db::lock(&state.db)?;
        (
            queries::count_bookings_by_status(&conn)?,
            queries::count_users(&conn)?,
            queries::count_services(&conn)?,
        )
    };

    let bookings = by_status
        .into_iter()
        .map(|(status, count)| (status.as_str().to_string(), serde_json::Value::from(count)))
        .collect::<serde_json::Map<_, _>>();

    Ok(Json(StatusResponse {
        bookings,
        users,
        services,
        conflict_mode: state.config.conflict_mode.as_str(),
    }))
}

// POST /api/admin/users
#[derive(Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 200, message = "must be 1 to 200 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub role: String,
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    AppJson(body): AppJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    body.validate()?;
    let role = Role::parse(&body.role)
        .ok_or_else(|| AppError::invalid("role", "must be CLIENT, PROFESSIONAL or ADMIN"))?;

    let user = {
        let conn = db::lock(&state.db)?;
        queries::create_user(&conn, body.name.trim(), body.email.trim(), role).map_err(|e| {
            if db::is_unique_violation(&e) {
                AppError::invalid("email", "is already registered")
            } else {
                e.into()
            }
        })?
    };
    tracing::info!(user_id = %user.id, role = user.role.as_str(), "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

// POST /api/admin/users/:id/sessions
pub async fn issue_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let session = {
        let conn = db::lock(&state.db)?;
        if queries::get_user(&conn, &user_id)?.is_none() {
            return Err(AppError::NotFound("user".to_string()));
        }
        queries::create_session(&conn, &user_id, state.config.session_ttl_hours)?
    };
    tracing::info!(%user_id, expires_at = %session.expires_at, "session issued");
    Ok((StatusCode::CREATED, Json(session)))
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            BookingStatus::parse(raw)
                .ok_or_else(|| AppError::invalid("status", format!("unknown status {raw:?}")))?,
        ),
    };
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    let bookings = {
        let conn = db::lock(&state.db)?;
        queries::get_all_bookings(&conn, status, limit)?
    };
    Ok(Json(bookings))
}

// POST /api/admin/professionals/:id/reconcile-rating
pub async fn reconcile_rating(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(professional_id): Path<String>,
) -> Result<Json<RatingSummary>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    Ok(Json(reviews::reconcile_rating(&state, &professional_id)?))
}
