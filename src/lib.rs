pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// All HTTP routes, without middleware layers.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/bookings",
            post(handlers::bookings::create_booking).get(handlers::bookings::list_bookings),
        )
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/status",
            post(handlers::bookings::change_status),
        )
        .route(
            "/api/bookings/:id/reschedule",
            post(handlers::bookings::reschedule),
        )
        .route("/api/bookings/:id/notes", post(handlers::bookings::add_note))
        .route(
            "/api/bookings/:id/calendar.ics",
            get(handlers::calendar::download_ics),
        )
        .route(
            "/api/bookings/:id/review",
            post(handlers::reviews::create_review),
        )
        .route(
            "/api/professionals/:id",
            get(handlers::reviews::get_professional),
        )
        .route(
            "/api/professionals/:id/reviews",
            get(handlers::reviews::list_reviews),
        )
        .route(
            "/api/services",
            post(handlers::services::create_service).get(handlers::services::list_services),
        )
        .route("/api/services/:id", get(handlers::services::get_service))
        .route(
            "/api/services/:id/active",
            post(handlers::services::set_active),
        )
        .route(
            "/api/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route(
            "/api/notifications/events",
            get(handlers::notifications::events_stream),
        )
        .route(
            "/api/notifications/:id/read",
            post(handlers::notifications::mark_read),
        )
        .route("/api/admin/status", get(handlers::admin::get_status))
        .route("/api/admin/users", post(handlers::admin::create_user))
        .route(
            "/api/admin/users/:id/sessions",
            post(handlers::admin::issue_session),
        )
        .route("/api/admin/bookings", get(handlers::admin::get_bookings))
        .route(
            "/api/admin/professionals/:id/reconcile-rating",
            post(handlers::admin::reconcile_rating),
        )
        .with_state(state)
}
