use rusqlite::Connection;
use validator::Validate;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{Page, Pagination, Role, Service, ServiceDraft};
use crate::services::auth::Actor;
use crate::state::AppState;

pub fn create_service(state: &AppState, actor: &Actor, draft: &ServiceDraft) -> Result<Service, AppError> {
    if actor.role != Role::Professional {
        return Err(AppError::Forbidden(
            "only professionals can offer services".to_string(),
        ));
    }
    draft.validate()?;

    let service = {
        let conn = db::lock(&state.db)?;
        queries::create_service(&conn, &actor.id, draft)?
    };
    tracing::info!(service_id = %service.id, professional_id = %actor.id, "service created");
    Ok(service)
}

pub fn get_service(state: &AppState, id: &str) -> Result<Service, AppError> {
    let conn = db::lock(&state.db)?;
    find_service(&conn, id)
}

pub fn list_services(state: &AppState, pagination: Pagination) -> Result<Page<Service>, AppError> {
    let conn = db::lock(&state.db)?;
    let (items, total) = queries::list_active_services(&conn, pagination.limit, pagination.offset())?;
    Ok(Page::new(items, total, pagination))
}

/// Owner-only switch that takes a service in or out of the bookable catalog.
/// Existing bookings are untouched.
pub fn set_service_active(
    state: &AppState,
    actor: &Actor,
    id: &str,
    active: bool,
) -> Result<Service, AppError> {
    let conn = db::lock(&state.db)?;
    let service = find_service(&conn, id)?;
    if service.professional_id != actor.id {
        return Err(AppError::Forbidden("not the owner of this service".to_string()));
    }

    queries::set_service_active(&conn, id, active)?;
    tracing::info!(service_id = %id, active, "service availability changed");
    find_service(&conn, id)
}

pub(crate) fn find_service(conn: &Connection, id: &str) -> Result<Service, AppError> {
    queries::get_service(conn, id)?.ok_or_else(|| AppError::NotFound("service".to_string()))
}

/// A service that can take new bookings right now.
pub fn get_active_service(conn: &Connection, id: &str) -> Result<Service, AppError> {
    let service = find_service(conn, id)?;
    if !service.is_active {
        return Err(AppError::Inactive);
    }
    Ok(service)
}

/// Title used in notification text; a missing service never blocks delivery.
pub(crate) fn service_title(conn: &Connection, id: &str) -> String {
    match queries::get_service(conn, id) {
        Ok(Some(service)) => service.title,
        Ok(None) => "your service".to_string(),
        Err(e) => {
            tracing::warn!(service_id = %id, error = %e, "failed to load service title");
            "your service".to_string()
        }
    }
}
