use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::handlers::extract::AppJson;
use crate::models::{Page, Pagination, PriceType, Service, ServiceDraft};
use crate::services::auth::Actor;
use crate::services::catalog;
use crate::state::AppState;

// POST /api/services
#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    #[serde(alias = "priceType")]
    pub price_type: String,
    #[serde(alias = "durationMinutes")]
    pub duration_minutes: i32,
}

pub async fn create_service(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    AppJson(body): AppJson<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Service>), AppError> {
    let price_type = PriceType::parse(&body.price_type)
        .ok_or_else(|| AppError::invalid("price_type", "must be PER_JOB or PER_HOUR"))?;
    let draft = ServiceDraft {
        title: body.title.trim().to_string(),
        description: body
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
        price: body.price,
        price_type,
        duration_minutes: body.duration_minutes,
    };

    let service = catalog::create_service(&state, &actor, &draft)?;
    Ok((StatusCode::CREATED, Json(service)))
}

// GET /api/services
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_services(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Service>>, AppError> {
    let page = catalog::list_services(&state, Pagination::new(query.page, query.limit))?;
    Ok(Json(page))
}

// GET /api/services/:id
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Service>, AppError> {
    Ok(Json(catalog::get_service(&state, &id)?))
}

// POST /api/services/:id/active
#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

pub async fn set_active(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(id): Path<String>,
    AppJson(body): AppJson<ActiveRequest>,
) -> Result<Json<Service>, AppError> {
    Ok(Json(catalog::set_service_active(&state, &actor, &id, body.active)?))
}
