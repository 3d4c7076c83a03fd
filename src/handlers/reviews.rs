use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::AppError;
use crate::handlers::extract::AppJson;
use crate::models::{Page, Pagination, Review};
use crate::services::auth::Actor;
use crate::services::reviews;
use crate::state::AppState;

// POST /api/bookings/:id/review
#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 2000, message = "must be at most 2000 characters"))]
    pub comment: Option<String>,
}

pub async fn create_review(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(booking_id): Path<String>,
    AppJson(body): AppJson<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    body.validate()?;
    let review =
        reviews::create_review(&state, &actor, &booking_id, body.rating, body.comment.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

// GET /api/professionals/:id/reviews
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(professional_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Page<Review>>, AppError> {
    let page = reviews::list_reviews(&state, &professional_id, Pagination::new(query.page, query.limit))?;
    Ok(Json(page))
}

// GET /api/professionals/:id
#[derive(Serialize)]
pub struct ProfileResponse {
    id: String,
    name: String,
    rating: f64,
    review_count: i64,
    created_at: NaiveDateTime,
}

pub async fn get_professional(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = reviews::get_professional(&state, &id)?;
    Ok(Json(ProfileResponse {
        id: user.id,
        name: user.name,
        rating: user.rating,
        review_count: user.review_count,
        created_at: user.created_at,
    }))
}
