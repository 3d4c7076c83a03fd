use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;

use crate::errors::AppError;
use crate::services::auth::{Actor, Resolution};
use crate::state::AppState;

/// Authenticated caller, resolved through the credential chain.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        match state.credentials.resolve(&parts.headers).await? {
            Resolution::Resolved(actor) => Ok(actor),
            Resolution::Unresolved => Err(AppError::Unauthorized),
        }
    }
}

/// JSON request body whose rejections render as `AppError` validation failures.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
