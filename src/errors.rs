use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::BookingStatus;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid input: {message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, Vec<String>>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("cannot move booking from {current} to {requested}")]
    InvalidTransition {
        current: BookingStatus,
        requested: BookingStatus,
    },

    #[error("that time slot is already booked for this professional")]
    SlotConflict,

    #[error("you cannot book a service you provide yourself")]
    SelfBooking,

    #[error("service is not accepting bookings")]
    Inactive,

    #[error("booking is already {0}")]
    TerminalState(BookingStatus),

    #[error("only completed bookings can be reviewed")]
    NotCompleted,

    #[error("this booking has already been reviewed")]
    AlreadyReviewed,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Single-field validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), vec![message.clone()]);
        AppError::Validation {
            message: format!("{field}: {message}"),
            fields,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::SlotConflict => "slot_conflict",
            AppError::SelfBooking => "self_booking",
            AppError::Inactive => "inactive",
            AppError::TerminalState(_) => "terminal_state",
            AppError::NotCompleted => "not_completed",
            AppError::AlreadyReviewed => "already_reviewed",
            AppError::Database(_) | AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{err:#}"))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (field, errs) in errors.field_errors() {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        let message = fields.keys().cloned().collect::<Vec<_>>().join(", ");
        AppError::Validation {
            message: format!("invalid fields: {message}"),
            fields,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let detail = rejection.body_text();
        AppError::invalid(rejected_field(&detail), detail.clone())
    }
}

/// Best-effort field name from a JSON body rejection, `body` when none is named.
fn rejected_field(detail: &str) -> &str {
    if let Some(name) = detail
        .split("missing field `")
        .nth(1)
        .and_then(|rest| rest.split('`').next())
    {
        return name;
    }
    detail
        .split("target type: ")
        .nth(1)
        .and_then(|rest| rest.split_once(": "))
        .map(|(path, _)| path)
        .filter(|path| !path.is_empty() && !path.contains(' '))
        .unwrap_or("body")
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::SlotConflict => StatusCode::CONFLICT,
            AppError::SelfBooking => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Inactive => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::TerminalState(_) => StatusCode::CONFLICT,
            AppError::NotCompleted => StatusCode::CONFLICT,
            AppError::AlreadyReviewed => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        });

        match &self {
            AppError::Validation { fields, .. } => {
                body["fields"] = serde_json::json!(fields);
            }
            AppError::InvalidTransition { current, requested } => {
                body["current"] = serde_json::json!(current.as_str());
                body["requested"] = serde_json::json!(requested.as_str());
            }
            AppError::TerminalState(current) => {
                body["current"] = serde_json::json!(current.as_str());
            }
            AppError::Database(_) | AppError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                body["message"] = serde_json::json!("internal error");
            }
            _ => {}
        }

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_builds_field_map() {
        let err = AppError::invalid("scheduled_at", "not a valid date");
        match err {
            AppError::Validation { fields, .. } => {
                assert_eq!(fields["scheduled_at"], vec!["not a valid date".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_rejected_field_names() {
        assert_eq!(
            rejected_field(
                "Failed to deserialize the JSON body into the target type: missing field `scheduled_at` at line 1 column 18"
            ),
            "scheduled_at"
        );
        assert_eq!(
            rejected_field(
                "Failed to deserialize the JSON body into the target type: rating: invalid type: string \"5\", expected i32 at line 1 column 14"
            ),
            "rating"
        );
        assert_eq!(rejected_field("Failed to parse the request body as JSON: EOF while parsing"), "body");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::SlotConflict.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Forbidden("x".into()).into_response().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::SelfBooking.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::Internal("boom".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
