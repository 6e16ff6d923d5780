use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("no driver available")]
    NoDriverAvailable,

    #[error("concurrent transition in progress on ride {0}")]
    Concurrency(Uuid),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Transient failures the caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Concurrency(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::InvalidTransition(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::NoDriverAvailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "no driver available now, please try again later".to_string(),
            ),
            AppError::Concurrency(_) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message,
            "retryable": self.is_retryable(),
        }));

        (status, body).into_response()
    }
}
