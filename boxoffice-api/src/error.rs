use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use boxoffice_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    ServiceUnavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable, retry later".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(_) | CoreError::EventInPast { .. } => {
                AppError::ValidationError(err.to_string())
            }
            CoreError::EventNotFound(_)
            | CoreError::BookingNotFound(_)
            | CoreError::UserNotFound(_) => AppError::NotFoundError(err.to_string()),
            CoreError::InsufficientInventory { .. }
            | CoreError::InvalidStateTransition { .. }
            | CoreError::EmailTaken(_)
            | CoreError::PaymentInProgress(_) => AppError::ConflictError(err.to_string()),
            CoreError::TransientStoreFailure(_)
            | CoreError::QueueUnavailable(_)
            | CoreError::GatewayUnavailable(_) => AppError::ServiceUnavailable(err.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::ValidationError(rejection.body_text())
    }
}
