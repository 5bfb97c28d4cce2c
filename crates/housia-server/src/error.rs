use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use housia_core::error::AppError;

use crate::dto::ErrorResponse;

/// Wrapper so we can implement `IntoResponse` for `AppError`.
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self.0 {
            AppError::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::DuplicateError(_) => (StatusCode::CONFLICT, "duplicate"),
            AppError::ConnectionError(_) => (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable"),
            AppError::PersistenceError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "persistence_error"),
            AppError::StatusStoreError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "status_store_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: self.0.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}
