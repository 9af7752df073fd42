//! Maps domain failures onto HTTP responses.

use crate::error::LedgerError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug)]
pub struct ApiError(pub LedgerError);

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    available: Option<i32>,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            LedgerError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            LedgerError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            LedgerError::Unauthenticated => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            LedgerError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            LedgerError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            LedgerError::ProductNotFound(_) => (StatusCode::NOT_FOUND, "PRODUCT_NOT_FOUND"),
            LedgerError::DuplicateHandle => (StatusCode::CONFLICT, "DUPLICATE_USERNAME"),
            LedgerError::InsufficientStock { .. } => (StatusCode::CONFLICT, "INSUFFICIENT_STOCK"),
            LedgerError::Storage(_)
            | LedgerError::Export(_)
            | LedgerError::Overflow(_)
            | LedgerError::Task(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR")
            }
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "request failed");
            "An internal error occurred".to_string()
        } else {
            self.0.to_string()
        };
        let available = match &self.0 {
            LedgerError::InsufficientStock { available, .. } => Some(*available),
            _ => None,
        };

        let body = ErrorResponse {
            code,
            message,
            available,
        };
        (status, Json(body)).into_response()
    }
}
