//! HTTP error envelope and status mapping.
//!
//! Domain rejections map to client statuses (409 for state conflicts,
//! 400 for bad input, 422 for empty finalization, 404 for missing
//! entities); persistence and integration failures map to 503.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use pozinox_core::errors::DomainError;
use pozinox_db::repositories::RepositoryError;
use pozinox_storage::StorageError;

use crate::payments::PaymentError;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub body: ApiError,
}

impl ApiFailure {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, body: ApiError { error: message.into() } }
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, format!("{what} was not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<DomainError> for ApiFailure {
    fn from(error: DomainError) -> Self {
        let status = match &error {
            DomainError::InvalidState { .. } | DomainError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            DomainError::InvalidArgument(_) | DomainError::InsufficientStock { .. } => {
                StatusCode::BAD_REQUEST
            }
            DomainError::EmptyQuotation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::ProductNotFound { .. } | DomainError::LineNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            DomainError::InactiveProduct { .. } => StatusCode::CONFLICT,
        };
        Self::new(status, error.to_string())
    }
}

impl From<RepositoryError> for ApiFailure {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Conflict(message) => Self::new(StatusCode::CONFLICT, message),
            other => {
                error!(event_name = "http.persistence_failure", error = %other);
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "persistence failure")
            }
        }
    }
}

impl From<StorageError> for ApiFailure {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound { name } => Self::not_found(&format!("object `{name}`")),
            StorageError::InvalidName { .. } => Self::bad_request(error.to_string()),
            other => {
                error!(event_name = "http.storage_failure", error = %other);
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "storage failure")
            }
        }
    }
}

impl From<PaymentError> for ApiFailure {
    fn from(error: PaymentError) -> Self {
        error!(event_name = "http.payment_failure", error = %error);
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "payment gateway failure")
    }
}
