//! HTTP-facing error type.
//!
//! Bridges [`BookingError`] to HTTP responses, implementing Axum's
//! `IntoResponse` trait.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

use booker_core::BookingError;

/// Application error type for web handlers.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: String,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
        }
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 404 Not Found error.
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND".to_string(),
        )
    }

    /// Create a 409 Conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message.into(), code.into())
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match &err {
            BookingError::SlotUnavailable => {
                Self::conflict(err.to_string(), "SLOT_UNAVAILABLE")
            }
            BookingError::SlotHeld => Self::conflict(err.to_string(), "SLOT_HELD"),
            BookingError::OccupancyConflict => {
                Self::conflict(err.to_string(), "OCCUPANCY_CONFLICT")
            }
            BookingError::InvalidTransition { .. } => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                err.to_string(),
                "INVALID_TRANSITION".to_string(),
            ),
            BookingError::NotFound(id) => Self::not_found("Booking", id),
            BookingError::InvalidInput(_) => Self::bad_request(err.to_string()),
            BookingError::Transient(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                err.to_string(),
                "SERVICE_UNAVAILABLE".to_string(),
            ),
            BookingError::Internal(_) => Self::internal(err.to_string()),
        }
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = %self.status,
                code = %self.code,
                message = %self.message,
                "Internal server error"
            );
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booker_core::{BookingId, BookingStatus};

    #[test]
    fn booking_errors_map_to_expected_statuses() {
        let cases = [
            (BookingError::SlotUnavailable, StatusCode::CONFLICT),
            (BookingError::SlotHeld, StatusCode::CONFLICT),
            (BookingError::OccupancyConflict, StatusCode::CONFLICT),
            (
                BookingError::InvalidTransition {
                    from: BookingStatus::Finished,
                    to: BookingStatus::Seated,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                BookingError::NotFound(BookingId::new()),
                StatusCode::NOT_FOUND,
            ),
            (
                BookingError::InvalidInput("x".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                BookingError::Transient("x".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                BookingError::Internal("x".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let app_err = AppError::from(err);
            assert_eq!(app_err.status, expected);
        }
    }

    #[test]
    fn display_includes_code() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }
}
