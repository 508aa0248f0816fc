use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::types::ApiResponse;

/// Message shown to a mentee whose reservation lost a race or hit a closed slot.
pub const SLOT_UNAVAILABLE_MESSAGE: &str = "slot no longer available, pick another";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Slot no longer available, pick another: {0}")]
    SlotUnavailable(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("In use: {0}")]
    InUse(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

// HTTP status code mapping
impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Authentication(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::Validation(_) => 400,
            AppError::Conflict(_)
            | AppError::SlotUnavailable(_)
            | AppError::InvalidTransition(_)
            | AppError::InvalidState(_)
            | AppError::InUse(_) => 409,
            AppError::Database(_) | AppError::Internal(_) => 500,
        }
    }

    pub fn error_code(&self) -> &str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Authentication(_) => "AUTHENTICATION_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::SlotUnavailable(_) => "SLOT_UNAVAILABLE",
            AppError::InvalidTransition(_) => "INVALID_TRANSITION",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::InUse(_) => "IN_USE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to the caller. Infrastructure failures are not echoed back.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "Internal server error".to_string(),
            AppError::SlotUnavailable(_) => SLOT_UNAVAILABLE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!("Request failed: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let body = ApiResponse::<()>::failure(self.error_code(), self.public_message());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_conflicts_map_to_409() {
        for err in [
            AppError::Conflict("dup".into()),
            AppError::SlotUnavailable("taken".into()),
            AppError::InvalidTransition("done".into()),
            AppError::InvalidState("no".into()),
            AppError::InUse("booked".into()),
        ] {
            assert_eq!(err.status_code(), 409, "{}", err.error_code());
        }
        assert_eq!(AppError::Forbidden("x".into()).status_code(), 403);
    }

    #[test]
    fn slot_unavailable_message_is_actionable() {
        let err = AppError::SlotUnavailable("occurrence already booked".into());
        assert_eq!(err.public_message(), SLOT_UNAVAILABLE_MESSAGE);
        assert_eq!(err.error_code(), "SLOT_UNAVAILABLE");
    }

    #[test]
    fn internal_details_are_hidden() {
        let err = AppError::Internal("pool exhausted".into());
        assert_eq!(err.public_message(), "Internal server error");
    }
}
