use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::ledger::LedgerError;
use crate::notify::NotifyError;
use crate::qr::DecodeError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Register number {0} is already registered")]
    DuplicateRegistration(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Incomplete record, missing: {}", .0.join(", "))]
    IncompleteRecord(Vec<&'static str>),

    #[error("Unknown registration: {0}")]
    UnknownRegistration(String),

    #[error("Register number {0} has already been checked in")]
    AlreadyUsed(String),

    #[error("Ledger sync failed: {0}")]
    LedgerSyncFailed(#[from] LedgerError),

    #[error("Notification failed: {0}")]
    NotificationFailed(#[from] NotifyError),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] DatabaseError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    /// Stable machine-readable code, used as `reason` in check-in responses.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::DuplicateRegistration(_) => "duplicate_registration",
            AppError::MalformedPayload(_) => "malformed_payload",
            AppError::IncompleteRecord(_) => "incomplete_record",
            AppError::UnknownRegistration(_) => "unknown_registration",
            AppError::AlreadyUsed(_) => "already_used",
            AppError::LedgerSyncFailed(_) => "ledger_sync_failed",
            AppError::NotificationFailed(_) => "notification_failed",
            AppError::StorageUnavailable(_) => "storage_unavailable",
            AppError::BadRequest(_) => "bad_request",
            AppError::InternalServerError(_) => "internal_error",
        }
    }

    /// Message safe to show to an attendee or desk operator.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::DuplicateRegistration(_) => {
                "You have already registered. Please check your details and try again."
            }
            AppError::MalformedPayload(_) => "Invalid QR code format.",
            AppError::IncompleteRecord(_) => "Missing required information in QR code.",
            AppError::UnknownRegistration(_) => "Registration not found. Please register first.",
            AppError::AlreadyUsed(_) => "This QR code has already been scanned.",
            AppError::LedgerSyncFailed(_) => {
                "Check-in was recorded but could not be saved to the event sheet. It will be retried automatically."
            }
            AppError::NotificationFailed(_) => {
                "Failed to send email with QR code. Please contact the event organizers."
            }
            AppError::StorageUnavailable(_) => {
                "The service is temporarily unavailable. Please try again shortly."
            }
            AppError::BadRequest(_) => "Please fill in all the required fields.",
            AppError::InternalServerError(_) => "An internal server error occurred.",
        }
    }
}

impl From<DecodeError> for AppError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Incomplete(missing) => AppError::IncompleteRecord(missing),
            other => AppError::MalformedPayload(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::DuplicateRegistration(_) | AppError::AlreadyUsed(_) => StatusCode::CONFLICT,
            AppError::MalformedPayload(_)
            | AppError::IncompleteRecord(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownRegistration(_) => StatusCode::NOT_FOUND,
            AppError::LedgerSyncFailed(_) | AppError::NotificationFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(code = self.code(), "Request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.user_message(),
                "details": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
