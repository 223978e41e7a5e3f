use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::db::StoreError;

/// Failures of the password-reset completion step.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ResetError {
    #[error("Invalid reset token")]
    InvalidToken,
    #[error("Reset token has expired")]
    Expired,
    #[error("Password confirmation doesn't match Password")]
    Mismatch,
    #[error("Password is too short (minimum is 8 characters)")]
    TooShort,
}

/// Error type returned by every handler and extractor.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication required")]
    AuthRequired,
    #[error("Invalid token")]
    InvalidToken,
    #[error("User not found")]
    UserNotFound,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Validation failed")]
    Validation(Vec<String>),
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Request could not be read: bad JSON body or query string.
    #[error("{0}")]
    BadRequest(&'static str),
    #[error(transparent)]
    Reset(#[from] ResetError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthRequired
            | AppError::InvalidToken
            | AppError::UserNotFound
            | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) | AppError::Reset(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => {
                AppError::Internal(anyhow::anyhow!("unexpected conflict on {what}"))
            }
            StoreError::Other(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::Validation(errors) => json!({ "errors": errors }),
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                json!({ "error": "Internal server error" })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
