//! Error types for the SealJoin server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sealjoin_core::{SealJoinError, StoreError};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session has expired: {0}")]
    SessionExpired(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error(transparent)]
    Workflow(#[from] SealJoinError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Workflow(err.into())
    }
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
            ApiError::SessionExpired(_) => (StatusCode::GONE, "SESSION_EXPIRED"),
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::PayloadTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE")
            }
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Workflow(err) => match err {
                SealJoinError::UnresolvedReference(_) => {
                    (StatusCode::NOT_FOUND, "UNRESOLVED_REFERENCE")
                }
                SealJoinError::UnknownSeal(_) => (StatusCode::NOT_FOUND, "UNKNOWN_SEAL"),
                SealJoinError::PageOutOfRange { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "PAGE_OUT_OF_RANGE")
                }
                SealJoinError::InactiveSeal(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "INACTIVE_SEAL")
                }
                SealJoinError::InvalidTransition { .. } => {
                    (StatusCode::CONFLICT, "INVALID_TRANSITION")
                }
                SealJoinError::Cancelled => (StatusCode::CONFLICT, "CANCELLED"),
                SealJoinError::ParseError(_)
                | SealJoinError::Store(StoreError::InvalidDocument(_)) => {
                    (StatusCode::BAD_REQUEST, "INVALID_DOCUMENT")
                }
                SealJoinError::Catalog(_) => (StatusCode::BAD_REQUEST, "INVALID_CATALOG"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
