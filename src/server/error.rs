//! Relay error responses: `{"error": ..., "kind": ...}`.

use crate::error::{ErrorKind, RetouchError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// JSON body of every relay error.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Stable discriminator.
    pub kind: ErrorKind,
}

/// Relay-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad client input; answered with 400.
    #[error("{0}")]
    Validation(String),
    /// Upstream answered with an error status, which is passed through.
    #[error("{message}")]
    Upstream {
        /// Status to answer with.
        status: StatusCode,
        /// Message for the `error` field.
        message: String,
        /// Discriminator for the `kind` field.
        kind: ErrorKind,
    },
    /// Upstream could not be reached.
    #[error("transport failure: {0}")]
    Network(String),
    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Wraps a non-success upstream reply.
    pub fn upstream(status: u16, prefix: &str, body: &str, kind: ErrorKind) -> Self {
        Self::Upstream {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
            message: format!(
                "{prefix}: {status} - {}",
                crate::error::sanitize_error_message(body)
            ),
            kind,
        }
    }
}

impl From<RetouchError> for ApiError {
    fn from(err: RetouchError) -> Self {
        match err {
            RetouchError::Validation(detail) => Self::Validation(detail),
            RetouchError::Network(e) => Self::Network(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, kind) = match self {
            Self::Validation(detail) => (StatusCode::BAD_REQUEST, detail, ErrorKind::Validation),
            Self::Upstream {
                status,
                message,
                kind,
            } => {
                tracing::warn!(status = status.as_u16(), %kind, "upstream error: {message}");
                (status, message, kind)
            }
            Self::Network(detail) => {
                tracing::error!(%detail, "upstream transport failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    ErrorKind::Network,
                )
            }
            Self::Internal(detail) => {
                tracing::error!(%detail, "relay internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    ErrorKind::Internal,
                )
            }
        };

        (status, Json(ErrorBody { error, kind })).into_response()
    }
}
