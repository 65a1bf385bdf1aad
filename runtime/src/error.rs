//! Unified error handling for the runtime.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::config::ConfigError;

/// Runtime error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request timed out")]
    Timeout,

    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("backend rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("engine error: {0}")]
    Engine(#[from] storefront_engine::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl Error {
    /// Whether the request most likely never reached the backend.
    ///
    /// Connectivity failures are queued for replay; everything else is
    /// reported to the user.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Error::Timeout | Error::Unreachable(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else if let Some(status) = e.status() {
            Error::Rejected {
                status: status.as_u16(),
                body: String::new(),
            }
        } else if e.is_decode() {
            Error::InvalidResponse(e.to_string())
        } else {
            // connect, DNS, reset, ...
            Error::Unreachable(e.to_string())
        }
    }
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match &self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            Error::Timeout | Error::Unreachable(_) => {
                tracing::warn!("Backend unavailable: {}", self);
                (
                    StatusCode::BAD_GATEWAY,
                    "Backend unavailable".to_string(),
                    Some(self.to_string()),
                )
            }
            other => {
                tracing::error!("Internal error: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    Some(other.to_string()),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

/// Result type alias for the runtime.
pub type Result<T> = std::result::Result<T, Error>;
