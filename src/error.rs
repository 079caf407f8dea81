//! Feed error types with HTTP status code mapping.
//!
//! [`FeedError`] is the central error type for the crate. Transport and
//! authentication variants travel to consumers inside
//! [`FeedEvent::Error`](crate::domain::FeedEvent::Error); the remaining
//! variants surface through the local control API as structured JSON.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "feed is not connected",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Crate-level error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status               |
/// |-----------|-------------------|---------------------------|
/// | 1000–1999 | Validation/Config | 400 Bad Request           |
/// | 2000–2999 | Session state     | 409 Conflict              |
/// | 5000–5999 | Gateway           | 502 Bad Gateway           |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// Connection refused, reset, timed out, or rejected for a reason
    /// other than credentials. Non-fatal: the transport retries.
    #[error("transport error: {0}")]
    Transport(String),

    /// The gateway rejected the login or passcode. Always fatal.
    #[error("gateway rejected credentials: {0}")]
    AuthRejected(String),

    /// The operation requires a connected session.
    #[error("feed is not connected")]
    NotConnected,

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl FeedError {
    /// Classifies the `message` of a STOMP `ERROR` frame.
    ///
    /// Messages that reference the login or passcode are credential
    /// rejections; everything else is a transport-level error.
    #[must_use]
    pub fn classify_protocol(message: &str) -> Self {
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("login") || lowered.contains("passcode") {
            Self::AuthRejected(message.to_string())
        } else {
            Self::Transport(message.to_string())
        }
    }

    /// Returns `true` if this error must stop any further reconnect attempt.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthRejected(_))
    }

    /// Returns a short category name used in error events.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::AuthRejected(_) => "auth",
            Self::NotConnected => "not_connected",
            Self::InvalidConfig(_) => "config",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidConfig(_) => 1002,
            Self::NotConnected => 2001,
            Self::Transport(_) => 5001,
            Self::AuthRejected(_) => 5002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Self::NotConnected => StatusCode::CONFLICT,
            Self::Transport(_) | Self::AuthRejected(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
