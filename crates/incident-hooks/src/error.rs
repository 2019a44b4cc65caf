//! Error types for webhook processing and startup configuration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Errors raised while handling an inbound webhook.
///
/// `UnsupportedMediaType` and `MalformedPayload` fail the whole request.
/// `MissingField`, `InvalidEvent` and `CallbackFailed` are scoped to a single event and
/// never reach the HTTP response.
#[derive(Debug, Error)]
pub enum HookError {
    /// Request content type is not JSON
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Body is not valid JSON or lacks a `messages` array
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A field the bound action needs is absent from the event
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A known event carries a field of the wrong shape
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// The note callback to the incident platform did not complete
    #[error("note callback failed: {0}")]
    CallbackFailed(#[from] reqwest::Error),
}

impl HookError {
    /// HTTP status used when this error fails a request.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::MissingField(_) | Self::InvalidEvent(_) | Self::CallbackFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for HookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "status": "error",
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Errors raised while loading [`crate::Config`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Required variable is unset or empty
    #[error("{0} is not set")]
    Missing(&'static str),

    /// Variable still holds a `<...>` placeholder value
    #[error("{0} still contains a placeholder value")]
    Placeholder(&'static str),

    /// Variable is set but cannot be used
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}
