//! Error types for chatline-api

use std::time::Duration;

use thiserror::Error;

/// Result type alias using chatline-api Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the chat backend
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed (connect, send, or body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local file access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Success status but no response body to stream
    #[error("Response has no body")]
    MissingBody,

    /// The stream exceeded its total duration bound
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Request was cancelled locally
    #[error("Request aborted")]
    Aborted,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Build a status error from a response code and its (possibly empty) body.
    ///
    /// The backend reports errors as `{"msg": "..."}`; that message is
    /// preferred, then the raw body text, then the canonical reason phrase.
    pub fn status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("msg").and_then(|m| m.as_str()).map(str::to_string))
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| {
                reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown status")
                    .to_string()
            });

        Self::Status { status, message }
    }

    /// The proximate failure reason, suitable for showing inline in a message.
    pub fn reason(&self) -> String {
        match self {
            Error::Status { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Check if the server rejected our credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Status { status: 401 | 422, .. })
    }

    /// Check if this error came from the stream duration bound
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout(_) => true,
            Error::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}
