//! Common Error Types
//!
//! Unified error handling with HTTP status mapping, so a hub back-end can
//! surface Google failures to its own callers without re-classifying them.

use serde_json::{json, Value};

/// Library error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Google answered with a non-success status
    #[error("Google API error {status}: {message}")]
    Api {
        status: u16,
        message: String,
        details: Value,
    },

    #[error("Rate limited. Please try again later.")]
    RateLimited,

    /// Rejected locally before any request was made
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An update carried no new values
    #[error("Nothing to update: {0}")]
    NothingToUpdate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Credential error: {0}")]
    Credentials(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Never carries the request URL, which may hold an API key
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.without_url())
    }
}

impl Error {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn nothing_to_update(message: impl Into<String>) -> Self {
        Self::NothingToUpdate(message.into())
    }

    /// HTTP status a caller should answer with for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Api { status, .. } => *status,
            Self::RateLimited => 429,
            Self::InvalidArgument(_) | Self::NothingToUpdate(_) => 400,
            Self::NotFound(_) => 406,
            Self::Credentials(_) => 401,
            Self::Config(_) | Self::Http(_) | Self::Json(_) | Self::Io(_) | Self::Jwt(_) => 500,
        }
    }

    /// Structured detail object: `{"message": ..., "error": ...}`
    pub fn details(&self) -> Value {
        match self {
            Self::Api { details, .. } => json!({
                "message": "Google API request failed.",
                "error": details,
            }),
            other => json!({
                "message": other.to_string(),
                "error": Value::Null,
            }),
        }
    }

    /// True when Google reported the resource already exists
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Api { status: 409, .. })
    }
}
