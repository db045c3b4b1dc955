//! Error types for reasoning-tap

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`TapError`]
pub type Result<T> = std::result::Result<T, TapError>;

/// Main error type for reasoning-tap
///
/// Note that nothing raised inside the reasoning tap itself ends up here:
/// extraction is total and observer failures are discarded. These variants
/// cover the transport, configuration and CLI around it.
#[derive(Debug, Error)]
pub enum TapError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parse error
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// Configuration validation error
    #[error("Invalid configuration: {0}")]
    ConfigValidation(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from a chat completion endpoint
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Malformed or interrupted event stream
    #[error("Stream error: {0}")]
    Stream(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl From<String> for TapError {
    fn from(s: String) -> Self {
        TapError::Other(s)
    }
}

impl From<&str> for TapError {
    fn from(s: &str) -> Self {
        TapError::Other(s.to_string())
    }
}
