//! Error types for the networking crate.

use exhibit_core::FetchError;
use thiserror::Error;

/// Errors that can occur while talking to a remote HTTP service.
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    /// Generic request failure.
    #[error("HTTP request error: {0}")]
    Request(String),

    /// The URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The request or the connection timed out.
    #[error("Request timed out")]
    Timeout,

    /// Failed to establish a connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A header name or value was rejected.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// The response body was not the JSON we expected.
    #[error("JSON error: {0}")]
    Json(String),

    /// The request was cancelled before it completed.
    #[error("Request was cancelled")]
    Cancelled,

    /// The server answered with a non-success status.
    #[error("HTTP {status}{}", body_suffix(.message))]
    HttpStatus {
        /// Status code.
        status: u16,
        /// Response body, if one could be read.
        message: Option<String>,
    },
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::Json(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<NetworkError> for FetchError {
    fn from(err: NetworkError) -> Self {
        match err {
            NetworkError::Cancelled => FetchError::Cancelled,
            NetworkError::Json(msg) => FetchError::Malformed(msg),
            other => FetchError::Transport(other.to_string()),
        }
    }
}

fn body_suffix(message: &Option<String>) -> String {
    message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
}

/// Result type for networking operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
