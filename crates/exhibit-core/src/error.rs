//! Error types for the exhibit core.
//!
//! Only [`ConfigError`] is ever allowed to abort start-up. [`FetchError`] is
//! produced by [`RemoteFetcher`](crate::fetch::RemoteFetcher) implementations
//! and is always recovered inside the
//! [`FetchCoordinator`](crate::coordinator::FetchCoordinator), surfacing only
//! as display text.

use std::path::PathBuf;

/// Errors raised while loading the selection catalog configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration '{path}': {source}")]
    Io {
        /// The file that was being read.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration document is not valid TOML or has the wrong shape.
    #[error("Malformed configuration: {0}")]
    Parse(String),

    /// A city entry is missing a required field (or has it empty).
    #[error("City #{index} is missing required field '{field}'")]
    MissingField {
        /// Zero-based position of the entry in declaration order.
        index: usize,
        /// The missing field name.
        field: &'static str,
    },

    /// Two entries share the same key.
    #[error("Duplicate city key '{key}'")]
    DuplicateKey {
        /// The repeated key.
        key: String,
    },

    /// A coordinate is NaN or infinite.
    #[error("City '{key}' has an invalid {field}: {value}")]
    InvalidCoordinate {
        /// Key of the offending entry.
        key: String,
        /// `latitude` or `longitude`.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Failure reported by a remote fetch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    /// Network, transport or non-success HTTP response.
    #[error("{0}")]
    Transport(String),

    /// The fetch observed its cancellation token.
    #[error("Request was cancelled")]
    Cancelled,

    /// The response arrived but could not be understood.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Check whether this error represents cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// A specialized Result type for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;
