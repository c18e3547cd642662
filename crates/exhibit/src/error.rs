//! Errors surfaced by the composition root.

use exhibit_core::ConfigError;
use exhibit_net::NetworkError;
use thiserror::Error;

/// Errors that can occur while assembling or driving an [`Exhibit`](crate::Exhibit).
#[derive(Debug, Error)]
pub enum ExhibitError {
    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("Failed to initialize networking: {0}")]
    Network(#[from] NetworkError),

    /// A key was requested that the catalog does not contain.
    #[error("Unknown selection: {0}")]
    UnknownSelection(String),
}
