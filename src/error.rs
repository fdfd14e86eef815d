//! Crate-level error type

use std::io;

/// Errors surfaced by the server entry points
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Binding, serving or directory setup failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The outbound HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A configuration value is unusable
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;
