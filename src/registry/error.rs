//! Registry error types
//!
//! Errors surfaced synchronously by admission and lookup.

use super::key::SessionId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A session with this id is already starting, running or stopping
    DuplicateSession(SessionId),
    /// The concurrency cap is reached
    CapacityExceeded {
        /// Configured maximum
        max: usize,
    },
    /// No live session with this id
    NotFound(String),
    /// The id cannot be used as a session name
    InvalidId(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateSession(id) => write!(f, "Stream already active: {}", id),
            RegistryError::CapacityExceeded { max } => {
                write!(f, "Maximum concurrent streams limit ({}) reached", max)
            }
            RegistryError::NotFound(id) => write!(f, "Stream not found: {}", id),
            RegistryError::InvalidId(reason) => write!(f, "Invalid stream name: {}", reason),
        }
    }
}

impl std::error::Error for RegistryError {}
