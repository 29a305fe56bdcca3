//! Error types for the vote page.

use thiserror::Error;

/// Result type for vote page operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the vote page.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed configuration value
    #[error("Invalid {var}={value:?}: {reason}")]
    Config {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// Orchestration error
    #[error(transparent)]
    Protocol(#[from] trustcard_protocols::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
