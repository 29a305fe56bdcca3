//! Error types for trustcard-core.

use thiserror::Error;

/// Result type for trustcard-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while decoding identifiers and amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Not a 32-byte hex term id.
    #[error("invalid term id: {0}")]
    InvalidTermId(String),

    /// Amount is not a plain decimal number.
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),

    /// Amount does not fit in a wei counter.
    #[error("amount too large: {0:?}")]
    AmountOverflow(String),
}
