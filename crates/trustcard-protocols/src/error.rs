//! Error types for trustcard-protocols.

use thiserror::Error;
use trustcard_core::{Side, TermId};

use crate::classify::{rejection_message, ChainAction, RevertKind};

/// Result type for trustcard-protocols operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A failed indexer query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("indexer query failed: {0}")]
pub struct IndexerError(pub String);

/// A failed chain call, as reported by the wallet/transaction layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ChainError {
    /// Structured revert reason, when the client could decode one.
    pub kind: Option<RevertKind>,
    /// Raw revert or transport message.
    pub message: String,
}

impl ChainError {
    /// A chain error with only a raw message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
        }
    }

    /// A chain error with a decoded revert kind.
    pub fn revert(kind: RevertKind, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            message: message.into(),
        }
    }
}

/// Broad error classes, deciding how an error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Wallet disconnected or on the wrong network.
    Connectivity,
    /// Bad input, rejected before any network call.
    Validation,
    /// The action conflicts with existing state.
    Conflict,
    /// The chain rejected the transaction.
    OnChain,
    /// A write never became visible on the indexer.
    IndexingLag,
    /// The indexer itself failed.
    Indexer,
}

/// Errors that can occur while orchestrating stake and creation actions.
#[derive(Debug, Error)]
pub enum Error {
    /// No wallet connected.
    #[error("Connect your wallet to the Intuition Mainnet to {action}.")]
    WalletDisconnected { action: &'static str },

    /// Wallet connected to another chain.
    #[error(
        "Wrong network: you are on chain id {actual}, please switch your wallet to Intuition Mainnet (chain id {expected}) to {action}."
    )]
    WrongNetwork {
        actual: u64,
        expected: u64,
        action: &'static str,
    },

    /// Identity label is blank.
    #[error("Label cannot be empty.")]
    EmptyLabel,

    /// Amount is malformed or not positive.
    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),

    /// Amount is below the configured minimum stake.
    #[error("Minimum amount is {min} TRUST.")]
    BelowMinimum { min: f64 },

    /// Claim has no vault on the requested side.
    #[error("No {side} vault found for this claim.")]
    VaultMissing { side: Side },

    /// Claim is not in the loaded claim list.
    #[error("Claim {0} not found.")]
    ClaimNotFound(TermId),

    /// Claim creation was requested before its subject atom exists.
    #[error("Subject not ready, retry creation.")]
    SubjectNotReady,

    /// The wallet already holds the other side of this claim.
    #[error("You already hold a position on the {held} side of this claim. Sell/withdraw it before taking the {wanted} side.")]
    CounterStake { held: Side, wanted: Side },

    /// A claim for the subject already exists.
    #[error("A Claim for this identity already exists.")]
    ClaimExists { claim: TermId },

    /// Another action is in flight on the same claim.
    #[error("Another action is already in progress on claim {0}.")]
    Busy(TermId),

    /// The chain rejected a write.
    #[error("{}", rejection_message(.action, .kind, .message))]
    Rejected {
        action: ChainAction,
        kind: Option<RevertKind>,
        message: String,
    },

    /// Polling the indexer for a write ran out of attempts.
    #[error("{what} failed: not visible on the indexer after {attempts} attempts.")]
    IndexingLag { what: &'static str, attempts: u32 },

    /// Pinning returned no URI.
    #[error("Failed to pin Person metadata to IPFS.")]
    PinFailed,

    /// Pinning returned something that is not an `ipfs://` URI.
    #[error("Unexpected IPFS URI returned: {0}")]
    UnexpectedPinUri(String),

    /// Indexer query failure.
    #[error(transparent)]
    Indexer(#[from] IndexerError),
}

impl Error {
    /// Wrap a chain failure for the given action, classifying its revert.
    pub fn rejected(action: ChainAction, err: ChainError) -> Self {
        Error::Rejected {
            action,
            kind: crate::classify::classify(&err),
            message: err.message,
        }
    }

    /// Broad class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::WalletDisconnected { .. } | Error::WrongNetwork { .. } => ErrorCategory::Connectivity,
            Error::EmptyLabel
            | Error::InvalidAmount(_)
            | Error::BelowMinimum { .. }
            | Error::VaultMissing { .. }
            | Error::ClaimNotFound(_)
            | Error::SubjectNotReady => ErrorCategory::Validation,
            Error::CounterStake { .. } | Error::ClaimExists { .. } | Error::Busy(_) => ErrorCategory::Conflict,
            Error::Rejected { .. } => ErrorCategory::OnChain,
            Error::IndexingLag { .. } => ErrorCategory::IndexingLag,
            Error::PinFailed | Error::UnexpectedPinUri(_) | Error::Indexer(_) => ErrorCategory::Indexer,
        }
    }

    /// Whether the error is resolved inline, without logging or a toast.
    pub fn is_local(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Connectivity | ErrorCategory::Validation | ErrorCategory::Conflict
        )
    }
}
