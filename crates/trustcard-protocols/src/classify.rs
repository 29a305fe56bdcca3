//! Revert classification.
//!
//! Chain clients that can decode custom errors report a [`RevertKind`]
//! directly. Otherwise the raw revert message is normalized (lowercase,
//! alphanumerics only) and searched for known reason names, so
//! `MultiVault_InsufficientBalance()` and `insufficient balance` both match.

use std::fmt;

use serde::Serialize;
use trustcard_core::Side;

use crate::error::ChainError;

/// Known revert reasons with a friendly rewording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RevertKind {
    /// Not enough native balance for amount plus gas.
    InsufficientBalance,
    /// The receiver already holds the opposite vault of the triple.
    CounterStake,
}

impl RevertKind {
    const PATTERNS: [(&'static str, RevertKind); 2] = [
        ("insufficientbalance", RevertKind::InsufficientBalance),
        ("hascounterstake", RevertKind::CounterStake),
    ];

    /// Legacy fallback: match a raw revert message.
    pub fn from_message(message: &str) -> Option<Self> {
        let normalized: String = message
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self::PATTERNS
            .iter()
            .find(|(pattern, _)| normalized.contains(pattern))
            .map(|&(_, kind)| kind)
    }
}

/// The chain write an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChainAction {
    /// Deposit into one side of a claim.
    Stake(Side),
    /// Create (and seed) a claim.
    CreateClaim,
    /// Create an identity atom.
    CreateIdentity,
}

impl fmt::Display for ChainAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stake(Side::Support) => write!(f, "upvote"),
            Self::Stake(Side::Oppose) => write!(f, "downvote"),
            Self::CreateClaim => write!(f, "claim creation"),
            Self::CreateIdentity => write!(f, "identity creation"),
        }
    }
}

/// Structured kind if present, substring fallback otherwise.
pub fn classify(err: &ChainError) -> Option<RevertKind> {
    err.kind.or_else(|| RevertKind::from_message(&err.message))
}

/// User-facing text for a rejected chain write.
pub fn rejection_message(action: &ChainAction, kind: &Option<RevertKind>, message: &str) -> String {
    match (kind, action) {
        (Some(RevertKind::CounterStake), ChainAction::Stake(side)) => {
            let verb = if *side == Side::Support { "upvoting" } else { "downvoting" };
            format!("You already hold a position on the opposite side. Sell/withdraw it before {verb}.")
        }
        (Some(RevertKind::CounterStake), _) => {
            "You already hold a position on the opposite side. Sell/withdraw it first.".to_string()
        }
        (Some(RevertKind::InsufficientBalance), ChainAction::CreateClaim) => {
            "MultiVault reports insufficient balance to seed this Claim. Make sure you have enough native TRUST on Intuition Mainnet for the chosen amount (plus gas).".to_string()
        }
        (Some(RevertKind::InsufficientBalance), _) => {
            "MultiVault reports insufficient balance to buy this position. Make sure you have enough native TRUST on Intuition Mainnet for the chosen amount (plus gas).".to_string()
        }
        (None, _) if message.trim().is_empty() => format!("Error while sending your {action}."),
        (None, _) => message.to_string(),
    }
}
