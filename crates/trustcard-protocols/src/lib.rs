//! Trust Card Protocols - Stake Orchestration over Indexer and Chain
//!
//! This crate sequences the write actions of the Trust Card vote page on
//! top of the optimistic ledger from `trustcard-core`.
//!
//! # Overview
//!
//! ## Stake Orchestrator
//!
//! The [`StakeOrchestrator`] owns the page state and drives each stake
//! through Validating → AwaitingWallet → Submitted → Reconciling:
//!
//! - **Mutual exclusion**: a wallet never holds both sides of a claim
//! - **One action per claim**: a second action on a working claim is rejected
//! - **Optimistic, then authoritative**: accepted deposits bump the ledger at
//!   once, the following refresh replaces it
//!
//! ## Claim Creation
//!
//! [`StakeOrchestrator::ensure_identity_atom`] and
//! [`StakeOrchestrator::ensure_claim`] create the subject atom and its claim,
//! polling the indexer with a bounded [`RetryPolicy`] until writes show up.
//!
//! ## Collaborators
//!
//! The indexer and the wallet are reached through the [`Indexer`] and
//! [`ChainClient`] traits. With the `memory` feature, `memory::MemoryNetwork`
//! implements both in memory.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trustcard_core::Side;
//! use trustcard_protocols::{memory::MemoryNetwork, OrchestratorConfig, StakeOrchestrator};
//!
//! let net = Arc::new(MemoryNetwork::new());
//! let claim = net.add_claim("Alice", 20_000_000_000_000_000, 0);
//! net.connect("0xabc", 1155);
//!
//! let config = OrchestratorConfig::new(net.predicate_id(), net.object_id());
//! let orchestrator = StakeOrchestrator::new(net.clone(), net, config);
//! orchestrator.reload_claims().await?;
//! orchestrator.stake(claim, Side::Support, "0.05").await?;
//! ```

mod claims;
pub mod classify;
pub mod error;
pub mod interfaces;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod orchestrator;
pub mod retry;
pub mod state;

pub use claims::IdentityMetadata;
pub use classify::{classify, ChainAction, RevertKind};
pub use error::{ChainError, Error, ErrorCategory, IndexerError, Result};
pub use interfaces::{AccountFilter, AccountMatch, ChainClient, Connection, Indexer, PinPerson};
pub use orchestrator::{OrchestratorConfig, RefreshMode, StakeOrchestrator, StakeReceipt, INTUITION_MAINNET_CHAIN_ID};
pub use retry::RetryPolicy;
pub use state::{ActionState, ClaimView, PageSnapshot, PageState, WorkingGuard, WorkingSet};
