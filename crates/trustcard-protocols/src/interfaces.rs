//! Collaborator traits for the indexer and the wallet/chain client.

use async_trait::async_trait;
use serde::Serialize;
use trustcard_core::{CurveId, RawAtom, RawPosition, RawTriple, RawVaultCap, TermId};

use crate::error::{ChainError, IndexerError};

/// How an account id is matched by the positions query.
///
/// The indexer is not consistent about address casing, so a lookup sends
/// several equality variants at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AccountMatch {
    /// Byte-for-byte equality.
    Exact(String),
    /// Equality against the lowercased address.
    Lowercase(String),
    /// Case-insensitive pattern match.
    InsensitivePattern(String),
}

impl AccountMatch {
    /// Whether an indexer account id satisfies this variant.
    pub fn matches(&self, account_id: &str) -> bool {
        match self {
            Self::Exact(addr) | Self::Lowercase(addr) => account_id == addr,
            Self::InsensitivePattern(pattern) => account_id.eq_ignore_ascii_case(pattern),
        }
    }
}

/// Position filter for one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountFilter {
    pub any_of: Vec<AccountMatch>,
    pub limit: usize,
}

impl AccountFilter {
    /// All casing variants for `address`.
    pub fn for_address(address: &str, limit: usize) -> Self {
        let lower = address.to_lowercase();
        Self {
            any_of: vec![
                AccountMatch::Exact(address.to_string()),
                AccountMatch::Lowercase(lower.clone()),
                AccountMatch::InsensitivePattern(lower),
            ],
            limit,
        }
    }

    /// Whether an account id matches any variant.
    pub fn matches(&self, account_id: &str) -> bool {
        self.any_of.iter().any(|m| m.matches(account_id))
    }
}

/// Person metadata pinned to IPFS before creating an identity atom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PinPerson {
    pub name: String,
    pub description: Option<String>,
    /// Image as URL or data URL.
    pub image: Option<String>,
    pub url: Option<String>,
    pub email: Option<String>,
    pub identifier: Option<String>,
}

/// Wallet connection as seen by the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    Disconnected,
    Connected { account: String, chain_id: u64 },
}

/// Read-only GraphQL indexer.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Claims with the given predicate and object, newest first.
    async fn claims(&self, predicate: &TermId, object: &TermId) -> Result<Vec<RawTriple>, IndexerError>;

    /// The claim for one subject, if any.
    async fn claim_for_subject(
        &self,
        subject: &TermId,
        predicate: &TermId,
        object: &TermId,
    ) -> Result<Option<RawTriple>, IndexerError>;

    /// Atom with exactly this label.
    async fn atom_by_label(&self, label: &str) -> Result<Option<RawAtom>, IndexerError>;

    /// Atoms whose label matches a `%`-wildcard pattern, case-insensitive,
    /// ordered by label.
    async fn search_atoms(&self, pattern: &str, limit: usize) -> Result<Vec<RawAtom>, IndexerError>;

    /// Every vault of the given terms with its market cap.
    async fn vault_market_caps(&self, term_ids: &[TermId]) -> Result<Vec<RawVaultCap>, IndexerError>;

    /// Positions of one wallet.
    async fn positions(&self, filter: &AccountFilter) -> Result<Vec<RawPosition>, IndexerError>;

    /// Positions of every wallet in the given vaults.
    async fn vault_positions(&self, vault_ids: &[TermId]) -> Result<Vec<RawPosition>, IndexerError>;

    /// Pin person metadata, returning its URI.
    async fn pin_person(&self, person: &PinPerson) -> Result<Option<String>, IndexerError>;
}

/// Wallet and chain access.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current wallet connection.
    fn connection(&self) -> Connection;

    /// Create an atom from a pinned metadata URI.
    async fn create_atom(&self, ipfs_uri: &str, deposit: u128) -> Result<TermId, ChainError>;

    /// Cost in wei of creating one triple.
    async fn triple_cost(&self) -> Result<u128, ChainError>;

    /// Create a triple, bonding `bond` wei.
    async fn create_triple(
        &self,
        subject: &TermId,
        predicate: &TermId,
        object: &TermId,
        bond: u128,
    ) -> Result<(), ChainError>;

    /// Deposit `amount` wei into a vault on behalf of `receiver`.
    async fn deposit(&self, receiver: &str, vault: &TermId, curve: CurveId, amount: u128) -> Result<(), ChainError>;

    /// Shares (wei) a deposit of `amount` would mint right now.
    async fn preview_deposit(&self, vault: &TermId, curve: CurveId, amount: u128) -> Result<u128, ChainError>;
}
