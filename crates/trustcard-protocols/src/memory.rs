//! In-memory indexer and chain.
//!
//! [`MemoryNetwork`] implements both [`Indexer`] and [`ChainClient`] over one
//! shared book of atoms, triples and positions. Writes land in the book the
//! way a MultiVault would apply them; new triples can be held back for a
//! number of indexer reads to mimic indexing lag.
//!
//! Position amounts are booked in deposited wei, which is what the ledger
//! reads them as. Vault share totals use the minted shares.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use trustcard_core::{
    records::{RawCurveId, RawPositionVault, RawTerm},
    CurveId, RawAtom, RawPosition, RawTriple, RawVault, RawVaultCap, TermId, TARGET_CURVE_ID,
    WEI_PER_TRUST,
};

use crate::error::{ChainError, IndexerError};
use crate::interfaces::{AccountFilter, ChainClient, Connection, Indexer, PinPerson};

/// Default triple creation cost (0.001 TRUST).
pub const DEFAULT_TRIPLE_COST: u128 = 1_000_000_000_000_000;

/// A deposit applied by the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deposit {
    pub receiver: String,
    pub vault: TermId,
    pub amount: u128,
}

#[derive(Debug)]
struct Pending {
    triple: RawTriple,
    reads_left: u32,
}

#[derive(Debug)]
struct Book {
    connection: Connection,
    predicate: RawAtom,
    object: RawAtom,
    next_id: u64,
    atoms: Vec<RawAtom>,
    atom_caps: HashMap<TermId, u128>,
    triples: Vec<RawTriple>,
    pending: Vec<Pending>,
    positions: Vec<RawPosition>,
    index_lag: u32,
    pin_prefix: Option<String>,
    pinned: Vec<PinPerson>,
    pinned_names: HashMap<String, String>,
    created_atoms: Vec<(String, u128)>,
    deposits: Vec<Deposit>,
    triple_cost: u128,
    default_price: u128,
    write_failure: Option<ChainError>,
    indexer_down: bool,
    indexer_reads: u64,
}

impl Book {
    fn fresh_id(&mut self, tag: u8) -> TermId {
        self.next_id += 1;
        let mut bytes = [0u8; 32];
        bytes[0] = tag;
        bytes[24..].copy_from_slice(&self.next_id.to_be_bytes());
        TermId(bytes)
    }

    fn read(&mut self) -> Result<(), IndexerError> {
        self.indexer_reads += 1;
        if self.indexer_down {
            return Err(IndexerError("memory indexer is down".into()));
        }
        Ok(())
    }

    fn write(&self) -> Result<(), ChainError> {
        match &self.write_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// One indexer read elapsed: release triples whose lag ran out.
    fn tick(&mut self) {
        let mut ready = Vec::new();
        self.pending.retain_mut(|p| {
            if p.reads_left == 0 {
                ready.push(p.triple.clone());
                false
            } else {
                p.reads_left = p.reads_left.saturating_sub(1);
                true
            }
        });
        self.triples.extend(ready);
    }

    fn new_triple(&mut self, subject: RawAtom, support_price: u128, oppose_price: u128) -> RawTriple {
        let term_id = self.fresh_id(0x03);
        let counter_id = self.fresh_id(0x04);
        RawTriple {
            term_id,
            subject,
            predicate: self.predicate.clone(),
            object: self.object.clone(),
            term: Some(RawTerm {
                vaults: vec![raw_vault(term_id, support_price)],
            }),
            counter_term: Some(RawTerm {
                vaults: vec![raw_vault(counter_id, oppose_price)],
            }),
        }
    }

    fn vault_mut(&mut self, vault: &TermId) -> Option<&mut RawVault> {
        self.triples
            .iter_mut()
            .chain(self.pending.iter_mut().map(|p| &mut p.triple))
            .flat_map(|t| t.term.iter_mut().chain(t.counter_term.iter_mut()))
            .flat_map(|term| term.vaults.iter_mut())
            .find(|v| &v.term_id == vault)
    }

    /// The other vault of the triple `vault` belongs to.
    fn counter_vault(&self, vault: &TermId) -> Option<TermId> {
        let first = |term: &Option<RawTerm>| term.as_ref().and_then(|t| t.vaults.first()).map(|v| v.term_id);
        self.triples.iter().find_map(|t| {
            let (support, oppose) = (first(&t.term)?, first(&t.counter_term)?);
            if &support == vault {
                Some(oppose)
            } else if &oppose == vault {
                Some(support)
            } else {
                None
            }
        })
    }

    fn vault_price(&mut self, vault: &TermId) -> u128 {
        self.vault_mut(vault)
            .and_then(|v| v.current_share_price.parse().ok())
            .unwrap_or(self.default_price)
    }
}

fn raw_vault(term_id: TermId, price: u128) -> RawVault {
    RawVault {
        term_id,
        curve_id: RawCurveId::Number(TARGET_CURVE_ID),
        total_shares: "0".into(),
        current_share_price: price.to_string(),
        market_cap: Some("0".into()),
        position_count: 0,
    }
}

fn raw_atom(term_id: TermId, label: &str) -> RawAtom {
    RawAtom {
        term_id,
        label: Some(label.to_string()),
        image: None,
        value: None,
    }
}

fn add_wei(raw: &str, delta: u128) -> String {
    raw.parse::<u128>().unwrap_or(0).saturating_add(delta).to_string()
}

/// Shares minted by `amount` at `price`; a zero price mints one for one.
fn shares_for(amount: u128, price: u128) -> u128 {
    if price == 0 {
        amount
    } else {
        amount.saturating_mul(WEI_PER_TRUST) / price
    }
}

/// Indexer and chain backed by one in-memory book.
#[derive(Debug)]
pub struct MemoryNetwork {
    book: Mutex<Book>,
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNetwork {
    /// Empty network with the "should be holder of" and "Trust Card" atoms,
    /// no wallet connected.
    pub fn new() -> Self {
        let mut book = Book {
            connection: Connection::Disconnected,
            predicate: raw_atom(TermId([0; 32]), "should be holder of"),
            object: raw_atom(TermId([0; 32]), "Trust Card"),
            next_id: 0,
            atoms: Vec::new(),
            atom_caps: HashMap::new(),
            triples: Vec::new(),
            pending: Vec::new(),
            positions: Vec::new(),
            index_lag: 0,
            pin_prefix: Some("ipfs://mem-".into()),
            pinned: Vec::new(),
            pinned_names: HashMap::new(),
            created_atoms: Vec::new(),
            deposits: Vec::new(),
            triple_cost: DEFAULT_TRIPLE_COST,
            default_price: WEI_PER_TRUST,
            write_failure: None,
            indexer_down: false,
            indexer_reads: 0,
        };
        let predicate = book.fresh_id(0x01);
        let object = book.fresh_id(0x01);
        book.predicate.term_id = predicate;
        book.object.term_id = object;
        book.atoms.push(book.predicate.clone());
        book.atoms.push(book.object.clone());

        Self {
            book: Mutex::new(book),
        }
    }

    fn book(&self) -> MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Predicate atom of every claim.
    pub fn predicate_id(&self) -> TermId {
        self.book().predicate.term_id
    }

    /// Object atom of every claim.
    pub fn object_id(&self) -> TermId {
        self.book().object.term_id
    }

    /// Connect a wallet.
    pub fn connect(&self, account: &str, chain_id: u64) {
        self.book().connection = Connection::Connected {
            account: account.to_string(),
            chain_id,
        };
    }

    /// Disconnect the wallet.
    pub fn disconnect(&self) {
        self.book().connection = Connection::Disconnected;
    }

    /// Add an atom whose vaults sum to `market_cap` wei.
    pub fn add_atom(&self, label: &str, market_cap: u128) -> TermId {
        let mut book = self.book();
        let id = book.fresh_id(0x02);
        book.atoms.push(raw_atom(id, label));
        book.atom_caps.insert(id, market_cap);
        id
    }

    /// Add an indexed claim for a new subject atom. Returns the claim id.
    pub fn add_claim(&self, subject_label: &str, support_price: u128, oppose_price: u128) -> TermId {
        let mut book = self.book();
        let subject_id = book.fresh_id(0x02);
        let subject = raw_atom(subject_id, subject_label);
        book.atoms.push(subject.clone());
        let triple = book.new_triple(subject, support_price, oppose_price);
        let id = triple.term_id;
        book.triples.push(triple);
        id
    }

    /// Subject atom of a claim.
    pub fn subject_of(&self, claim: &TermId) -> Option<TermId> {
        self.book()
            .triples
            .iter()
            .find(|t| &t.term_id == claim)
            .map(|t| t.subject.term_id)
    }

    /// Vault ids of a claim as (support, oppose).
    pub fn vaults_of(&self, claim: &TermId) -> Option<(TermId, TermId)> {
        let book = self.book();
        let triple = book.triples.iter().find(|t| &t.term_id == claim)?;
        let first = |term: &Option<RawTerm>| term.as_ref().and_then(|t| t.vaults.first()).map(|v| v.term_id);
        Some((first(&triple.term)?, first(&triple.counter_term)?))
    }

    /// Record an existing position of `amount` wei without going through a
    /// deposit.
    pub fn add_position(&self, account: &str, vault: TermId, amount: u128) {
        self.book().positions.push(RawPosition {
            account_id: account.to_string(),
            vault: Some(RawPositionVault { term_id: vault }),
            shares: Some(amount.to_string()),
        });
    }

    /// Hold new triples back for `reads` claim lookups. `u32::MAX` never
    /// indexes them.
    pub fn set_index_lag(&self, reads: u32) {
        self.book().index_lag = reads;
    }

    /// Make every chain write fail with `err`, or succeed again with `None`.
    pub fn set_write_failure(&self, err: Option<ChainError>) {
        self.book().write_failure = err;
    }

    /// Make every indexer read fail.
    pub fn set_indexer_down(&self, down: bool) {
        self.book().indexer_down = down;
    }

    /// Prefix of pinned URIs; `None` makes pinning return nothing.
    pub fn set_pin_prefix(&self, prefix: Option<&str>) {
        self.book().pin_prefix = prefix.map(str::to_string);
    }

    /// Deposits applied so far.
    pub fn deposits(&self) -> Vec<Deposit> {
        self.book().deposits.clone()
    }

    /// Atoms created on chain as (uri, deposit).
    pub fn created_atoms(&self) -> Vec<(String, u128)> {
        self.book().created_atoms.clone()
    }

    /// Person metadata pinned so far.
    pub fn pinned(&self) -> Vec<PinPerson> {
        self.book().pinned.clone()
    }

    /// Number of indexer queries served.
    pub fn indexer_reads(&self) -> u64 {
        self.book().indexer_reads
    }
}

#[async_trait]
impl Indexer for MemoryNetwork {
    async fn claims(&self, predicate: &TermId, object: &TermId) -> Result<Vec<RawTriple>, IndexerError> {
        let mut book = self.book();
        book.read()?;
        Ok(book
            .triples
            .iter()
            .rev()
            .filter(|t| &t.predicate.term_id == predicate && &t.object.term_id == object)
            .cloned()
            .collect())
    }

    async fn claim_for_subject(
        &self,
        subject: &TermId,
        predicate: &TermId,
        object: &TermId,
    ) -> Result<Option<RawTriple>, IndexerError> {
        let mut book = self.book();
        book.read()?;
        book.tick();
        Ok(book
            .triples
            .iter()
            .find(|t| {
                &t.subject.term_id == subject
                    && &t.predicate.term_id == predicate
                    && &t.object.term_id == object
            })
            .cloned())
    }

    async fn atom_by_label(&self, label: &str) -> Result<Option<RawAtom>, IndexerError> {
        let mut book = self.book();
        book.read()?;
        Ok(book.atoms.iter().find(|a| a.label.as_deref() == Some(label)).cloned())
    }

    async fn search_atoms(&self, pattern: &str, limit: usize) -> Result<Vec<RawAtom>, IndexerError> {
        let mut book = self.book();
        book.read()?;
        let needle = pattern.trim_matches('%').to_lowercase();
        let mut hits: Vec<RawAtom> = book
            .atoms
            .iter()
            .filter(|a| {
                a.label
                    .as_deref()
                    .is_some_and(|l| l.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.label.cmp(&b.label));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn vault_market_caps(&self, term_ids: &[TermId]) -> Result<Vec<RawVaultCap>, IndexerError> {
        let mut book = self.book();
        book.read()?;
        Ok(term_ids
            .iter()
            .filter_map(|id| {
                book.atom_caps.get(id).map(|cap| RawVaultCap {
                    term_id: *id,
                    curve_id: RawCurveId::Number(TARGET_CURVE_ID),
                    market_cap: Some(cap.to_string()),
                    position_count: 0,
                })
            })
            .collect())
    }

    async fn positions(&self, filter: &AccountFilter) -> Result<Vec<RawPosition>, IndexerError> {
        let mut book = self.book();
        book.read()?;
        Ok(book
            .positions
            .iter()
            .filter(|p| filter.matches(&p.account_id))
            .take(filter.limit)
            .cloned()
            .collect())
    }

    async fn vault_positions(&self, vault_ids: &[TermId]) -> Result<Vec<RawPosition>, IndexerError> {
        let mut book = self.book();
        book.read()?;
        Ok(book
            .positions
            .iter()
            .filter(|p| p.vault_id().is_some_and(|v| vault_ids.contains(&v)))
            .cloned()
            .collect())
    }

    async fn pin_person(&self, person: &PinPerson) -> Result<Option<String>, IndexerError> {
        let mut book = self.book();
        book.read()?;
        let Some(prefix) = book.pin_prefix.clone() else {
            return Ok(None);
        };
        let uri = format!("{prefix}{}", book.pinned.len() + 1);
        book.pinned.push(person.clone());
        book.pinned_names.insert(uri.clone(), person.name.clone());
        Ok(Some(uri))
    }
}

#[async_trait]
impl ChainClient for MemoryNetwork {
    fn connection(&self) -> Connection {
        self.book().connection.clone()
    }

    async fn create_atom(&self, ipfs_uri: &str, deposit: u128) -> Result<TermId, ChainError> {
        let mut book = self.book();
        book.write()?;
        let label = book
            .pinned_names
            .get(ipfs_uri)
            .cloned()
            .unwrap_or_else(|| ipfs_uri.to_string());
        let id = book.fresh_id(0x02);
        book.atoms.push(raw_atom(id, &label));
        book.atom_caps.insert(id, deposit);
        book.created_atoms.push((ipfs_uri.to_string(), deposit));
        Ok(id)
    }

    async fn triple_cost(&self) -> Result<u128, ChainError> {
        Ok(self.book().triple_cost)
    }

    async fn create_triple(
        &self,
        subject: &TermId,
        predicate: &TermId,
        object: &TermId,
        bond: u128,
    ) -> Result<(), ChainError> {
        let mut book = self.book();
        book.write()?;
        if bond < book.triple_cost {
            return Err(ChainError::message("MultiVault_InsufficientBalance()"));
        }
        if predicate != &book.predicate.term_id || object != &book.object.term_id {
            return Err(ChainError::message("MultiVault_TermDoesNotExist()"));
        }
        let subject = book
            .atoms
            .iter()
            .find(|a| &a.term_id == subject)
            .cloned()
            .ok_or_else(|| ChainError::message("MultiVault_TermDoesNotExist()"))?;

        let price = book.default_price;
        let triple = book.new_triple(subject, price, price);
        let reads_left = book.index_lag;
        if reads_left == 0 {
            book.triples.push(triple);
        } else {
            book.pending.push(Pending { triple, reads_left });
        }
        Ok(())
    }

    async fn deposit(&self, receiver: &str, vault: &TermId, curve: CurveId, amount: u128) -> Result<(), ChainError> {
        let mut book = self.book();
        book.write()?;
        if curve != TARGET_CURVE_ID {
            return Err(ChainError::message("MultiVault_InvalidCurve()"));
        }
        if let Some(counter) = book.counter_vault(vault) {
            let holds_counter = book
                .positions
                .iter()
                .any(|p| p.account_id == receiver && p.vault_id() == Some(counter) && p.shares_wei() > 0);
            if holds_counter {
                return Err(ChainError::message("execution reverted: MultiVault_HasCounterStake()"));
            }
        }
        let price = book.vault_price(vault);
        let shares = shares_for(amount, price);
        let raw = book
            .vault_mut(vault)
            .ok_or_else(|| ChainError::message("MultiVault_TermDoesNotExist()"))?;

        raw.total_shares = add_wei(&raw.total_shares, shares);
        raw.market_cap = Some(add_wei(raw.market_cap.as_deref().unwrap_or("0"), amount));

        let existing = book
            .positions
            .iter()
            .position(|p| p.account_id == receiver && p.vault_id().as_ref() == Some(vault));
        match existing {
            Some(i) => {
                let position = &mut book.positions[i];
                position.shares = Some(add_wei(position.shares.as_deref().unwrap_or("0"), amount));
            }
            None => {
                book.positions.push(RawPosition {
                    account_id: receiver.to_string(),
                    vault: Some(RawPositionVault { term_id: *vault }),
                    shares: Some(amount.to_string()),
                });
                if let Some(raw) = book.vault_mut(vault) {
                    raw.position_count += 1;
                }
            }
        }

        book.deposits.push(Deposit {
            receiver: receiver.to_string(),
            vault: *vault,
            amount,
        });
        Ok(())
    }

    async fn preview_deposit(&self, vault: &TermId, curve: CurveId, amount: u128) -> Result<u128, ChainError> {
        if curve != TARGET_CURVE_ID {
            return Err(ChainError::message("MultiVault_InvalidCurve()"));
        }
        let mut book = self.book();
        if book.vault_mut(vault).is_none() {
            return Err(ChainError::message("MultiVault_TermDoesNotExist()"));
        }
        let price = book.vault_price(vault);
        Ok(shares_for(amount, price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustcard_core::Side;

    #[tokio::test]
    async fn test_deposit_opens_position_and_updates_vault() {
        let net = MemoryNetwork::new();
        let claim = net.add_claim("Alice", 20_000_000_000_000_000, 0);
        let (support, _) = net.vaults_of(&claim).unwrap();

        net.deposit("0xabc", &support, TARGET_CURVE_ID, WEI_PER_TRUST).await.unwrap();
        net.deposit("0xabc", &support, TARGET_CURVE_ID, WEI_PER_TRUST).await.unwrap();

        let filter = AccountFilter::for_address("0xABC", 200);
        let positions = net.positions(&filter).await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].shares_wei(), 2 * WEI_PER_TRUST);

        let triples = net.claims(&net.predicate_id(), &net.object_id()).await.unwrap();
        let vault = triples[0].to_claim().support_vault.unwrap();
        assert_eq!(vault.position_count, 1);
        assert_eq!(vault.market_cap, 2 * WEI_PER_TRUST);
        assert_eq!(triples[0].to_claim().side_of_vault(&support), Some(Side::Support));
    }

    #[tokio::test]
    async fn test_lagging_triple_appears_after_reads() {
        let net = MemoryNetwork::new();
        let subject = net.add_atom("Bob", 0);
        net.set_index_lag(2);
        net.create_triple(&subject, &net.predicate_id(), &net.object_id(), DEFAULT_TRIPLE_COST)
            .await
            .unwrap();

        let (p, o) = (net.predicate_id(), net.object_id());
        assert!(net.claim_for_subject(&subject, &p, &o).await.unwrap().is_none());
        assert!(net.claim_for_subject(&subject, &p, &o).await.unwrap().is_none());
        assert!(net.claim_for_subject(&subject, &p, &o).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_sorted() {
        let net = MemoryNetwork::new();
        net.add_atom("zoe", 0);
        net.add_atom("Zack", 0);
        net.add_atom("Amy", 0);

        let hits = net.search_atoms("%Z%", 10).await.unwrap();
        let labels: Vec<_> = hits.iter().filter_map(|a| a.label.clone()).collect();
        assert_eq!(labels, vec!["Zack".to_string(), "zoe".to_string()]);
    }
}
