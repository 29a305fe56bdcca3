//! Stake Orchestrator - sequencing of stake actions over the optimistic ledger.
//!
//! This module provides the [`StakeOrchestrator`], the single owner of the
//! page state. It runs a stake action through
//! Validating → AwaitingWallet → Submitted → Reconciling and back to Idle
//! (or Failed):
//!
//! - **Validating**: wallet connected, right network, vault present, no
//!   stake held on the opposite side
//! - **AwaitingWallet**: amount parsed to wei and checked against the minimum
//! - **Submitted**: deposit sent while the claim is marked working
//! - **Reconciling**: ledger and tally bumped, then refreshed from the indexer
//!
//! Failures leave the ledger untouched. The working mark is a guard and is
//! released on every exit path.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use trustcard_core::{
    aggregate_positions, count_unique_voters, parse_trust_to_wei, parse_trust_to_wei_allow_zero,
    records::attach_market_caps, vote_increment, wei_to_trust, AtomWithMarketCap, Claim, CurveId,
    Side, TermId, UserStake, MIN_STAKE_WEI, TARGET_CURVE_ID, VOTE_UNIT_WEI,
};

use crate::classify::ChainAction;
use crate::error::{Error, Result};
use crate::interfaces::{AccountFilter, ChainClient, Connection, Indexer};
use crate::retry::RetryPolicy;
use crate::state::{ActionState, PageState, WorkingSet};

/// Chain id of Intuition Mainnet.
pub const INTUITION_MAINNET_CHAIN_ID: u64 = 1155;

/// When the authoritative refresh after a successful stake runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Awaited before the action returns.
    Inline,
    /// Spawned on the runtime; the action returns right after the bump.
    Background,
    /// Left to the caller.
    Manual,
}

/// Configuration for a stake orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Chain the wallet must be connected to.
    pub chain_id: u64,

    /// Fixed predicate of every claim ("should be holder of").
    pub predicate_id: TermId,

    /// Fixed object of every claim ("Trust Card").
    pub object_id: TermId,

    /// Bonding curve deposits go to.
    pub curve_id: CurveId,

    /// Smallest accepted stake, in wei.
    pub min_stake_wei: u128,

    /// Stake worth one vote, in wei.
    pub vote_unit_wei: u128,

    /// Polling policy for writes waiting on the indexer.
    pub retry: RetryPolicy,

    /// Page size of the positions query.
    pub positions_limit: usize,

    /// Maximum atom search hits.
    pub search_limit: usize,

    /// Refresh strategy after a successful stake.
    pub refresh: RefreshMode,
}

impl OrchestratorConfig {
    /// Config for claims of `predicate_id` → `object_id`, with defaults for
    /// everything else.
    #[must_use]
    pub fn new(predicate_id: TermId, object_id: TermId) -> Self {
        Self {
            chain_id: INTUITION_MAINNET_CHAIN_ID,
            predicate_id,
            object_id,
            curve_id: TARGET_CURVE_ID,
            min_stake_wei: MIN_STAKE_WEI,
            vote_unit_wei: VOTE_UNIT_WEI,
            retry: RetryPolicy::default(),
            positions_limit: 200,
            search_limit: 10,
            refresh: RefreshMode::Inline,
        }
    }

    /// Set the required chain id.
    #[must_use]
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Set the minimum stake (also used as vote unit).
    #[must_use]
    pub fn with_min_stake(mut self, wei: u128) -> Self {
        self.min_stake_wei = wei;
        self.vote_unit_wei = wei;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the refresh strategy.
    #[must_use]
    pub fn with_refresh(mut self, refresh: RefreshMode) -> Self {
        self.refresh = refresh;
        self
    }
}

/// Outcome of an accepted stake.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StakeReceipt {
    pub claim: TermId,
    pub side: Side,
    pub amount_wei: u128,
    /// Shares credited optimistically.
    pub estimated_shares: f64,
    /// Votes added to the displayed tally.
    pub votes: u64,
}

/// Owner of the page state and runner of stake actions.
pub struct StakeOrchestrator<I, C> {
    pub(crate) indexer: Arc<I>,
    pub(crate) chain: Arc<C>,
    pub(crate) config: OrchestratorConfig,
    pub(crate) state: Arc<RwLock<PageState>>,
    working: WorkingSet,
}

impl<I, C> Clone for StakeOrchestrator<I, C> {
    fn clone(&self) -> Self {
        Self {
            indexer: Arc::clone(&self.indexer),
            chain: Arc::clone(&self.chain),
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            working: self.working.clone(),
        }
    }
}

impl<I, C> StakeOrchestrator<I, C>
where
    I: Indexer + 'static,
    C: ChainClient + 'static,
{
    /// Create an orchestrator with empty page state.
    pub fn new(indexer: Arc<I>, chain: Arc<C>, config: OrchestratorConfig) -> Self {
        debug!(
            chain_id = config.chain_id,
            curve_id = config.curve_id,
            min_stake_wei = %config.min_stake_wei,
            "Created stake orchestrator"
        );
        Self {
            indexer,
            chain,
            config,
            state: Arc::new(RwLock::new(PageState::new())),
            working: WorkingSet::new(),
        }
    }

    /// Shared page state.
    pub fn state(&self) -> Arc<RwLock<PageState>> {
        Arc::clone(&self.state)
    }

    /// Configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Claims with an action in flight.
    pub fn working(&self) -> &WorkingSet {
        &self.working
    }

    /// Connected account on the right chain, or the connectivity error for
    /// `action`.
    pub fn require_wallet(&self, action: &'static str) -> Result<String> {
        match self.chain.connection() {
            Connection::Disconnected => Err(Error::WalletDisconnected { action }),
            Connection::Connected { chain_id, .. } if chain_id != self.config.chain_id => {
                Err(Error::WrongNetwork {
                    actual: chain_id,
                    expected: self.config.chain_id,
                    action,
                })
            }
            Connection::Connected { account, .. } => Ok(account),
        }
    }

    /// Reload claims, reseed tallies, recount voters and reconcile the
    /// ledger. Returns the number of claims.
    pub async fn reload_claims(&self) -> Result<usize> {
        let raw = self
            .indexer
            .claims(&self.config.predicate_id, &self.config.object_id)
            .await?;
        let claims: Vec<Claim> = raw.iter().map(|t| t.to_claim()).collect();

        {
            let mut state = self.state.write().await;
            state.tally.seed(&claims);
            state.claims = claims.clone();
        }

        let count = claims.len();
        let voters = match self.count_voters(&claims).await {
            Ok(n) => Some(n),
            Err(e) => {
                warn!(error = %e, "Counting unique voters failed");
                None
            }
        };
        self.state.write().await.unique_voters = voters;

        debug!(claims = count, voters = ?voters, "Reloaded claims");

        self.refresh_positions().await?;
        Ok(count)
    }

    async fn count_voters(&self, claims: &[Claim]) -> Result<usize> {
        let mut vault_ids: Vec<TermId> = claims.iter().flat_map(Claim::vault_ids).collect();
        vault_ids.sort();
        vault_ids.dedup();
        if vault_ids.is_empty() {
            return Ok(0);
        }
        let positions = self.indexer.vault_positions(&vault_ids).await?;
        Ok(count_unique_voters(&vault_ids, &positions))
    }

    /// Fetch the connected wallet's positions and reconcile the ledger.
    /// A disconnected wallet reconciles to an empty ledger.
    pub async fn refresh_positions(&self) -> Result<usize> {
        let account = match self.chain.connection() {
            Connection::Connected { account, .. } => account,
            Connection::Disconnected => {
                let mut state = self.state.write().await;
                if state.account.take().is_some() {
                    debug!("Wallet disconnected, clearing ledger");
                }
                state.ledger.reconcile(Default::default());
                return Ok(0);
            }
        };

        let filter = AccountFilter::for_address(&account, self.config.positions_limit);
        let positions = self.indexer.positions(&filter).await?;

        let mut state = self.state.write().await;
        let stakes = aggregate_positions(&state.claims, &positions);
        let held = state.ledger.reconcile(stakes);
        if state.account.as_deref() != Some(account.as_str()) {
            debug!(account = %account, "Ledger now tracks a new wallet");
            state.account = Some(account);
        }
        debug!(positions = positions.len(), held, generation = state.ledger.generation(), "Reconciled ledger");
        Ok(held)
    }

    async fn set_action(&self, claim: TermId, action: ActionState) {
        debug!(claim = %claim, state = %action, "Stake action transition");
        self.state.write().await.set_action_state(claim, action);
    }

    /// Stake `amount` TRUST on one side of a claim.
    ///
    /// A second call for the same claim while one is in flight fails with
    /// [`Error::Busy`] instead of queueing.
    pub async fn stake(&self, claim: TermId, side: Side, amount: &str) -> Result<StakeReceipt> {
        let _guard = self.working.try_acquire(claim).ok_or(Error::Busy(claim))?;

        let result = self.run_stake(claim, side, amount).await;
        let terminal = if result.is_ok() {
            ActionState::Idle
        } else {
            ActionState::Failed
        };
        self.set_action(claim, terminal).await;
        result
    }

    async fn run_stake(&self, claim_id: TermId, side: Side, amount: &str) -> Result<StakeReceipt> {
        self.set_action(claim_id, ActionState::Validating).await;
        let account = self.require_wallet("trade")?;

        // The ledger belongs to whichever wallet was connected at the last refresh
        let tracked = self.state.read().await.account.clone();
        if tracked.as_deref() != Some(account.as_str()) {
            debug!(account = %account, "Wallet changed since last refresh");
            self.refresh_positions().await?;
        }

        let (vault, known) = {
            let state = self.state.read().await;
            let claim = state.claim(&claim_id).ok_or(Error::ClaimNotFound(claim_id))?;
            let vault = claim.vault(side).cloned().ok_or(Error::VaultMissing { side })?;
            (vault, state.ledger.get(&claim_id).copied())
        };

        // Without a local entry the ledger may be stale: ask the indexer
        let current: UserStake = match known {
            Some(stake) => stake,
            None => {
                self.refresh_positions().await?;
                self.state.read().await.user_stake(&claim_id)
            }
        };
        if current.side(side.opposite()).is_held() {
            return Err(Error::CounterStake {
                held: side.opposite(),
                wanted: side,
            });
        }

        self.set_action(claim_id, ActionState::AwaitingWallet).await;
        let wei = parse_trust_to_wei(amount).map_err(|_| Error::InvalidAmount(amount.to_string()))?;
        if wei == 0 {
            return Err(Error::InvalidAmount(amount.to_string()));
        }
        if wei < self.config.min_stake_wei {
            return Err(Error::BelowMinimum {
                min: wei_to_trust(self.config.min_stake_wei),
            });
        }

        self.set_action(claim_id, ActionState::Submitted).await;
        self.chain
            .deposit(&account, &vault.term_id, self.config.curve_id, wei)
            .await
            .map_err(|e| Error::rejected(ChainAction::Stake(side), e))?;

        let amount_trust = wei_to_trust(wei);
        let price = vault.price();
        let estimated_shares = if price > 0.0 { amount_trust / price } else { amount_trust };
        let votes = vote_increment(wei, self.config.vote_unit_wei);
        {
            let mut state = self.state.write().await;
            state.ledger.bump(claim_id, side, amount_trust, estimated_shares);
            state
                .tally
                .bump(&claim_id, side, i64::try_from(votes).unwrap_or(i64::MAX));
        }

        info!(
            claim = %claim_id,
            side = %side,
            amount = amount_trust,
            estimated_shares,
            votes,
            "Stake submitted"
        );

        self.set_action(claim_id, ActionState::Reconciling).await;
        match self.config.refresh {
            RefreshMode::Inline => {
                if let Err(e) = self.reload_claims().await {
                    warn!(claim = %claim_id, error = %e, "Refresh after stake failed, keeping optimistic ledger");
                }
            }
            RefreshMode::Background => {
                let this = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.reload_claims().await {
                        warn!(claim = %claim_id, error = %e, "Background refresh after stake failed");
                    }
                });
            }
            RefreshMode::Manual => {}
        }

        Ok(StakeReceipt {
            claim: claim_id,
            side,
            amount_wei: wei,
            estimated_shares,
            votes,
        })
    }

    /// Shares (in TRUST units) a deposit of `amount` would mint now.
    ///
    /// Blank, unparseable or non-positive amounts, missing vaults and failed
    /// previews all read as zero.
    pub async fn preview_deposit(&self, claim: TermId, side: Side, amount: &str) -> f64 {
        let wei = parse_trust_to_wei_allow_zero(amount);
        if wei == 0 {
            return 0.0;
        }
        let vault_id = {
            let state = self.state.read().await;
            match state.claim(&claim).and_then(|c| c.vault(side)) {
                Some(v) => v.term_id,
                None => return 0.0,
            }
        };
        match self
            .chain
            .preview_deposit(&vault_id, self.config.curve_id, wei)
            .await
        {
            Ok(shares) => wei_to_trust(shares),
            Err(e) => {
                warn!(claim = %claim, error = %e, "previewDeposit failed");
                0.0
            }
        }
    }

    /// Atoms whose label contains `query`, with their total market cap.
    pub async fn search_atoms(&self, query: &str) -> Result<Vec<AtomWithMarketCap>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let pattern = format!("%{trimmed}%");
        let atoms: Vec<_> = self
            .indexer
            .search_atoms(&pattern, self.config.search_limit)
            .await?
            .iter()
            .map(|a| a.to_atom())
            .collect();
        if atoms.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<TermId> = atoms.iter().map(|a| a.term_id).collect();
        let caps = self.indexer.vault_market_caps(&ids).await?;
        Ok(attach_market_caps(atoms, &caps))
    }
}
