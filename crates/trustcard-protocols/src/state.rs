//! Page-level state shared by the orchestrator and its readers.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use trustcard_core::{Claim, Ledger, SideCounts, TermId, UserStake, VoteTally};

/// Progress of a stake action on one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionState {
    /// Nothing in flight.
    Idle,
    /// Checking wallet, network and counter-stakes.
    Validating,
    /// Parsing the amount and waiting on the wallet.
    AwaitingWallet,
    /// Deposit sent to the chain.
    Submitted,
    /// Refreshing claims and positions from the indexer.
    Reconciling,
    /// Last action failed.
    Failed,
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Validating => write!(f, "Validating"),
            Self::AwaitingWallet => write!(f, "AwaitingWallet"),
            Self::Submitted => write!(f, "Submitted"),
            Self::Reconciling => write!(f, "Reconciling"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Everything the page shows: claims, the wallet's ledger, vote tallies.
///
/// Held behind a single `RwLock` by the orchestrator. No lock is held
/// across a network call.
#[derive(Debug, Default)]
pub struct PageState {
    /// Claims from the last reload, newest first.
    pub claims: Vec<Claim>,
    /// Connected wallet's stakes.
    pub ledger: Ledger,
    /// Displayed vote counts.
    pub tally: VoteTally,
    /// Distinct voters across all claim vaults, `None` if the count failed.
    pub unique_voters: Option<usize>,
    /// Wallet the ledger belongs to.
    pub account: Option<String>,
    actions: HashMap<TermId, ActionState>,
}

impl PageState {
    /// Create empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim by id.
    pub fn claim(&self, id: &TermId) -> Option<&Claim> {
        self.claims.iter().find(|c| &c.term_id == id)
    }

    /// Stake the wallet holds on a claim, zero when unknown.
    pub fn user_stake(&self, id: &TermId) -> UserStake {
        self.ledger.stake_or_default(id)
    }

    /// Displayed votes on a claim.
    pub fn votes(&self, id: &TermId) -> SideCounts {
        self.tally.get(id)
    }

    /// Action progress on a claim.
    pub fn action_state(&self, id: &TermId) -> ActionState {
        self.actions.get(id).copied().unwrap_or(ActionState::Idle)
    }

    pub(crate) fn set_action_state(&mut self, id: TermId, state: ActionState) {
        if state == ActionState::Idle {
            self.actions.remove(&id);
        } else {
            self.actions.insert(id, state);
        }
    }

    /// Serializable view for rendering or logging.
    pub fn snapshot(&self) -> PageSnapshot {
        let claims = self
            .claims
            .iter()
            .map(|c| ClaimView {
                term_id: c.term_id,
                subject: c.subject.display_label(),
                support_market_cap: c.support_vault.as_ref().map_or(0.0, |v| v.market_cap_trust()),
                oppose_market_cap: c.oppose_vault.as_ref().map_or(0.0, |v| v.market_cap_trust()),
                votes: self.tally.get(&c.term_id),
                stake: self.ledger.stake_or_default(&c.term_id),
                speculative: self.ledger.is_speculative(&c.term_id),
                action: self.action_state(&c.term_id),
            })
            .collect();
        PageSnapshot {
            account: self.account.clone(),
            unique_voters: self.unique_voters,
            claims,
        }
    }
}

/// One claim row as displayed.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimView {
    pub term_id: TermId,
    pub subject: String,
    pub support_market_cap: f64,
    pub oppose_market_cap: f64,
    pub votes: SideCounts,
    pub stake: UserStake,
    pub speculative: bool,
    pub action: ActionState,
}

/// Serializable page view.
#[derive(Debug, Clone, Serialize)]
pub struct PageSnapshot {
    pub account: Option<String>,
    pub unique_voters: Option<usize>,
    pub claims: Vec<ClaimView>,
}

/// Claims with a write action in flight.
///
/// Acquiring returns a guard; dropping the guard releases the claim, so the
/// lock is released on every exit path.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    inner: Arc<Mutex<HashSet<TermId>>>,
}

impl WorkingSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a claim as working. `None` if it already is.
    pub fn try_acquire(&self, claim: TermId) -> Option<WorkingGuard> {
        let mut set = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if set.insert(claim) {
            Some(WorkingGuard {
                set: self.clone(),
                claim,
            })
        } else {
            None
        }
    }

    /// Whether a claim is working.
    pub fn is_working(&self, claim: &TermId) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(claim)
    }

    /// Number of claims working.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if nothing is working.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, claim: &TermId) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(claim);
    }
}

/// Releases its claim from the [`WorkingSet`] on drop.
#[derive(Debug)]
pub struct WorkingGuard {
    set: WorkingSet,
    claim: TermId,
}

impl WorkingGuard {
    /// The claim this guard holds.
    pub fn claim(&self) -> TermId {
        self.claim
    }
}

impl Drop for WorkingGuard {
    fn drop(&mut self) {
        self.set.release(&self.claim);
    }
}
