//! Vote page controller.
//!
//! Owns the orchestrator and turns action outcomes into what the page
//! shows: an inline error line and toast notifications. Connectivity,
//! validation and conflict errors stay inline; chain rejections, indexing
//! lag and indexer failures are logged and toasted as well.

use serde::Serialize;
use tracing::{error, info, warn};
use trustcard_core::{parse_trust_to_wei_allow_zero, AtomWithMarketCap, Claim, Side, TermId};
use trustcard_protocols::{
    ChainClient, Error, IdentityMetadata, Indexer, PageSnapshot, StakeOrchestrator, StakeReceipt,
};

use crate::notify::{Notification, Notifications};

/// Everything rendered, serializable.
#[derive(Debug, Clone, Serialize)]
pub struct PageView {
    #[serde(flatten)]
    pub page: PageSnapshot,
    pub error: Option<String>,
    pub toasts: Vec<Notification>,
}

/// A subject chosen or created for the next claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingSubject {
    pub term_id: TermId,
    pub label: String,
}

pub struct VotePage<I, C> {
    orchestrator: StakeOrchestrator<I, C>,
    notifications: Notifications,
    inline_error: Option<String>,
    pending_subject: Option<PendingSubject>,
}

impl<I, C> VotePage<I, C>
where
    I: Indexer + 'static,
    C: ChainClient + 'static,
{
    pub fn new(orchestrator: StakeOrchestrator<I, C>) -> Self {
        Self {
            orchestrator,
            notifications: Notifications::new(),
            inline_error: None,
            pending_subject: None,
        }
    }

    pub fn orchestrator(&self) -> &StakeOrchestrator<I, C> {
        &self.orchestrator
    }

    /// Inline error line, if any.
    pub fn inline_error(&self) -> Option<&str> {
        self.inline_error.as_deref()
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn dismiss(&mut self, id: u64) {
        self.notifications.dismiss(id);
    }

    pub fn pending_subject(&self) -> Option<&PendingSubject> {
        self.pending_subject.as_ref()
    }

    /// Load claims, votes and the wallet's positions.
    pub async fn load(&mut self) -> bool {
        match self.orchestrator.reload_claims().await {
            Ok(count) => {
                info!(claims = count, "Page loaded");
                true
            }
            Err(e) => {
                error!(error = %e, "Loading claims failed");
                self.inline_error = Some("Error while loading the list.".to_string());
                false
            }
        }
    }

    pub async fn handle_upvote(&mut self, claim: TermId, amount: &str) -> Option<StakeReceipt> {
        self.handle_stake(claim, Side::Support, amount).await
    }

    pub async fn handle_downvote(&mut self, claim: TermId, amount: &str) -> Option<StakeReceipt> {
        self.handle_stake(claim, Side::Oppose, amount).await
    }

    async fn handle_stake(&mut self, claim: TermId, side: Side, amount: &str) -> Option<StakeReceipt> {
        self.inline_error = None;
        match self.orchestrator.stake(claim, side, amount).await {
            Ok(receipt) => {
                self.notifications
                    .success(format!("Your {side} position was submitted."));
                Some(receipt)
            }
            Err(e) => {
                self.report(e, "stake");
                None
            }
        }
    }

    /// Pick an existing atom as the next claim's subject.
    pub fn use_existing(&mut self, label: &str, term_id: TermId) {
        self.pending_subject = Some(PendingSubject {
            term_id,
            label: label.to_string(),
        });
    }

    /// Create (or find) the identity atom for `label` and make it the
    /// pending subject. `deposit` is a TRUST amount; blank means none.
    pub async fn handle_create_identity(
        &mut self,
        label: &str,
        deposit: &str,
        metadata: IdentityMetadata,
    ) -> Option<TermId> {
        self.inline_error = None;
        let deposit_wei = parse_trust_to_wei_allow_zero(deposit);
        match self
            .orchestrator
            .ensure_identity_atom(label, deposit_wei, metadata)
            .await
        {
            Ok(term_id) => {
                let label = label.trim().to_string();
                self.notifications.success(format!("Identity \"{label}\" ready."));
                self.pending_subject = Some(PendingSubject { term_id, label });
                Some(term_id)
            }
            Err(e) => {
                self.report(e, "create identity");
                None
            }
        }
    }

    /// Create the claim for `subject`, seeding it with `deposit` TRUST
    /// (the minimum stake when blank).
    pub async fn handle_create_claim(&mut self, subject: Option<TermId>, deposit: &str) -> Option<Claim> {
        self.inline_error = None;
        let Some(subject) = subject else {
            self.report(Error::SubjectNotReady, "create claim");
            return None;
        };

        let deposit_wei = parse_trust_to_wei_allow_zero(deposit);
        match self.orchestrator.ensure_claim(subject, deposit_wei).await {
            Ok(claim) => {
                self.notifications.success("Claim created successfully.");
                self.pending_subject = None;
                Some(claim)
            }
            Err(e) => {
                self.report(e, "create claim");
                None
            }
        }
    }

    /// Shares a deposit would mint, for the amount field hint.
    pub async fn preview(&self, claim: TermId, side: Side, amount: &str) -> f64 {
        self.orchestrator.preview_deposit(claim, side, amount).await
    }

    /// Atom suggestions for the claim start dialog. Failures read as no hits.
    pub async fn search(&self, query: &str) -> Vec<AtomWithMarketCap> {
        self.orchestrator.search_atoms(query).await.unwrap_or_else(|e| {
            warn!(query, error = %e, "Atom search failed");
            Vec::new()
        })
    }

    /// Reconcile the ledger after the wallet connects, disconnects or
    /// switches account.
    pub async fn on_wallet_changed(&mut self) -> bool {
        match self.orchestrator.refresh_positions().await {
            Ok(held) => {
                info!(held, "Ledger reconciled for wallet change");
                true
            }
            Err(e) => {
                self.report(e, "refresh positions");
                false
            }
        }
    }

    /// Current page view.
    pub async fn view(&self) -> PageView {
        let page = self.orchestrator.state().read().await.snapshot();
        PageView {
            page,
            error: self.inline_error.clone(),
            toasts: self.notifications.iter().cloned().collect(),
        }
    }

    fn report(&mut self, err: Error, action: &'static str) {
        let message = err.to_string();
        if !err.is_local() {
            error!(action, category = ?err.category(), error = %message, "Action failed");
            self.notifications.error(message.clone());
        }
        self.inline_error = Some(message);
    }
}
