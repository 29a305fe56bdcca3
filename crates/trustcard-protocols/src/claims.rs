//! Identity atom and claim creation.

use serde::Serialize;
use tracing::{debug, info, warn};
use trustcard_core::{Claim, RawTriple, TermId};

use crate::classify::ChainAction;
use crate::error::{Error, Result};
use crate::interfaces::{ChainClient, Indexer, PinPerson};
use crate::orchestrator::StakeOrchestrator;

/// Optional metadata pinned alongside a new identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentityMetadata {
    pub description: Option<String>,
    /// Image URL or data URL.
    pub image: Option<String>,
    pub url: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl<I, C> StakeOrchestrator<I, C>
where
    I: Indexer + 'static,
    C: ChainClient + 'static,
{
    /// Id of the identity atom labelled `label`, creating it if needed.
    pub async fn ensure_identity_atom(
        &self,
        label: &str,
        deposit_wei: u128,
        metadata: IdentityMetadata,
    ) -> Result<TermId> {
        self.require_wallet("create an identity")?;

        let label = label.trim();
        if label.is_empty() {
            return Err(Error::EmptyLabel);
        }

        if let Some(existing) = self.indexer.atom_by_label(label).await? {
            debug!(label, atom = %existing.term_id, "Identity already exists");
            return Ok(existing.term_id);
        }

        let person = PinPerson {
            name: label.to_string(),
            description: non_blank(metadata.description),
            image: non_blank(metadata.image),
            url: non_blank(metadata.url),
            email: None,
            identifier: None,
        };
        let uri = self.indexer.pin_person(&person).await?.ok_or(Error::PinFailed)?;
        if !uri.starts_with("ipfs://") {
            return Err(Error::UnexpectedPinUri(uri));
        }

        let atom = self
            .chain
            .create_atom(&uri, deposit_wei)
            .await
            .map_err(|e| Error::rejected(ChainAction::CreateIdentity, e))?;

        info!(label, atom = %atom, uri = %uri, "Identity created");
        Ok(atom)
    }

    /// Create and seed the claim for `subject`.
    ///
    /// A zero `deposit_wei` seeds with the minimum stake.
    pub async fn ensure_claim(&self, subject: TermId, deposit_wei: u128) -> Result<Claim> {
        let account = self.require_wallet("create a triple")?;
        let _guard = self.working().try_acquire(subject).ok_or(Error::Busy(subject))?;

        if let Some(existing) = self.find_claim(&subject).await? {
            return Err(Error::ClaimExists {
                claim: existing.term_id,
            });
        }

        let cost = self
            .chain
            .triple_cost()
            .await
            .map_err(|e| Error::rejected(ChainAction::CreateClaim, e))?;
        self.chain
            .create_triple(&subject, &self.config.predicate_id, &self.config.object_id, cost)
            .await
            .map_err(|e| Error::rejected(ChainAction::CreateClaim, e))?;
        debug!(subject = %subject, cost = %cost, "Triple submitted, waiting for indexer");

        let retry = self.config.retry;
        let created = retry
            .poll(move |_| async move { self.find_claim(&subject).await })
            .await?
            .ok_or(Error::IndexingLag {
                what: "Claim creation",
                attempts: retry.max_attempts,
            })?;

        let seed = if deposit_wei > 0 {
            deposit_wei
        } else {
            self.config.min_stake_wei
        };
        self.chain
            .deposit(&account, &created.term_id, self.config.curve_id, seed)
            .await
            .map_err(|e| Error::rejected(ChainAction::CreateClaim, e))?;

        let seeded = retry
            .poll(move |_| async move {
                let found = self.find_claim(&subject).await?;
                Ok::<_, Error>(found.filter(|c| c.support_vault.is_some()))
            })
            .await?;
        let claim = seeded.unwrap_or(created);

        info!(subject = %subject, claim = %claim.term_id, seed = %seed, "Claim created");

        if let Err(e) = self.reload_claims().await {
            warn!(error = %e, "Reload after claim creation failed");
        }
        Ok(claim)
    }

    async fn find_claim(&self, subject: &TermId) -> Result<Option<Claim>> {
        let raw: Option<RawTriple> = self
            .indexer
            .claim_for_subject(subject, &self.config.predicate_id, &self.config.object_id)
            .await?;
        Ok(raw.map(|t| t.to_claim()))
    }
}
