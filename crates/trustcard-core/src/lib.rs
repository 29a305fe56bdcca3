//! Trust Card Core
//!
//! Data model and local bookkeeping for staking on Trust Card claims.
//!
//! # Design
//!
//! A claim is a subject → "should be holder of" → "Trust Card" triple with
//! two bonding-curve vaults: support (the triple itself) and oppose (its
//! counter-triple). The indexer reports the connected wallet's positions as
//! raw share amounts per vault; the [`aggregator`] turns those into a
//! [`StakeMap`] keyed by claim.
//!
//! # Optimistic Ledger
//!
//! The [`Ledger`] holds the wallet's stake per claim. After a deposit is
//! accepted it is bumped speculatively so the new position shows up before
//! the indexer catches up. The next authoritative reconciliation replaces
//! the ledger wholesale: authoritative data always wins, last write wins.

pub mod aggregator;
pub mod error;
mod ledger;
pub mod model;
pub mod records;
mod tally;
pub mod units;

pub use aggregator::{aggregate_claim, aggregate_positions, count_unique_voters, stake_from_position};
pub use error::{Error, Result};
pub use ledger::{Ledger, LedgerEntry, Provenance};
pub use model::{
    Atom, AtomWithMarketCap, Claim, CurveId, Side, SideStake, StakeMap, TermId, UserStake, Vault,
    TARGET_CURVE_ID,
};
pub use records::{RawAtom, RawPosition, RawTriple, RawVault, RawVaultCap};
pub use tally::{vote_increment, SideCounts, VoteTally, VOTE_UNIT_WEI};
pub use units::{parse_trust_to_wei, parse_trust_to_wei_allow_zero, wei_to_trust, MIN_STAKE_WEI, WEI_PER_TRUST};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimistic_bump_then_authoritative_refresh() {
        // Claim with support price 0.02 TRUST/share, wallet holds 1 TRUST
        let raw: RawTriple = serde_json::from_value(serde_json::json!({
            "term_id": format!("0x{}", "11".repeat(32)),
            "subject": { "term_id": format!("0x{}", "22".repeat(32)), "label": "Alice", "image": null },
            "predicate": { "term_id": format!("0x{}", "33".repeat(32)), "label": "should be holder of", "image": null },
            "object": { "term_id": format!("0x{}", "44".repeat(32)), "label": "Trust Card", "image": null },
            "term": { "vaults": [{
                "term_id": format!("0x{}", "11".repeat(32)), "curve_id": "2",
                "total_shares": "0", "current_share_price": "20000000000000000",
                "market_cap": "0", "position_count": 1
            }] },
            "counter_term": { "vaults": [{
                "term_id": format!("0x{}", "55".repeat(32)), "curve_id": "2",
                "total_shares": "0", "current_share_price": "0",
                "market_cap": null, "position_count": 0
            }] }
        }))
        .unwrap();
        let claims = vec![raw.to_claim()];
        let positions: Vec<RawPosition> = serde_json::from_value(serde_json::json!([{
            "account_id": "0xabc",
            "vault": { "term_id": format!("0x{}", "11".repeat(32)) },
            "shares": "1000000000000000000"
        }]))
        .unwrap();

        let mut ledger = Ledger::new();
        ledger.reconcile(aggregate_positions(&claims, &positions));
        let id = claims[0].term_id;
        let stake = ledger.stake_or_default(&id);
        assert!((stake.support.value - 1.0).abs() < 1e-12);
        assert!((stake.support.shares - 50.0).abs() < 1e-9);
        assert_eq!(stake.oppose, SideStake::ZERO);

        // Speculative bump, then a refresh that does not include it yet
        ledger.bump(id, Side::Support, 0.5, 25.0);
        assert!(ledger.is_speculative(&id));
        ledger.reconcile(aggregate_positions(&claims, &positions));
        assert_eq!(ledger.stake_or_default(&id), stake);
        assert_eq!(ledger.provenance(&id), Some(Provenance::Authoritative));
    }
}
