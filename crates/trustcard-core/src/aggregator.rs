//! Position aggregation.
//!
//! Turns the indexer's flat list of wallet positions into a per-claim,
//! per-side [`StakeMap`]. Positions in vaults that belong to no known claim
//! are dropped; they are either stale or unrelated to the Trust Card claims.

use std::collections::{HashMap, HashSet};

use crate::model::{Claim, Side, SideStake, StakeMap, TermId, UserStake, Vault};
use crate::records::RawPosition;
use crate::units::wei_to_trust;

/// Convert a raw position amount into `{value, shares}` at the vault's
/// current price. An unknown price (`<= 0`) converts 1:1.
pub fn stake_from_position(vault: &Vault, raw_wei: u128) -> SideStake {
    let value = wei_to_trust(raw_wei);
    let price = vault.price();
    let shares = if price > 0.0 { value / price } else { value };
    SideStake { value, shares }
}

/// Index vault id → (claim index, side). The first claim claiming a vault
/// id keeps it.
fn vault_index(claims: &[Claim]) -> HashMap<TermId, (usize, Side)> {
    let mut index = HashMap::new();
    for (i, claim) in claims.iter().enumerate() {
        for side in [Side::Support, Side::Oppose] {
            if let Some(vault) = claim.vault(side) {
                index.entry(vault.term_id).or_insert((i, side));
            }
        }
    }
    index
}

/// Aggregate raw positions into a stake map.
///
/// Zero-share positions are excluded rather than recorded as zero entries.
/// A claim/side seen twice keeps the last computed value.
pub fn aggregate_positions(claims: &[Claim], positions: &[RawPosition]) -> StakeMap {
    let index = vault_index(claims);
    let mut stakes = StakeMap::new();

    for position in positions {
        let Some(vault_id) = position.vault_id() else {
            continue;
        };
        let raw = position.shares_wei();
        if raw == 0 {
            continue;
        }
        let Some(&(claim_idx, side)) = index.get(&vault_id) else {
            continue;
        };
        let claim = &claims[claim_idx];
        let Some(vault) = claim.vault(side) else {
            continue;
        };

        let entry = stakes.entry(claim.term_id).or_insert_with(UserStake::default);
        *entry.side_mut(side) = stake_from_position(vault, raw);
    }

    stakes
}

/// Aggregate positions for a single claim. `None` when the wallet holds
/// nothing on it.
pub fn aggregate_claim(claim: &Claim, positions: &[RawPosition]) -> Option<UserStake> {
    aggregate_positions(std::slice::from_ref(claim), positions).remove(&claim.term_id)
}

/// Count distinct accounts (case-insensitive) holding a nonzero position in
/// any of the given vaults.
pub fn count_unique_voters(vault_ids: &[TermId], positions: &[RawPosition]) -> usize {
    let wanted: HashSet<&TermId> = vault_ids.iter().collect();
    positions
        .iter()
        .filter(|p| p.shares_wei() > 0)
        .filter(|p| p.vault_id().is_some_and(|id| wanted.contains(&id)))
        .map(|p| p.account_id.to_lowercase())
        .collect::<HashSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{claim, term};
    use crate::records::RawPositionVault;
    use crate::units::WEI_PER_TRUST;
    use proptest::prelude::*;

    fn position(account: &str, vault: TermId, shares: &str) -> RawPosition {
        RawPosition {
            account_id: account.to_string(),
            vault: Some(RawPositionVault { term_id: vault }),
            shares: Some(shares.to_string()),
        }
    }

    #[test]
    fn converts_at_vault_price() {
        // 0.02 TRUST per share, 1 TRUST held -> 50 shares
        let claims = vec![claim(1, 20_000_000_000_000_000, 0)];
        let positions = vec![position("0xa", term(1), &WEI_PER_TRUST.to_string())];

        let stakes = aggregate_positions(&claims, &positions);
        let stake = stakes[&term(1)];
        assert!((stake.support.value - 1.0).abs() < 1e-12);
        assert!((stake.support.shares - 50.0).abs() < 1e-9);
        assert_eq!(stake.oppose, SideStake::ZERO);
    }

    #[test]
    fn unknown_price_converts_one_to_one() {
        let claims = vec![claim(1, 0, 0)];
        let positions = vec![position("0xa", term(101), "50000000000000000")];

        let stake = aggregate_positions(&claims, &positions)[&term(1)];
        assert_eq!(stake.oppose.value, 0.05);
        assert_eq!(stake.oppose.shares, 0.05);
        assert!(!stake.support.is_held());
    }

    #[test]
    fn drops_zero_unknown_and_vaultless_positions() {
        let claims = vec![claim(1, 0, 0)];
        let positions = vec![
            position("0xa", term(1), "0"),
            position("0xa", term(1), "garbage"),
            position("0xa", term(9), "1000"),
            RawPosition { account_id: "0xa".into(), vault: None, shares: Some("1000".into()) },
        ];
        assert!(aggregate_positions(&claims, &positions).is_empty());
    }

    #[test]
    fn duplicate_side_keeps_last_value() {
        let claims = vec![claim(1, 0, 0)];
        let positions = vec![
            position("0xa", term(1), "30000000000000000"),
            position("0xa", term(1), "10000000000000000"),
        ];
        let stake = aggregate_positions(&claims, &positions)[&term(1)];
        assert_eq!(stake.support.value, 0.01);
    }

    #[test]
    fn shared_vault_id_goes_to_first_claim() {
        let first = claim(1, 0, 0);
        let mut second = claim(2, 0, 0);
        second.support_vault = first.support_vault.clone();

        let positions = vec![position("0xa", term(1), "10000000000000000")];
        let stakes = aggregate_positions(&[first, second], &positions);
        assert!(stakes.contains_key(&term(1)));
        assert!(!stakes.contains_key(&term(2)));
    }

    #[test]
    fn single_claim_aggregation() {
        let target = claim(1, 0, 0);
        let positions = vec![
            position("0xa", term(2), "10000000000000000"),
            position("0xa", term(1), "10000000000000000"),
        ];
        assert!(aggregate_claim(&target, &positions).is_some());
        assert!(aggregate_claim(&claim(3, 0, 0), &positions).is_none());
    }

    #[test]
    fn unique_voters_ignore_case_and_empty_positions() {
        let vaults = [term(1), term(101)];
        let positions = vec![
            position("0xABC", term(1), "1"),
            position("0xabc", term(101), "5"),
            position("0xdef", term(1), "0"),
            position("0x123", term(7), "9"),
            position("0x456", term(101), "2"),
        ];
        assert_eq!(count_unique_voters(&vaults, &positions), 2);
    }

    proptest! {
        #[test]
        fn aggregation_is_idempotent(amounts in proptest::collection::vec((0u8..4, 0u64..u64::MAX), 0..20)) {
            let claims = vec![claim(1, 20_000_000_000_000_000, 0), claim(2, 0, 5)];
            let vaults = [term(1), term(101), term(2), term(102)];
            let positions: Vec<_> = amounts
                .iter()
                .map(|&(v, amt)| position("0xa", vaults[v as usize], &amt.to_string()))
                .collect();

            let once = aggregate_positions(&claims, &positions);
            let twice = aggregate_positions(&claims, &positions);
            prop_assert_eq!(once, twice);
        }
    }
}
