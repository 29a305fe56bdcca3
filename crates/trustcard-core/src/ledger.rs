//! Optimistic stake ledger.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Side, StakeMap, TermId, UserStake};

/// Where a ledger entry's current value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Straight from the last reconciliation.
    Authoritative,
    /// Patched by at least one bump since the last reconciliation.
    Speculative,
}

/// A ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub stake: UserStake,
    pub provenance: Provenance,
}

/// Local view of the connected wallet's stake on every claim.
///
/// Only two operations mutate it: [`reconcile`](Self::reconcile) replaces
/// everything with authoritative data, [`bump`](Self::bump) applies a
/// speculative delta. A reconcile discards every bump before it.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: HashMap<TermId, LedgerEntry>,
    /// Number of reconciliations applied.
    generation: u64,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole ledger with authoritative stakes.
    /// Returns the number of entries now held.
    pub fn reconcile(&mut self, stakes: StakeMap) -> usize {
        self.entries = stakes
            .into_iter()
            .map(|(id, stake)| {
                (
                    id,
                    LedgerEntry {
                        stake,
                        provenance: Provenance::Authoritative,
                    },
                )
            })
            .collect();
        self.generation += 1;
        self.entries.len()
    }

    /// Add a speculative delta to one side of a claim, flooring value and
    /// shares at zero. Non-finite deltas count as zero.
    /// Returns false when there was nothing to apply.
    pub fn bump(&mut self, claim: TermId, side: Side, delta_value: f64, delta_shares: f64) -> bool {
        let dv = finite_or_zero(delta_value);
        let ds = finite_or_zero(delta_shares);
        if dv == 0.0 && ds == 0.0 {
            return false;
        }

        let entry = self.entries.entry(claim).or_insert(LedgerEntry {
            stake: UserStake::default(),
            provenance: Provenance::Speculative,
        });
        let held = entry.stake.side_mut(side);
        held.value = (held.value + dv).max(0.0);
        held.shares = (held.shares + ds).max(0.0);
        entry.provenance = Provenance::Speculative;
        true
    }

    /// Stake on a claim, if the ledger has an entry for it.
    pub fn get(&self, claim: &TermId) -> Option<&UserStake> {
        self.entries.get(claim).map(|e| &e.stake)
    }

    /// Stake on a claim, zero when absent.
    pub fn stake_or_default(&self, claim: &TermId) -> UserStake {
        self.get(claim).copied().unwrap_or_default()
    }

    /// Full entry including provenance.
    pub fn entry(&self, claim: &TermId) -> Option<&LedgerEntry> {
        self.entries.get(claim)
    }

    /// Provenance of a claim's entry.
    pub fn provenance(&self, claim: &TermId) -> Option<Provenance> {
        self.entries.get(claim).map(|e| e.provenance)
    }

    /// Whether a claim's entry carries unconfirmed bumps.
    pub fn is_speculative(&self, claim: &TermId) -> bool {
        self.provenance(claim) == Some(Provenance::Speculative)
    }

    /// Whether the ledger knows the claim.
    pub fn contains(&self, claim: &TermId) -> bool {
        self.entries.contains_key(claim)
    }

    /// Number of reconciliations applied so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries.
    pub fn iter(&self) -> impl Iterator<Item = (&TermId, &LedgerEntry)> {
        self.entries.iter()
    }

    /// Copy of the current stakes without provenance.
    pub fn snapshot(&self) -> StakeMap {
        self.entries.iter().map(|(id, e)| (*id, e.stake)).collect()
    }
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::term;
    use crate::model::SideStake;
    use proptest::prelude::*;

    fn stake(support: (f64, f64), oppose: (f64, f64)) -> UserStake {
        UserStake {
            support: SideStake { value: support.0, shares: support.1 },
            oppose: SideStake { value: oppose.0, shares: oppose.1 },
        }
    }

    #[test]
    fn reconcile_replaces_everything() {
        let mut ledger = Ledger::new();
        ledger.reconcile(StakeMap::from([(term(1), stake((1.0, 1.0), (0.0, 0.0)))]));
        ledger.reconcile(StakeMap::from([(term(2), stake((0.0, 0.0), (2.0, 4.0)))]));

        assert!(!ledger.contains(&term(1)));
        assert_eq!(ledger.get(&term(2)).unwrap().oppose.shares, 4.0);
        assert_eq!(ledger.provenance(&term(2)), Some(Provenance::Authoritative));
        assert_eq!(ledger.generation(), 2);
    }

    #[test]
    fn bump_creates_speculative_entry() {
        let mut ledger = Ledger::new();
        assert!(ledger.bump(term(1), Side::Support, 0.05, 0.05));

        let entry = ledger.entry(&term(1)).unwrap();
        assert_eq!(entry.stake.support, SideStake { value: 0.05, shares: 0.05 });
        assert_eq!(entry.stake.oppose, SideStake::ZERO);
        assert!(ledger.is_speculative(&term(1)));
    }

    #[test]
    fn bump_is_additive_on_one_side() {
        let mut ledger = Ledger::new();
        ledger.reconcile(StakeMap::from([(term(1), stake((1.0, 2.0), (0.0, 0.0)))]));
        ledger.bump(term(1), Side::Support, 0.5, 1.0);

        let s = ledger.stake_or_default(&term(1));
        assert_eq!(s.support, SideStake { value: 1.5, shares: 3.0 });
        assert_eq!(s.oppose, SideStake::ZERO);
    }

    #[test]
    fn bump_ignores_zero_and_non_finite() {
        let mut ledger = Ledger::new();
        assert!(!ledger.bump(term(1), Side::Oppose, 0.0, 0.0));
        assert!(!ledger.bump(term(1), Side::Oppose, f64::NAN, f64::INFINITY));
        assert!(ledger.is_empty());

        // One finite component is enough; the other counts as zero
        assert!(ledger.bump(term(1), Side::Oppose, f64::NAN, 2.0));
        assert_eq!(ledger.stake_or_default(&term(1)).oppose, SideStake { value: 0.0, shares: 2.0 });
    }

    #[test]
    fn bump_floors_at_zero() {
        let mut ledger = Ledger::new();
        ledger.bump(term(1), Side::Support, 1.0, 1.0);
        ledger.bump(term(1), Side::Support, -5.0, -0.25);

        let s = ledger.stake_or_default(&term(1)).support;
        assert_eq!(s.value, 0.0);
        assert_eq!(s.shares, 0.75);
    }

    #[test]
    fn reconcile_discards_bumps() {
        let mut ledger = Ledger::new();
        ledger.reconcile(StakeMap::from([(term(1), stake((1.0, 1.0), (0.0, 0.0)))]));
        ledger.bump(term(1), Side::Support, 0.5, 0.5);
        ledger.bump(term(2), Side::Oppose, 0.5, 0.5);

        let authoritative = StakeMap::from([(term(1), stake((1.0, 1.0), (0.0, 0.0)))]);
        ledger.reconcile(authoritative.clone());

        assert_eq!(ledger.snapshot(), authoritative);
        assert!(!ledger.is_speculative(&term(1)));
    }

    fn arb_stake_map() -> impl Strategy<Value = StakeMap> {
        proptest::collection::hash_map(
            (0u8..8).prop_map(term),
            (0.0f64..100.0, 0.0f64..100.0, 0.0f64..100.0, 0.0f64..100.0)
                .prop_map(|(a, b, c, d)| stake((a, b), (c, d))),
            0..8,
        )
    }

    proptest! {
        #[test]
        fn reconcile_twice_equals_once(map in arb_stake_map()) {
            let mut once = Ledger::new();
            once.reconcile(map.clone());
            let mut twice = Ledger::new();
            twice.reconcile(map.clone());
            twice.reconcile(map);
            prop_assert_eq!(once.snapshot(), twice.snapshot());
        }

        #[test]
        fn bumps_never_go_negative(
            deltas in proptest::collection::vec((0u8..3, any::<bool>(), -1e6f64..1e6, -1e6f64..1e6), 1..50)
        ) {
            let mut ledger = Ledger::new();
            for (claim, support, dv, ds) in deltas {
                let side = if support { Side::Support } else { Side::Oppose };
                ledger.bump(term(claim), side, dv, ds);
            }
            for (_, entry) in ledger.iter() {
                for side in [Side::Support, Side::Oppose] {
                    let held = entry.stake.side(side);
                    prop_assert!(held.value >= 0.0);
                    prop_assert!(held.shares >= 0.0);
                }
            }
        }
    }
}
