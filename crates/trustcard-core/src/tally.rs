//! Vote tally projection.
//!
//! Every accepted stake counts as at least one vote; larger stakes count
//! one vote per vote unit:
//! - amount < 2 units → 1 vote
//! - amount = n units → floor(n) votes
//!
//! Tallies are display-only. They never feed back into the ledger or vault
//! snapshots.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{Claim, Side, TermId};
use crate::units::MIN_STAKE_WEI;

/// Default vote unit: the minimum stake.
pub const VOTE_UNIT_WEI: u128 = MIN_STAKE_WEI;

/// Votes contributed by a stake of `amount_wei`.
///
/// Formula: max(1, floor(amount / unit)), on integer wei.
///
/// # Examples
///
/// ```
/// use trustcard_core::vote_increment;
///
/// assert_eq!(vote_increment(25_000_000_000_000_000, 10_000_000_000_000_000), 2);
/// assert_eq!(vote_increment(10_000_000_000_000_000, 10_000_000_000_000_000), 1);
/// ```
pub const fn vote_increment(amount_wei: u128, unit_wei: u128) -> u64 {
    if unit_wei == 0 {
        return 1;
    }
    let votes = amount_wei / unit_wei;
    if votes == 0 {
        1
    } else if votes > u64::MAX as u128 {
        u64::MAX
    } else {
        votes as u64
    }
}

/// Displayed vote counts for one claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SideCounts {
    pub support: u64,
    pub oppose: u64,
}

impl SideCounts {
    /// Count for one side.
    pub fn side(&self, side: Side) -> u64 {
        match side {
            Side::Support => self.support,
            Side::Oppose => self.oppose,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut u64 {
        match side {
            Side::Support => &mut self.support,
            Side::Oppose => &mut self.oppose,
        }
    }
}

/// Per-claim displayed vote counts.
#[derive(Debug, Default)]
pub struct VoteTally {
    counts: HashMap<TermId, SideCounts>,
}

impl VoteTally {
    /// Create an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the tally from vault participant counts.
    pub fn seed(&mut self, claims: &[Claim]) {
        self.counts = claims
            .iter()
            .map(|c| {
                let counts = SideCounts {
                    support: c.support_vault.as_ref().map_or(0, |v| v.position_count),
                    oppose: c.oppose_vault.as_ref().map_or(0, |v| v.position_count),
                };
                (c.term_id, counts)
            })
            .collect();
    }

    /// Adjust one side of a claim, floored at zero. Unknown claims and zero
    /// deltas are ignored.
    pub fn bump(&mut self, claim: &TermId, side: Side, delta: i64) -> bool {
        if delta == 0 {
            return false;
        }
        let Some(counts) = self.counts.get_mut(claim) else {
            return false;
        };
        let current = counts.side_mut(side);
        *current = if delta >= 0 {
            current.saturating_add(delta.unsigned_abs())
        } else {
            current.saturating_sub(delta.unsigned_abs())
        };
        true
    }

    /// Counts for a claim.
    pub fn get(&self, claim: &TermId) -> SideCounts {
        self.counts.get(claim).copied().unwrap_or_default()
    }

    /// Number of claims tracked.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{claim, term};
    use crate::units::parse_trust_to_wei;

    fn votes(amount: &str) -> u64 {
        vote_increment(parse_trust_to_wei(amount).unwrap(), VOTE_UNIT_WEI)
    }

    #[test]
    fn votes_floor_per_unit() {
        let cases = [
            ("0.01", 1),  // exactly one unit
            ("0.019", 1), // 1.9 units
            ("0.025", 2), // 2.5 units
            ("0.03", 3),  // float division would give 2.999...
            ("0.05", 5),
            ("1", 100),
        ];
        for (amount, expected) in cases {
            assert_eq!(votes(amount), expected, "votes({amount})");
        }
    }

    #[test]
    fn votes_at_least_one() {
        assert_eq!(vote_increment(1, VOTE_UNIT_WEI), 1);
        assert_eq!(vote_increment(0, VOTE_UNIT_WEI), 1);
        assert_eq!(vote_increment(5, 0), 1);
    }

    #[test]
    fn votes_monotonic() {
        let mut prev = 0;
        for units in 0..200u128 {
            let v = vote_increment(units * VOTE_UNIT_WEI / 3, VOTE_UNIT_WEI);
            assert!(v >= prev);
            prev = v;
        }
    }

    #[test]
    fn tally_seed_and_bump() {
        let mut c = claim(1, 0, 0);
        if let Some(v) = c.support_vault.as_mut() {
            v.position_count = 4;
        }
        let mut tally = VoteTally::new();
        tally.seed(&[c]);
        assert_eq!(tally.get(&term(1)), SideCounts { support: 4, oppose: 0 });

        assert!(tally.bump(&term(1), Side::Support, 5));
        assert!(tally.bump(&term(1), Side::Oppose, -3));
        assert_eq!(tally.get(&term(1)), SideCounts { support: 9, oppose: 0 });

        assert!(!tally.bump(&term(9), Side::Support, 1));
        assert!(!tally.bump(&term(1), Side::Support, 0));
    }

    #[test]
    fn reseed_replaces_bumps() {
        let claims = [claim(1, 0, 0)];
        let mut tally = VoteTally::new();
        tally.seed(&claims);
        tally.bump(&term(1), Side::Oppose, 2);
        tally.seed(&claims);
        assert_eq!(tally.get(&term(1)).oppose, 0);
        assert_eq!(tally.len(), 1);
    }
}
