//! Claim, vault, atom and stake types.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::units::wei_to_trust;

/// Bonding curve identifier of a vault.
pub type CurveId = u64;

/// Curve the app stakes on and prefers when a term exposes several vaults.
pub const TARGET_CURVE_ID: CurveId = 2;

/// A 32-byte on-chain term identifier (atom, triple or counter-triple).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(pub [u8; 32]);

impl TermId {
    /// Create an id from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from hex, with or without the `0x` prefix, in any letter case.
    pub fn from_hex(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|_| Error::InvalidTermId(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidTermId(s.to_string()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps tracing output readable
        write!(f, "TermId({}...)", &self.to_hex()[..10])
    }
}

impl FromStr for TermId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for TermId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TermId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(de::Error::custom)
    }
}

/// Which vault of a claim a position sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The triple's own vault.
    Support,
    /// The counter-triple's vault.
    Oppose,
}

impl Side {
    /// The other side of the same claim.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Support => Self::Oppose,
            Self::Oppose => Self::Support,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Support => write!(f, "support"),
            Self::Oppose => write!(f, "oppose"),
        }
    }
}

/// Snapshot of one bonding-curve vault. Amounts are in wei.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub term_id: TermId,
    pub curve_id: CurveId,
    pub total_shares: u128,
    pub current_share_price: u128,
    pub market_cap: u128,
    /// Number of positions (participants) in the vault.
    pub position_count: u64,
}

impl Vault {
    /// Current share price in TRUST per share.
    pub fn price(&self) -> f64 {
        wei_to_trust(self.current_share_price)
    }

    /// Market cap in TRUST.
    pub fn market_cap_trust(&self) -> f64 {
        wei_to_trust(self.market_cap)
    }

    /// Whether the vault has traded at least once.
    pub fn has_live_price(&self) -> bool {
        self.position_count > 0
    }
}

/// Identity record usable as a claim subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atom {
    pub term_id: TermId,
    pub label: Option<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Atom {
    /// Label for display, falling back to the term id.
    pub fn display_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.term_id.to_hex())
    }
}

/// Atom search hit with the summed market cap of all its vaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomWithMarketCap {
    #[serde(flatten)]
    pub atom: Atom,
    pub total_market_cap: Option<u128>,
}

/// A subject → predicate → object triple with its support/oppose vaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub term_id: TermId,
    pub subject: Atom,
    pub predicate: Atom,
    pub object: Atom,
    pub support_vault: Option<Vault>,
    pub oppose_vault: Option<Vault>,
}

impl Claim {
    /// Vault backing one side of the claim.
    pub fn vault(&self, side: Side) -> Option<&Vault> {
        match side {
            Side::Support => self.support_vault.as_ref(),
            Side::Oppose => self.oppose_vault.as_ref(),
        }
    }

    /// Side a vault id belongs to, if it belongs to this claim at all.
    pub fn side_of_vault(&self, vault_id: &TermId) -> Option<Side> {
        if self.support_vault.as_ref().map(|v| &v.term_id) == Some(vault_id) {
            Some(Side::Support)
        } else if self.oppose_vault.as_ref().map(|v| &v.term_id) == Some(vault_id) {
            Some(Side::Oppose)
        } else {
            None
        }
    }

    /// Ids of the vaults this claim exposes.
    pub fn vault_ids(&self) -> impl Iterator<Item = TermId> + '_ {
        self.support_vault
            .iter()
            .chain(self.oppose_vault.iter())
            .map(|v| v.term_id)
    }
}

/// Stake held on one side of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SideStake {
    /// Token amount (TRUST).
    pub value: f64,
    /// Vault shares.
    pub shares: f64,
}

impl SideStake {
    pub const ZERO: Self = Self { value: 0.0, shares: 0.0 };

    /// Whether anything is held on this side.
    pub fn is_held(&self) -> bool {
        self.value > 0.0 || self.shares > 0.0
    }
}

/// A wallet's stake on both sides of one claim.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UserStake {
    pub support: SideStake,
    pub oppose: SideStake,
}

impl UserStake {
    /// Stake on one side.
    pub fn side(&self, side: Side) -> &SideStake {
        match side {
            Side::Support => &self.support,
            Side::Oppose => &self.oppose,
        }
    }

    /// Mutable stake on one side.
    pub fn side_mut(&mut self, side: Side) -> &mut SideStake {
        match side {
            Side::Support => &mut self.support,
            Side::Oppose => &mut self.oppose,
        }
    }
}

/// Claim id → user stake.
pub type StakeMap = HashMap<TermId, UserStake>;


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn term_id_hex_roundtrip_ignores_case_and_prefix() {
        let id = term(0xab);
        let upper = id.to_hex().to_uppercase().replacen("0X", "0x", 1);
        assert_eq!(TermId::from_hex(&upper).unwrap(), id);
        assert_eq!(TermId::from_hex(&id.to_hex()[2..]).unwrap(), id);
    }

    #[test]
    fn term_id_rejects_wrong_length() {
        assert!(TermId::from_hex("0x1234").is_err());
        assert!(TermId::from_hex("not hex").is_err());
    }

    #[test]
    fn term_id_serde_as_string() {
        let id = term(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let back: TermId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn side_of_vault_matches_support_then_oppose() {
        let claim = claim(1, 0, 0);
        assert_eq!(claim.side_of_vault(&term(1)), Some(Side::Support));
        assert_eq!(claim.side_of_vault(&term(101)), Some(Side::Oppose));
        assert_eq!(claim.side_of_vault(&term(2)), None);
        assert_eq!(claim.vault_ids().count(), 2);
    }

    #[test]
    fn side_display_and_opposite() {
        assert_eq!(format!("{}", Side::Support), "support");
        assert_eq!(format!("{}", Side::Oppose), "oppose");
        assert_eq!(Side::Support.opposite(), Side::Oppose);
    }

    #[test]
    fn side_stake_held() {
        assert!(!SideStake::ZERO.is_held());
        assert!(SideStake { value: 0.0, shares: 1.0 }.is_held());
        assert!(SideStake { value: 0.5, shares: 0.0 }.is_held());
    }
}
