//! Raw indexer records and their mapping into the claim model.
//!
//! These mirror the JSON shapes returned by the GraphQL indexer. Numeric
//! amounts arrive as decimal strings; curve ids arrive either as strings or
//! numbers depending on the endpoint.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Atom, AtomWithMarketCap, Claim, CurveId, TermId, Vault, TARGET_CURVE_ID};
use crate::units::parse_wei;

/// Curve id as sent by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCurveId {
    Number(u64),
    Text(String),
}

impl RawCurveId {
    /// Numeric curve id, if it parses.
    pub fn as_curve_id(&self) -> Option<CurveId> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<CurveId> for RawCurveId {
    fn from(id: CurveId) -> Self {
        Self::Number(id)
    }
}

/// Vault record embedded in a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVault {
    pub term_id: TermId,
    pub curve_id: RawCurveId,
    pub total_shares: String,
    pub current_share_price: String,
    pub market_cap: Option<String>,
    #[serde(default)]
    pub position_count: u64,
}

impl RawVault {
    /// Decode into a vault snapshot. Unparseable amounts read as zero.
    pub fn to_vault(&self) -> Vault {
        Vault {
            term_id: self.term_id,
            curve_id: self.curve_id.as_curve_id().unwrap_or_default(),
            total_shares: parse_wei(&self.total_shares).unwrap_or(0),
            current_share_price: parse_wei(&self.current_share_price).unwrap_or(0),
            market_cap: self.market_cap.as_deref().and_then(parse_wei).unwrap_or(0),
            position_count: self.position_count,
        }
    }
}

/// `{ url }` object nested under an atom value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUrlHolder {
    pub url: Option<String>,
}

/// Typed payload of an atom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAtomValue {
    pub person: Option<RawUrlHolder>,
    pub organization: Option<RawUrlHolder>,
    pub thing: Option<RawUrlHolder>,
}

/// Atom record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAtom {
    pub term_id: TermId,
    pub label: Option<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub value: Option<RawAtomValue>,
}

impl RawAtom {
    /// Decode into an atom, extracting a usable URL.
    pub fn to_atom(&self) -> Atom {
        Atom {
            term_id: self.term_id,
            label: self.label.clone(),
            image: self.image.clone(),
            url: extract_atom_url(self),
        }
    }
}

/// Term wrapper carrying the vault list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTerm {
    #[serde(default)]
    pub vaults: Vec<RawVault>,
}

/// Triple record with its term and counter-term vaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTriple {
    pub term_id: TermId,
    pub subject: RawAtom,
    pub predicate: RawAtom,
    pub object: RawAtom,
    #[serde(default)]
    pub term: Option<RawTerm>,
    #[serde(default)]
    pub counter_term: Option<RawTerm>,
}

impl RawTriple {
    /// Decode into a claim. The subject keeps its URL; predicate and
    /// object are fixed atoms and keep only label and image.
    pub fn to_claim(&self) -> Claim {
        let term_vaults = self.term.as_ref().map(|t| t.vaults.as_slice()).unwrap_or(&[]);
        let counter_vaults = self
            .counter_term
            .as_ref()
            .map(|t| t.vaults.as_slice())
            .unwrap_or(&[]);

        Claim {
            term_id: self.term_id,
            subject: self.subject.to_atom(),
            predicate: plain_atom(&self.predicate),
            object: plain_atom(&self.object),
            support_vault: pick_curve_vault(term_vaults).map(RawVault::to_vault),
            oppose_vault: pick_curve_vault(counter_vaults).map(RawVault::to_vault),
        }
    }
}

fn plain_atom(raw: &RawAtom) -> Atom {
    Atom {
        term_id: raw.term_id,
        label: raw.label.clone(),
        image: raw.image.clone(),
        url: None,
    }
}

/// Vault market cap record returned by the market cap query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVaultCap {
    pub term_id: TermId,
    pub curve_id: RawCurveId,
    pub market_cap: Option<String>,
    #[serde(default)]
    pub position_count: u64,
}

/// Vault reference inside a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPositionVault {
    pub term_id: TermId,
}

/// A wallet position as reported by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPosition {
    pub account_id: String,
    #[serde(default)]
    pub vault: Option<RawPositionVault>,
    #[serde(default)]
    pub shares: Option<String>,
}

impl RawPosition {
    /// Vault id, if present.
    pub fn vault_id(&self) -> Option<TermId> {
        self.vault.as_ref().map(|v| v.term_id)
    }

    /// Raw share amount in wei, zero when missing or unparseable.
    pub fn shares_wei(&self) -> u128 {
        self.shares.as_deref().and_then(parse_wei).unwrap_or(0)
    }
}

/// Pick the vault on the app's curve, falling back to the first listed.
pub fn pick_curve_vault(vaults: &[RawVault]) -> Option<&RawVault> {
    vaults
        .iter()
        .find(|v| v.curve_id.as_curve_id() == Some(TARGET_CURVE_ID))
        .or_else(|| vaults.first())
}

/// Extract an http(s) URL from an atom's typed value.
///
/// Placeholder URLs ending in `/null` are treated as absent.
pub fn extract_atom_url(atom: &RawAtom) -> Option<String> {
    let value = atom.value.as_ref()?;
    let raw = [&value.person, &value.organization, &value.thing]
        .into_iter()
        .flatten()
        .find_map(|holder| holder.url.clone())?;

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return None;
    }
    if lower.ends_with("/null") || lower.contains("trustcard.box/null") {
        return None;
    }
    Some(trimmed.to_string())
}

/// Sum market caps per term id. Missing or unparseable caps are skipped.
pub fn sum_market_caps(caps: &[RawVaultCap]) -> HashMap<TermId, u128> {
    let mut totals: HashMap<TermId, u128> = HashMap::new();
    for cap in caps {
        let Some(wei) = cap.market_cap.as_deref().and_then(parse_wei) else {
            continue;
        };
        let total = totals.entry(cap.term_id).or_insert(0);
        *total = total.saturating_add(wei);
    }
    totals
}

/// Attach summed market caps to atom search hits. A zero total reads as
/// unknown.
pub fn attach_market_caps(atoms: Vec<Atom>, caps: &[RawVaultCap]) -> Vec<AtomWithMarketCap> {
    let totals = sum_market_caps(caps);
    atoms
        .into_iter()
        .map(|atom| {
            let total_market_cap = totals.get(&atom.term_id).copied().filter(|&w| w > 0);
            AtomWithMarketCap { atom, total_market_cap }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::term;

    const TRIPLE_JSON: &str = r#"{
        "term_id": "0x0000000000000000000000000000000000000000000000000000000000000001",
        "subject": {
            "term_id": "0x0000000000000000000000000000000000000000000000000000000000000033",
            "label": "Alice",
            "image": null,
            "value": { "person": { "url": "  https://alice.example  " } }
        },
        "predicate": {
            "term_id": "0x00000000000000000000000000000000000000000000000000000000000000c8",
            "label": "should be holder of",
            "image": null
        },
        "object": {
            "term_id": "0x00000000000000000000000000000000000000000000000000000000000000C9",
            "label": "Trust Card",
            "image": null
        },
        "term": { "vaults": [
            { "term_id": "0x0000000000000000000000000000000000000000000000000000000000000001",
              "curve_id": "1", "total_shares": "5", "current_share_price": "7",
              "market_cap": null, "position_count": 1 },
            { "term_id": "0x0000000000000000000000000000000000000000000000000000000000000001",
              "curve_id": 2, "total_shares": "100", "current_share_price": "20000000000000000",
              "market_cap": "2000000000000000000", "position_count": 3 }
        ] },
        "counter_term": { "vaults": [
            { "term_id": "0x0000000000000000000000000000000000000000000000000000000000000065",
              "curve_id": "1", "total_shares": "0", "current_share_price": "0",
              "market_cap": null, "position_count": 0 }
        ] }
    }"#;

    #[test]
    fn triple_maps_to_claim() {
        let raw: RawTriple = serde_json::from_str(TRIPLE_JSON).unwrap();
        let claim = raw.to_claim();

        assert_eq!(claim.term_id, term(1));
        assert_eq!(claim.subject.url.as_deref(), Some("https://alice.example"));
        assert_eq!(claim.object.term_id, term(201));

        let support = claim.support_vault.unwrap();
        assert_eq!(support.curve_id, 2);
        assert_eq!(support.current_share_price, 20_000_000_000_000_000);
        assert_eq!(support.position_count, 3);

        // Only curve 1 available: first vault wins, null cap reads as zero
        let oppose = claim.oppose_vault.unwrap();
        assert_eq!(oppose.term_id, term(101));
        assert_eq!(oppose.curve_id, 1);
        assert_eq!(oppose.market_cap, 0);
    }

    #[test]
    fn triple_without_terms_has_no_vaults() {
        let mut raw: RawTriple = serde_json::from_str(TRIPLE_JSON).unwrap();
        raw.term = None;
        raw.counter_term = Some(RawTerm::default());
        let claim = raw.to_claim();
        assert!(claim.support_vault.is_none());
        assert!(claim.oppose_vault.is_none());
    }

    fn atom_with_url(url: &str) -> RawAtom {
        RawAtom {
            term_id: term(1),
            label: None,
            image: None,
            value: Some(RawAtomValue {
                person: None,
                organization: Some(RawUrlHolder { url: Some(url.to_string()) }),
                thing: None,
            }),
        }
    }

    #[test]
    fn atom_url_filters_placeholders() {
        assert_eq!(extract_atom_url(&atom_with_url("HTTPS://x.io")).as_deref(), Some("HTTPS://x.io"));
        assert_eq!(extract_atom_url(&atom_with_url("ftp://x.io")), None);
        assert_eq!(extract_atom_url(&atom_with_url("https://x.io/null")), None);
        assert_eq!(extract_atom_url(&atom_with_url("https://trustcard.box/null?x")), None);
        assert_eq!(extract_atom_url(&atom_with_url("   ")), None);
    }

    #[test]
    fn market_caps_sum_per_term() {
        let caps = vec![
            RawVaultCap { term_id: term(1), curve_id: RawCurveId::Number(1), market_cap: Some("10".into()), position_count: 1 },
            RawVaultCap { term_id: term(1), curve_id: RawCurveId::Number(2), market_cap: Some("5".into()), position_count: 1 },
            RawVaultCap { term_id: term(2), curve_id: RawCurveId::Number(1), market_cap: Some("bogus".into()), position_count: 0 },
            RawVaultCap { term_id: term(3), curve_id: RawCurveId::Number(1), market_cap: Some("0".into()), position_count: 0 },
        ];
        let atoms = vec![
            crate::model::fixtures::atom(1, "one"),
            crate::model::fixtures::atom(2, "two"),
            crate::model::fixtures::atom(3, "three"),
        ];
        let hits = attach_market_caps(atoms, &caps);
        assert_eq!(hits[0].total_market_cap, Some(15));
        assert_eq!(hits[1].total_market_cap, None);
        assert_eq!(hits[2].total_market_cap, None);
    }

    #[test]
    fn position_share_parsing() {
        let pos: RawPosition = serde_json::from_str(
            r#"{ "account_id": "0xAbC", "vault": { "term_id": "0x0000000000000000000000000000000000000000000000000000000000000001" }, "shares": "42" }"#,
        )
        .unwrap();
        assert_eq!(pos.vault_id(), Some(term(1)));
        assert_eq!(pos.shares_wei(), 42);

        let empty: RawPosition = serde_json::from_str(r#"{ "account_id": "0xabc" }"#).unwrap();
        assert_eq!(empty.vault_id(), None);
        assert_eq!(empty.shares_wei(), 0);
    }
}
