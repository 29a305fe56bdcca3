//! Application configuration from the environment.

use std::str::FromStr;
use std::time::Duration;

use trustcard_core::{parse_trust_to_wei, TermId, MIN_STAKE_WEI};
use trustcard_protocols::{OrchestratorConfig, RefreshMode, RetryPolicy, INTUITION_MAINNET_CHAIN_ID};

use crate::error::{Error, Result};

/// Vote page configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct VoteConfig {
    /// Required wallet chain.
    pub chain_id: u64,
    /// Minimum stake and vote unit, in wei.
    pub min_stake_wei: u128,
    /// Indexer polling after writes.
    pub retry: RetryPolicy,
    pub positions_limit: usize,
    pub search_limit: usize,
    pub refresh: RefreshMode,
    /// Predicate and object atoms. Unset means taken from the network.
    pub predicate_id: Option<TermId>,
    pub object_id: Option<TermId>,
    /// Wallet the demo session connects.
    pub demo_account: String,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            chain_id: INTUITION_MAINNET_CHAIN_ID,
            min_stake_wei: MIN_STAKE_WEI,
            retry: RetryPolicy::default(),
            positions_limit: 200,
            search_limit: 10,
            refresh: RefreshMode::Inline,
            predicate_id: None,
            object_id: None,
            demo_account: "0x00000000000000000000000000000000000000a1".to_string(),
        }
    }
}

impl VoteConfig {
    /// Create config from `TRUSTCARD_*` environment variables with defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Create config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let chain_id = parse_var(&get, "TRUSTCARD_CHAIN_ID")?.unwrap_or(defaults.chain_id);

        let min_stake_wei = match get("TRUSTCARD_MIN_STAKE") {
            Some(raw) => match parse_trust_to_wei(&raw) {
                Ok(0) => return Err(invalid("TRUSTCARD_MIN_STAKE", raw, "must be positive")),
                Ok(wei) => wei,
                Err(e) => return Err(invalid("TRUSTCARD_MIN_STAKE", raw, e)),
            },
            None => defaults.min_stake_wei,
        };

        let attempts = parse_var(&get, "TRUSTCARD_RETRY_ATTEMPTS")?.unwrap_or(defaults.retry.max_attempts);
        if attempts == 0 {
            return Err(invalid("TRUSTCARD_RETRY_ATTEMPTS", "0", "must be at least 1"));
        }
        let delay = parse_var::<u64, _>(&get, "TRUSTCARD_RETRY_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry.delay);

        let refresh = match get("TRUSTCARD_REFRESH").map(|v| v.to_lowercase()) {
            None => defaults.refresh,
            Some(v) if v == "inline" => RefreshMode::Inline,
            Some(v) if v == "background" => RefreshMode::Background,
            Some(v) if v == "manual" => RefreshMode::Manual,
            Some(v) => return Err(invalid("TRUSTCARD_REFRESH", v, "expected inline, background or manual")),
        };

        Ok(Self {
            chain_id,
            min_stake_wei,
            retry: RetryPolicy::new(attempts, delay),
            positions_limit: parse_var(&get, "TRUSTCARD_POSITIONS_LIMIT")?.unwrap_or(defaults.positions_limit),
            search_limit: parse_var(&get, "TRUSTCARD_SEARCH_LIMIT")?.unwrap_or(defaults.search_limit),
            refresh,
            predicate_id: parse_var(&get, "TRUSTCARD_PREDICATE_ID")?,
            object_id: parse_var(&get, "TRUSTCARD_OBJECT_ID")?,
            demo_account: get("TRUSTCARD_DEMO_ACCOUNT").unwrap_or(defaults.demo_account),
        })
    }

    /// Orchestrator config, with the network's atoms as fallback.
    pub fn orchestrator(&self, predicate_id: TermId, object_id: TermId) -> OrchestratorConfig {
        let mut config = OrchestratorConfig::new(
            self.predicate_id.unwrap_or(predicate_id),
            self.object_id.unwrap_or(object_id),
        )
        .with_chain_id(self.chain_id)
        .with_min_stake(self.min_stake_wei)
        .with_retry(self.retry)
        .with_refresh(self.refresh);
        config.positions_limit = self.positions_limit;
        config.search_limit = self.search_limit;
        config
    }
}

fn invalid(var: &'static str, value: impl Into<String>, reason: impl ToString) -> Error {
    Error::Config {
        var,
        value: value.into(),
        reason: reason.to_string(),
    }
}

fn parse_var<T, G>(get: &G, var: &'static str) -> Result<Option<T>>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: ToString,
{
    get(var)
        .map(|raw| raw.parse::<T>().map_err(|e| invalid(var, raw.clone(), e)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = VoteConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, VoteConfig::default());
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay, Duration::from_millis(1200));
    }

    #[test]
    fn test_overrides() {
        let config = VoteConfig::from_lookup(lookup(&[
            ("TRUSTCARD_CHAIN_ID", "13579"),
            ("TRUSTCARD_MIN_STAKE", "0.5"),
            ("TRUSTCARD_RETRY_DELAY_MS", "0"),
            ("TRUSTCARD_REFRESH", "Background"),
            ("TRUSTCARD_OBJECT_ID", &format!("0x{}", "ab".repeat(32))),
        ]))
        .unwrap();
        assert_eq!(config.chain_id, 13579);
        assert_eq!(config.min_stake_wei, 500_000_000_000_000_000);
        assert!(config.retry.delay.is_zero());
        assert_eq!(config.refresh, RefreshMode::Background);
        assert_eq!(config.object_id, Some(TermId([0xab; 32])));

        let orch = config.orchestrator(TermId([1; 32]), TermId([2; 32]));
        assert_eq!(orch.predicate_id, TermId([1; 32]));
        assert_eq!(orch.object_id, TermId([0xab; 32]));
        assert_eq!(orch.vote_unit_wei, 500_000_000_000_000_000);
    }

    #[test]
    fn test_malformed_values_are_errors() {
        let cases = [
            ("TRUSTCARD_CHAIN_ID", "mainnet"),
            ("TRUSTCARD_MIN_STAKE", "0"),
            ("TRUSTCARD_MIN_STAKE", "lots"),
            ("TRUSTCARD_RETRY_ATTEMPTS", "0"),
            ("TRUSTCARD_REFRESH", "eventually"),
            ("TRUSTCARD_PREDICATE_ID", "0x12"),
        ];
        for (var, value) in cases {
            let err = VoteConfig::from_lookup(lookup(&[(var, value)])).unwrap_err();
            assert!(matches!(err, Error::Config { var: v, .. } if v == var), "{var}={value}");
        }
    }
}
