//! TRUST amount parsing and formatting.
//!
//! TRUST has 18 decimals. On-chain amounts are carried as `u128` wei; the
//! ledger and display layers work in floating-point TRUST.

use crate::error::{Error, Result};

/// Decimals of the native token.
pub const DECIMALS: usize = 18;

/// Wei in one TRUST.
pub const WEI_PER_TRUST: u128 = 1_000_000_000_000_000_000;

/// Minimum stake accepted by the app (0.01 TRUST). Also the vote unit.
pub const MIN_STAKE_WEI: u128 = 10_000_000_000_000_000;

/// Parse a decimal TRUST string (`"0.05"`, `"12"`, `".5"`) into wei.
///
/// Digits beyond the 18th decimal are truncated.
pub fn parse_trust_to_wei(input: &str) -> Result<u128> {
    let trimmed = input.trim();
    let well_formed = !trimmed.is_empty()
        && trimmed.chars().all(|c| c.is_ascii_digit() || c == '.')
        && trimmed.chars().filter(|&c| c == '.').count() <= 1
        && trimmed.chars().any(|c| c.is_ascii_digit());
    if !well_formed {
        return Err(Error::InvalidAmount(input.to_string()));
    }

    let (int_raw, frac_raw) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    let int_part: u128 = if int_raw.is_empty() {
        0
    } else {
        int_raw
            .parse()
            .map_err(|_| Error::AmountOverflow(input.to_string()))?
    };

    let mut frac_digits: String = frac_raw.chars().take(DECIMALS).collect();
    while frac_digits.len() < DECIMALS {
        frac_digits.push('0');
    }
    let frac_part: u128 = frac_digits
        .parse()
        .map_err(|_| Error::InvalidAmount(input.to_string()))?;

    int_part
        .checked_mul(WEI_PER_TRUST)
        .and_then(|w| w.checked_add(frac_part))
        .ok_or_else(|| Error::AmountOverflow(input.to_string()))
}

/// Lenient variant for optional deposits: blank or malformed input is zero.
pub fn parse_trust_to_wei_allow_zero(input: &str) -> u128 {
    if input.trim().is_empty() {
        return 0;
    }
    parse_trust_to_wei(input).unwrap_or(0)
}

/// Parse an integer wei string as returned by the indexer.
pub fn parse_wei(raw: &str) -> Option<u128> {
    raw.trim().parse().ok()
}

/// Convert wei to TRUST.
pub fn wei_to_trust(wei: u128) -> f64 {
    wei as f64 / WEI_PER_TRUST as f64
}

/// Share count truncated (not rounded) to two decimals.
pub fn format_shares(shares: f64) -> String {
    if !shares.is_finite() || shares <= 0.0 {
        return "0.00".to_string();
    }
    let truncated = (shares * 100.0).floor() / 100.0;
    format!("{truncated:.2}")
}

/// Human-readable market cap with `k`/`M` suffixes.
pub fn format_market_cap(wei: Option<u128>) -> String {
    let Some(wei) = wei else {
        return "Market cap: —".to_string();
    };
    if wei == 0 {
        return "Market cap: 0 TRUST".to_string();
    }

    let trust = wei_to_trust(wei);
    let (display, suffix) = if trust >= 1_000_000.0 {
        (trust / 1_000_000.0, "M")
    } else if trust >= 1_000.0 {
        (trust / 1_000.0, "k")
    } else {
        (trust, "")
    };

    format!("Market cap: {display:.2}{suffix} TRUST")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_amounts() {
        let cases = [
            ("0.01", MIN_STAKE_WEI),
            ("1", WEI_PER_TRUST),
            ("0.05", 50_000_000_000_000_000),
            (".5", 500_000_000_000_000_000),
            ("2.", 2 * WEI_PER_TRUST),
            ("  0.025 ", 25_000_000_000_000_000),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_trust_to_wei(input).unwrap(), expected, "input {input:?}");
        }
    }

    #[test]
    fn truncates_past_eighteen_decimals() {
        assert_eq!(parse_trust_to_wei("0.0000000000000000019").unwrap(), 1);
    }

    #[test]
    fn rejects_malformed_amounts() {
        for input in ["", ".", "abc", "1.2.3", "-1", "1e18"] {
            assert!(parse_trust_to_wei(input).is_err(), "input {input:?}");
        }
    }

    #[test]
    fn allow_zero_is_lenient() {
        assert_eq!(parse_trust_to_wei_allow_zero(""), 0);
        assert_eq!(parse_trust_to_wei_allow_zero("oops"), 0);
        assert_eq!(parse_trust_to_wei_allow_zero("0.01"), MIN_STAKE_WEI);
    }

    #[test]
    fn rejects_overflow() {
        let huge = "9".repeat(40);
        assert!(matches!(parse_trust_to_wei(&huge), Err(Error::AmountOverflow(_))));
    }

    #[test]
    fn share_formatting_truncates() {
        assert_eq!(format_shares(1.239), "1.23");
        assert_eq!(format_shares(0.0), "0.00");
        assert_eq!(format_shares(f64::NAN), "0.00");
    }

    #[test]
    fn market_cap_formatting() {
        assert_eq!(format_market_cap(None), "Market cap: —");
        assert_eq!(format_market_cap(Some(0)), "Market cap: 0 TRUST");
        assert_eq!(format_market_cap(Some(WEI_PER_TRUST / 2)), "Market cap: 0.50 TRUST");
        assert_eq!(format_market_cap(Some(2_500 * WEI_PER_TRUST)), "Market cap: 2.50k TRUST");
        assert_eq!(format_market_cap(Some(3_000_000 * WEI_PER_TRUST)), "Market cap: 3.00M TRUST");
    }
}
