//! Request/response shapes for the mint order endpoints.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::entities::mint_orders;

#[derive(Debug, Deserialize)]
pub struct CreateMintOrderRequest {
    pub character_id: i64,
    pub chain_id: i64,
    pub token_address: String,
    pub token_symbol: String,
    /// Human-readable amount, e.g. "1.5".
    pub token_amount: String,
    /// Exact base-unit amount. Older clients omit it; the server then
    /// derives it from `token_amount` assuming 18 decimals.
    pub token_amount_wei: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmMintOrderRequest {
    pub tx_hash: String,
}

/// Body of the indexer webhook. Orders may be referenced by numeric id or
/// by order number.
#[derive(Debug, Deserialize)]
pub struct WebhookConfirmRequest {
    pub order_id: Option<i64>,
    pub order_no: Option<String>,
    pub tx_hash: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// Create/get response. `already_paid` tells the client it can skip
/// payment entirely.
#[derive(Debug, Serialize)]
pub struct MintOrderEnvelope {
    pub already_paid: bool,
    pub order: mint_orders::Model,
}

/// True for a 0x-prefixed 32-byte hex transaction hash.
pub fn is_hex_tx_hash(s: &str) -> bool {
    let Some(hex_part) = s.strip_prefix("0x") else {
        return false;
    };
    hex_part.len() == 64 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Convert a decimal token amount like "1.5" into a base-unit string
/// ("1500000000000000000" at 18 decimals). Returns None for malformed
/// input, too many fractional digits, or overflow past U256.
pub fn parse_decimal_amount_to_wei(amount: &str, decimals: u32) -> Option<String> {
    let amount = amount.trim();
    if amount.is_empty() {
        return None;
    }
    let (int_part, frac_part) = match amount.split_once('.') {
        Some((i, f)) => (i, f),
        None => (amount, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    if frac_part.len() > decimals as usize {
        return None;
    }

    let mut digits = String::with_capacity(int_part.len() + decimals as usize);
    digits.push_str(if int_part.is_empty() { "0" } else { int_part });
    digits.push_str(frac_part);
    for _ in frac_part.len()..decimals as usize {
        digits.push('0');
    }

    let value = U256::from_str_radix(&digits, 10).ok()?;
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_hash_validation() {
        assert!(is_hex_tx_hash(
            "0x49d3d24bbbb5e0872b394989b48e51ef51b8fa367c1a22831a4bf4a52e01b9e4"
        ));
        assert!(!is_hex_tx_hash(
            "49d3d24bbbb5e0872b394989b48e51ef51b8fa367c1a22831a4bf4a52e01b9e4"
        ));
        assert!(!is_hex_tx_hash("0x49d3d2"));
        assert!(!is_hex_tx_hash(
            "0xzzd3d24bbbb5e0872b394989b48e51ef51b8fa367c1a22831a4bf4a52e01b9e4"
        ));
        assert!(!is_hex_tx_hash(""));
    }

    #[test]
    fn whole_amount_to_wei() {
        assert_eq!(
            parse_decimal_amount_to_wei("1", 18).as_deref(),
            Some("1000000000000000000")
        );
        assert_eq!(parse_decimal_amount_to_wei("0", 18).as_deref(), Some("0"));
    }

    #[test]
    fn fractional_amount_to_wei() {
        assert_eq!(
            parse_decimal_amount_to_wei("1.5", 18).as_deref(),
            Some("1500000000000000000")
        );
        assert_eq!(
            parse_decimal_amount_to_wei(".25", 18).as_deref(),
            Some("250000000000000000")
        );
        assert_eq!(
            parse_decimal_amount_to_wei("0.000000000000000001", 18).as_deref(),
            Some("1")
        );
    }

    #[test]
    fn malformed_amounts_rejected() {
        assert_eq!(parse_decimal_amount_to_wei("", 18), None);
        assert_eq!(parse_decimal_amount_to_wei(".", 18), None);
        assert_eq!(parse_decimal_amount_to_wei("1,5", 18), None);
        assert_eq!(parse_decimal_amount_to_wei("-1", 18), None);
        assert_eq!(parse_decimal_amount_to_wei("1e18", 18), None);
        // 19 fractional digits at 18 decimals would lose precision.
        assert_eq!(parse_decimal_amount_to_wei("0.0000000000000000001", 18), None);
    }
}
