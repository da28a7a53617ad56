//! Environment configuration for the mint verification subsystem.
//!
//! Read once at startup and carried in `AppState`; nothing here is a
//! process-wide singleton.

use std::env;

/// Environment variable for the chain RPC endpoint
const ENV_CHAIN_RPC_URL: &str = "CHAIN_RPC_URL";

/// Environment variable pinning the expected chain id (0 or unset = unpinned)
const ENV_EXPECTED_CHAIN_ID: &str = "MINT_EXPECTED_CHAIN_ID";

/// Environment variable pinning the mint contract address (unset = unpinned)
const ENV_MINT_CONTRACT_ADDRESS: &str = "MINT_CONTRACT_ADDRESS";

/// Environment variable for the treasury wallet receiving payments
const ENV_TREASURY_WALLET: &str = "MINT_TREASURY_WALLET";

/// Environment variable for the webhook HMAC shared secret
const ENV_WEBHOOK_SECRET: &str = "MINT_WEBHOOK_SECRET";

/// Environment variable for the webhook timestamp skew window
const ENV_WEBHOOK_MAX_SKEW_SECS: &str = "MINT_WEBHOOK_MAX_SKEW_SECS";

/// Environment variable for the admin API key
const ENV_ADMIN_SECRET: &str = "ADMIN_SECRET";

/// Default allowed webhook timestamp skew in seconds
const DEFAULT_WEBHOOK_MAX_SKEW_SECS: i64 = 300;

#[derive(Clone, Debug)]
pub struct MintConfig {
    pub chain_rpc_url: String,
    /// None when unpinned; a mismatching tx chain id is a permanent failure
    pub expected_chain_id: Option<u64>,
    /// None when unpinned; a mismatching tx target is a permanent failure
    pub mint_contract_address: Option<String>,
    /// Empty string means misconfigured; order creation returns 503
    pub treasury_wallet: String,
    /// Empty string means misconfigured; webhook ingestion returns 503
    pub webhook_secret: String,
    pub webhook_max_skew_secs: i64,
    /// Empty string means misconfigured; admin endpoints return 503
    pub admin_secret: String,
}

impl MintConfig {
    pub fn from_env() -> Self {
        let expected_chain_id = env::var(ENV_EXPECTED_CHAIN_ID)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|id| *id > 0);

        let mint_contract_address = env::var(ENV_MINT_CONTRACT_ADDRESS)
            .ok()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let webhook_max_skew_secs = env::var(ENV_WEBHOOK_MAX_SKEW_SECS)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_WEBHOOK_MAX_SKEW_SECS);

        Self {
            chain_rpc_url: env::var(ENV_CHAIN_RPC_URL).unwrap_or_default(),
            expected_chain_id,
            mint_contract_address,
            treasury_wallet: env::var(ENV_TREASURY_WALLET)
                .map(|s| s.trim().to_lowercase())
                .unwrap_or_default(),
            webhook_secret: env::var(ENV_WEBHOOK_SECRET).unwrap_or_default(),
            webhook_max_skew_secs,
            admin_secret: env::var(ENV_ADMIN_SECRET).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_skew_is_five_minutes() {
        assert_eq!(DEFAULT_WEBHOOK_MAX_SKEW_SECS, 300);
    }

    #[test]
    fn env_var_names() {
        assert_eq!(ENV_CHAIN_RPC_URL, "CHAIN_RPC_URL");
        assert_eq!(ENV_WEBHOOK_SECRET, "MINT_WEBHOOK_SECRET");
        assert_eq!(ENV_TREASURY_WALLET, "MINT_TREASURY_WALLET");
    }
}
