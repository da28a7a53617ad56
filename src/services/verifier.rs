//! On-chain mint transaction verifier
//!
//! Given a tx hash and the order it is supposed to pay for, classifies the
//! payment as verified, temporarily unverifiable, or permanently invalid.
//! Temporary failures go back to the retry queue and must never fail the
//! order; permanent failures terminate the order and require a new tx hash.

use alloy::{
    consensus::Transaction as _,
    primitives::{keccak256, Address, FixedBytes, B256, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::Log,
    transports::http::{Client, Http},
};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::config::MintConfig;
use crate::entities::mint_orders;

/// bytes4(keccak256("safeMint(address,string)"))
const SAFE_MINT_SELECTOR: [u8; 4] = [0x40, 0xd0, 0x97, 0xc3];

/// keccak256("Transfer(address,address,uint256)")
const ERC20_TRANSFER_TOPIC: [u8; 32] = [
    0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b,
    0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d, 0xaa,
    0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16,
    0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23, 0xb3, 0xef,
];

/// Mint event emitted by the NFT contract when a character token is created.
/// CharacterMinted(address indexed owner, uint256 indexed tokenId, string uri)
const MINT_EVENT_SIGNATURE: &str = "CharacterMinted(address,uint256,string)";

/// Calldata of a valid mint embeds the metadata URI for the character
/// being unlocked, which binds the tx to exactly one order.
const METADATA_URI_PREFIX: &str = "/api/nft/metadata/";

/// Upper bound for every chain RPC call
const RPC_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Verification failure, classified for retry handling. Temporary errors
/// are rescheduled by the verify worker; permanent errors terminate the
/// order until a new tx hash is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    Temporary(String),
    Permanent(String),
}

impl VerifyError {
    pub fn is_temporary(&self) -> bool {
        matches!(self, VerifyError::Temporary(_))
    }

    /// Human-readable reason, persisted verbatim on the order.
    pub fn reason(&self) -> &str {
        match self {
            VerifyError::Temporary(msg) | VerifyError::Permanent(msg) => msg,
        }
    }
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

impl std::error::Error for VerifyError {}

/// Evidence extracted from a fully verified mint transaction.
#[derive(Debug, Clone)]
pub struct VerifiedMint {
    pub block_number: u64,
    /// Token id emitted by the mint event, used to annotate the character.
    pub token_id: u64,
}

/// Chain-backed verifier. Built once at startup from [`MintConfig`] and
/// shared by the HTTP handlers and the verify worker.
pub struct MintTxVerifier {
    provider: RootProvider<Http<Client>>,
    expected_chain_id: Option<u64>,
    mint_contract: Option<Address>,
}

impl MintTxVerifier {
    pub fn new(config: &MintConfig) -> Result<Self, String> {
        let provider = ProviderBuilder::new().on_http(
            config
                .chain_rpc_url
                .parse()
                .map_err(|e| format!("invalid CHAIN_RPC_URL: {}", e))?,
        );

        let mint_contract = match &config.mint_contract_address {
            Some(addr) => Some(
                Address::from_str(addr)
                    .map_err(|e| format!("invalid MINT_CONTRACT_ADDRESS: {}", e))?,
            ),
            None => None,
        };

        Ok(Self {
            provider,
            expected_chain_id: config.expected_chain_id,
            mint_contract,
        })
    }

    /// Verify that `tx_hash` pays for `order` from `payer_wallet`.
    ///
    /// All checks must pass; the first failing check determines the error
    /// category. RPC-level problems (node unreachable, tx not yet mined,
    /// receipt not yet available) are temporary; everything else is
    /// permanent.
    pub async fn verify(
        &self,
        tx_hash: &str,
        payer_wallet: &str,
        order: &mint_orders::Model,
    ) -> Result<VerifiedMint, VerifyError> {
        let hash: B256 = tx_hash
            .parse()
            .map_err(|_| VerifyError::Permanent("invalid tx hash".to_string()))?;

        let tx = timeout(RPC_CALL_TIMEOUT, self.provider.get_transaction_by_hash(hash))
            .await
            .map_err(|_| VerifyError::Temporary("chain rpc timed out".to_string()))?
            .map_err(|e| VerifyError::Temporary(format!("chain rpc unreachable: {}", e)))?
            .ok_or_else(|| VerifyError::Temporary("tx not found on chain".to_string()))?;

        if tx.block_number.is_none() {
            return Err(VerifyError::Temporary("tx is still pending".to_string()));
        }

        let receipt = timeout(RPC_CALL_TIMEOUT, self.provider.get_transaction_receipt(hash))
            .await
            .map_err(|_| VerifyError::Temporary("chain rpc timed out".to_string()))?
            .map_err(|e| VerifyError::Temporary(format!("chain rpc unreachable: {}", e)))?
            .ok_or_else(|| {
                VerifyError::Temporary("tx receipt not yet available".to_string())
            })?;

        if !receipt.status() {
            return Err(VerifyError::Permanent(
                "tx execution reverted on chain".to_string(),
            ));
        }

        if let (Some(expected), Some(actual)) = (self.expected_chain_id, tx.chain_id()) {
            if actual != expected {
                return Err(VerifyError::Permanent(format!(
                    "unexpected chain id {}",
                    actual
                )));
            }
        }

        // The node derives `from` from the tx signature; a forged sender
        // cannot survive signature recovery.
        let payer = Address::from_str(payer_wallet)
            .map_err(|_| VerifyError::Permanent("invalid payer wallet".to_string()))?;
        if tx.from != payer {
            return Err(VerifyError::Permanent(
                "tx sender does not match payer wallet".to_string(),
            ));
        }

        let to = tx.to().ok_or_else(|| {
            VerifyError::Permanent("contract creation transaction".to_string())
        })?;
        if let Some(contract) = self.mint_contract {
            if to != contract {
                return Err(VerifyError::Permanent(
                    "tx target is not the mint contract".to_string(),
                ));
            }
        }

        check_mint_calldata(tx.input(), order.character_id)?;

        let token = Address::from_str(&order.token_address)
            .map_err(|_| VerifyError::Permanent("invalid token address in order".to_string()))?;
        let treasury = Address::from_str(&order.treasury_wallet).map_err(|_| {
            VerifyError::Permanent("invalid treasury wallet in order".to_string())
        })?;
        let expected_amount = U256::from_str_radix(order.token_amount_wei.trim(), 10)
            .ok()
            .filter(|amount| !amount.is_zero())
            .ok_or_else(|| {
                VerifyError::Permanent("invalid token_amount_wei in order".to_string())
            })?;

        let logs = receipt.inner.logs();

        if !has_treasury_transfer(logs, token, payer, treasury, expected_amount) {
            return Err(VerifyError::Permanent(
                "no token transfer to treasury found in receipt logs".to_string(),
            ));
        }

        let token_id = extract_minted_token_id(logs, to, payer)?;

        let block_number = receipt.block_number.ok_or_else(|| {
            VerifyError::Temporary("tx receipt not yet available".to_string())
        })?;

        debug!(
            tx_hash = %tx_hash,
            block_number = block_number,
            token_id = token_id,
            "mint tx verified"
        );

        Ok(VerifiedMint {
            block_number,
            token_id,
        })
    }
}

/// Check that the calldata is a safeMint call carrying the metadata URI of
/// the character this order unlocks.
fn check_mint_calldata(input: &[u8], character_id: i64) -> Result<(), VerifyError> {
    if input.len() < 4 {
        return Err(VerifyError::Permanent(
            "tx calldata too short for safeMint".to_string(),
        ));
    }
    if input[..4] != SAFE_MINT_SELECTOR {
        return Err(VerifyError::Permanent(
            "tx method is not safeMint(address,string)".to_string(),
        ));
    }

    let marker = format!("{}{}", METADATA_URI_PREFIX, character_id);
    // ABI string offsets are not worth decoding here; a hex substring match
    // on the marker is sufficient and matches what the indexer emits.
    if !hex::encode(input).contains(&hex::encode(marker.as_bytes())) {
        return Err(VerifyError::Permanent(
            "tx metadata uri does not match character".to_string(),
        ));
    }
    Ok(())
}

/// Scan receipt logs for an ERC20 Transfer of exactly `expected_amount`
/// from `payer` to `treasury`, emitted by `token`.
fn has_treasury_transfer(
    logs: &[Log],
    token: Address,
    payer: Address,
    treasury: Address,
    expected_amount: U256,
) -> bool {
    let transfer_topic = FixedBytes::from(ERC20_TRANSFER_TOPIC);
    let payer_topic = payer.into_word();
    let treasury_topic = treasury.into_word();

    logs.iter().any(|lg| {
        let topics = lg.inner.topics();
        lg.inner.address == token
            && topics.len() >= 3
            && topics[0] == transfer_topic
            && topics[1] == payer_topic
            && topics[2] == treasury_topic
            && decode_transfer_amount(&lg.inner.data.data) == Some(expected_amount)
    })
}

/// Big-endian decode of a Transfer log's amount. Tokens are not required to
/// pad to 32 bytes; leading zeros are trimmed first, and any value with more
/// than 32 significant bytes cannot match a U256 amount.
fn decode_transfer_amount(data: &[u8]) -> Option<U256> {
    if data.is_empty() {
        return None;
    }
    let first_nonzero = data.iter().position(|b| *b != 0).unwrap_or(data.len());
    let significant = &data[first_nonzero..];
    if significant.len() > 32 {
        return None;
    }
    Some(U256::from_be_slice(significant))
}

/// Find the mint event for `owner` emitted by `contract` and return the
/// minted token id. Its absence means the mint itself did not happen,
/// which is permanent regardless of the payment leg.
fn extract_minted_token_id(
    logs: &[Log],
    contract: Address,
    owner: Address,
) -> Result<u64, VerifyError> {
    let event_topic = keccak256(MINT_EVENT_SIGNATURE.as_bytes());
    let owner_topic = owner.into_word();

    for lg in logs {
        let topics = lg.inner.topics();
        if lg.inner.address != contract
            || topics.len() < 3
            || topics[0] != event_topic
            || topics[1] != owner_topic
        {
            continue;
        }
        let token_id = U256::from_be_slice(topics[2].as_slice());
        return u64::try_from(token_id)
            .map_err(|_| VerifyError::Permanent("minted token id overflows u64".to_string()));
    }

    Err(VerifyError::Permanent(
        "character mint event not found in receipt logs".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, LogData};

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    fn make_log(address: Address, topics: Vec<B256>, data: Vec<u8>) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address,
                data: LogData::new_unchecked(topics, Bytes::from(data)),
            },
            block_hash: None,
            block_number: None,
            block_timestamp: None,
            transaction_hash: None,
            transaction_index: None,
            log_index: None,
            removed: false,
        }
    }

    fn transfer_log(token: Address, from: Address, to: Address, amount: U256) -> Log {
        make_log(
            token,
            vec![
                FixedBytes::from(ERC20_TRANSFER_TOPIC),
                from.into_word(),
                to.into_word(),
            ],
            amount.to_be_bytes::<32>().to_vec(),
        )
    }

    fn mint_log(contract: Address, owner: Address, token_id: U256) -> Log {
        make_log(
            contract,
            vec![
                keccak256(MINT_EVENT_SIGNATURE.as_bytes()),
                owner.into_word(),
                B256::from(token_id.to_be_bytes::<32>()),
            ],
            vec![],
        )
    }

    fn safe_mint_calldata(character_id: i64) -> Vec<u8> {
        let mut data = SAFE_MINT_SELECTOR.to_vec();
        data.extend_from_slice(format!("{}{}", METADATA_URI_PREFIX, character_id).as_bytes());
        data
    }

    #[test]
    fn calldata_with_selector_and_marker_passes() {
        assert!(check_mint_calldata(&safe_mint_calldata(42), 42).is_ok());
    }

    #[test]
    fn calldata_too_short_is_permanent() {
        let err = check_mint_calldata(&[0x40, 0xd0], 42).unwrap_err();
        assert!(!err.is_temporary());
    }

    #[test]
    fn wrong_selector_is_permanent() {
        let mut data = safe_mint_calldata(42);
        data[0] = 0xff;
        let err = check_mint_calldata(&data, 42).unwrap_err();
        assert!(!err.is_temporary());
        assert!(err.reason().contains("safeMint"));
    }

    #[test]
    fn marker_for_other_character_is_rejected() {
        let err = check_mint_calldata(&safe_mint_calldata(42), 43).unwrap_err();
        assert!(!err.is_temporary());
        assert!(err.reason().contains("metadata uri"));
    }

    #[test]
    fn exact_transfer_amount_matches() {
        let (token, payer, treasury) = (addr(1), addr(2), addr(3));
        // 1 token at 18 decimals
        let amount = U256::from_str_radix("1000000000000000000", 10).unwrap();
        let logs = vec![transfer_log(token, payer, treasury, amount)];
        assert!(has_treasury_transfer(&logs, token, payer, treasury, amount));
    }

    #[test]
    fn off_by_one_transfer_amount_is_rejected() {
        let (token, payer, treasury) = (addr(1), addr(2), addr(3));
        let expected = U256::from_str_radix("1000000000000000000", 10).unwrap();
        let actual = U256::from_str_radix("999999999999999999", 10).unwrap();
        let logs = vec![transfer_log(token, payer, treasury, actual)];
        assert!(!has_treasury_transfer(&logs, token, payer, treasury, expected));
    }

    #[test]
    fn unpadded_transfer_data_still_matches() {
        let (token, payer, treasury) = (addr(1), addr(2), addr(3));
        let amount = U256::from(1000u64);
        // 1000 = 0x03e8, emitted without 32-byte padding
        let log = make_log(
            token,
            vec![
                FixedBytes::from(ERC20_TRANSFER_TOPIC),
                payer.into_word(),
                treasury.into_word(),
            ],
            vec![0x03, 0xe8],
        );
        assert!(has_treasury_transfer(&[log], token, payer, treasury, amount));
    }

    #[test]
    fn transfer_amount_decoding_handles_odd_widths() {
        assert_eq!(decode_transfer_amount(&[]), None);
        assert_eq!(decode_transfer_amount(&[0x03, 0xe8]), Some(U256::from(1000u64)));
        // leading zero padding beyond 32 bytes is still the same value
        let mut padded = vec![0u8; 33];
        padded.extend_from_slice(&[0x03, 0xe8]);
        assert_eq!(decode_transfer_amount(&padded), Some(U256::from(1000u64)));
        // more than 32 significant bytes can never match a U256 amount
        assert_eq!(decode_transfer_amount(&[0xff; 33]), None);
    }

    #[test]
    fn transfer_from_other_token_contract_is_ignored() {
        let (token, payer, treasury) = (addr(1), addr(2), addr(3));
        let amount = U256::from(1000u64);
        let logs = vec![transfer_log(addr(9), payer, treasury, amount)];
        assert!(!has_treasury_transfer(&logs, token, payer, treasury, amount));
    }

    #[test]
    fn transfer_to_wrong_receiver_is_ignored() {
        let (token, payer, treasury) = (addr(1), addr(2), addr(3));
        let amount = U256::from(1000u64);
        let logs = vec![transfer_log(token, payer, addr(9), amount)];
        assert!(!has_treasury_transfer(&logs, token, payer, treasury, amount));
    }

    #[test]
    fn mint_event_yields_token_id() {
        let (contract, owner) = (addr(5), addr(2));
        let logs = vec![mint_log(contract, owner, U256::from(77u64))];
        assert_eq!(extract_minted_token_id(&logs, contract, owner).unwrap(), 77);
    }

    #[test]
    fn mint_event_for_other_owner_is_rejected() {
        let (contract, owner) = (addr(5), addr(2));
        let logs = vec![mint_log(contract, addr(9), U256::from(77u64))];
        let err = extract_minted_token_id(&logs, contract, owner).unwrap_err();
        assert!(!err.is_temporary());
    }

    #[test]
    fn missing_mint_event_is_permanent_even_with_transfer_present() {
        let (token, payer, treasury, contract) = (addr(1), addr(2), addr(3), addr(5));
        let amount = U256::from(1000u64);
        let logs = vec![transfer_log(token, payer, treasury, amount)];
        assert!(has_treasury_transfer(&logs, token, payer, treasury, amount));
        let err = extract_minted_token_id(&logs, contract, payer).unwrap_err();
        assert!(!err.is_temporary());
        assert!(err.reason().contains("mint event not found"));
    }

    #[test]
    fn oversized_token_id_is_permanent() {
        let (contract, owner) = (addr(5), addr(2));
        let huge = U256::MAX;
        let logs = vec![mint_log(contract, owner, huge)];
        let err = extract_minted_token_id(&logs, contract, owner).unwrap_err();
        assert!(err.reason().contains("overflows"));
    }

    #[test]
    fn temporary_and_permanent_are_distinct() {
        assert!(VerifyError::Temporary("tx not found on chain".into()).is_temporary());
        assert!(!VerifyError::Permanent("tx sender does not match payer wallet".into())
            .is_temporary());
    }
}
