// SPDX-License-Identifier: BUSL-1.1
//! # JSON-RPC Settlement Client
//!
//! Production client for the escrow settlement contract on EVM-compatible
//! chains, via JSON-RPC.
//!
//! ## How It Works
//!
//! 1. Custody signatures travel *inside* the calldata: the contract
//!    verifies the typed-data signature against the signer's registered
//!    key and its per-signer nonce, permit-style.
//! 2. The outer transaction is signed by the RPC provider's managed
//!    account (`from_address`) — this client does not hold chain keys.
//! 3. Nonce queries use `eth_call` against the contract's `nonces`
//!    accessor; status checks use `eth_getTransactionReceipt` plus the
//!    current block height.
//!
//! ## Security
//!
//! - The `from` address must be funded with native token for gas.
//! - All RPC calls use HTTPS; transport failures are retried with
//!   backoff, answered errors are not.

use sha2::{Digest, Sha256};

use giv_signer::gateway::is_valid_settlement_address;

use crate::client::{ApprovalCall, DonationCall, SettlementClient, TxStatus};
use crate::error::SettlementError;
use crate::retry::retry_send;

/// Configuration for the JSON-RPC settlement client.
#[derive(Debug, Clone)]
pub struct EvmSettlementConfig {
    /// JSON-RPC endpoint URL (must be HTTPS in production).
    pub rpc_url: String,
    /// Escrow settlement contract address ("0x" + 40 hex chars).
    pub contract_address: String,
    /// Relayer address whose transactions are signed by the RPC provider.
    pub from_address: String,
    /// Human-readable chain name (e.g., "base", "polygon").
    pub chain_name: String,
    /// EVM chain ID.
    pub chain_id: u64,
    /// Block confirmations required before reporting `Confirmed`.
    pub confirmations_required: u64,
    /// Request timeout in seconds (default: 30).
    pub timeout_secs: u64,
}

impl EvmSettlementConfig {
    /// Defaults: 3 confirmations, 30s timeout.
    pub fn new(
        rpc_url: impl Into<String>,
        contract_address: impl Into<String>,
        from_address: impl Into<String>,
        chain_name: impl Into<String>,
        chain_id: u64,
    ) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contract_address: contract_address.into(),
            from_address: from_address.into(),
            chain_name: chain_name.into(),
            chain_id,
            confirmations_required: 3,
            timeout_secs: 30,
        }
    }

    /// Set the confirmation threshold.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations_required = confirmations;
        self
    }
}

/// 4-byte selector for `nonces(address)` (ERC-2612 accessor).
const NONCES_SELECTOR: &str = "7ecebe00";
/// 4-byte selector for
/// `donateWithSignature(address,uint256,uint256,bytes32,uint256,bytes)`.
const DONATE_SELECTOR: &str = "8f38fb17";
/// 4-byte selector for
/// `approveMilestone(address,uint256,uint256,uint256,bytes)`.
const APPROVE_SELECTOR: &str = "5b7633d0";

/// JSON-RPC settlement client.
#[derive(Debug)]
pub struct JsonRpcSettlementClient {
    client: reqwest::Client,
    config: EvmSettlementConfig,
}

impl JsonRpcSettlementClient {
    pub fn new(config: EvmSettlementConfig) -> Result<Self, SettlementError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SettlementError::Unavailable {
                reason: format!("{}: failed to build HTTP client: {e}", config.chain_name),
            })?;

        if !is_valid_settlement_address(&config.contract_address) {
            return Err(SettlementError::InvalidCall(format!(
                "invalid contract address: {}",
                config.contract_address
            )));
        }
        if !is_valid_settlement_address(&config.from_address) {
            return Err(SettlementError::InvalidCall(format!(
                "invalid from address: {}",
                config.from_address
            )));
        }

        Ok(Self { client, config })
    }

    /// Send a JSON-RPC request and return the result field.
    async fn rpc_call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, SettlementError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = retry_send(|| self.client.post(&self.config.rpc_url).json(&body).send())
            .await
            .map_err(|e| SettlementError::Unavailable {
                reason: format!("{}: {e}", self.config.chain_name),
            })?;

        if !resp.status().is_success() {
            return Err(SettlementError::Unavailable {
                reason: format!("{}: HTTP {}", self.config.chain_name, resp.status()),
            });
        }

        let json: serde_json::Value =
            resp.json().await.map_err(|e| SettlementError::Unavailable {
                reason: format!("{}: invalid JSON response: {e}", self.config.chain_name),
            })?;

        if let Some(error) = json.get("error") {
            let msg = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown RPC error");
            return Err(SettlementError::Rpc {
                method: method.to_string(),
                reason: msg.to_string(),
            });
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| SettlementError::Unavailable {
                reason: format!(
                    "{}: JSON-RPC response missing 'result' field",
                    self.config.chain_name
                ),
            })
    }

    /// Submit calldata via `eth_sendTransaction` and return the tx hash.
    async fn send_tx(&self, data: String) -> Result<String, SettlementError> {
        let tx = serde_json::json!({
            "from": self.config.from_address,
            "to": self.config.contract_address,
            "data": data,
        });

        let result = self
            .rpc_call("eth_sendTransaction", serde_json::json!([tx]))
            .await?;

        result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| SettlementError::Unavailable {
                reason: format!(
                    "{}: eth_sendTransaction returned non-string result",
                    self.config.chain_name
                ),
            })
    }
}

// ─── Calldata encoding ───────────────────────────────────────────────────

/// One 32-byte ABI word from an unsigned integer.
fn word_u64(v: u64) -> String {
    format!("{v:064x}")
}

/// One 32-byte ABI word from a settlement address (left-padded).
fn word_address(addr: &str) -> Result<String, SettlementError> {
    if !is_valid_settlement_address(addr) {
        return Err(SettlementError::InvalidCall(format!(
            "invalid signer address: {addr}"
        )));
    }
    Ok(format!("{:0>64}", addr[2..].to_ascii_lowercase()))
}

/// One 32-byte word holding the SHA-256 digest of the payment reference.
/// The contract stores the digest for replay protection; the reference
/// string itself stays off-chain.
fn word_payment_ref(payment_ref: &str) -> String {
    let digest = Sha256::digest(payment_ref.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn encode_donation(call: &DonationCall) -> Result<String, SettlementError> {
    let amount = u64::try_from(call.amount_minor).map_err(|_| {
        SettlementError::InvalidCall(format!("negative amount: {}", call.amount_minor))
    })?;
    Ok(format!(
        "0x{DONATE_SELECTOR}{}{}{}{}{}{}",
        word_address(&call.signer_address)?,
        word_u64(call.campaign_onchain_id),
        word_u64(amount),
        word_payment_ref(&call.payment_ref),
        word_u64(call.nonce),
        call.signature.to_hex(),
    ))
}

fn encode_approval(call: &ApprovalCall) -> Result<String, SettlementError> {
    Ok(format!(
        "0x{APPROVE_SELECTOR}{}{}{}{}{}",
        word_address(&call.signer_address)?,
        word_u64(call.campaign_onchain_id),
        word_u64(call.milestone_index as u64),
        word_u64(call.nonce),
        call.signature.to_hex(),
    ))
}

fn parse_hex_quantity(value: &serde_json::Value) -> Option<u64> {
    value
        .as_str()
        .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
}

#[async_trait::async_trait]
impl SettlementClient for JsonRpcSettlementClient {
    async fn expected_nonce(&self, signer_address: &str) -> Result<u64, SettlementError> {
        let data = format!("0x{NONCES_SELECTOR}{}", word_address(signer_address)?);
        let call = serde_json::json!({
            "to": self.config.contract_address,
            "data": data,
        });
        let result = self
            .rpc_call("eth_call", serde_json::json!([call, "latest"]))
            .await?;
        parse_hex_quantity(&result).ok_or_else(|| SettlementError::Unavailable {
            reason: format!(
                "{}: nonces() returned unparseable result",
                self.config.chain_name
            ),
        })
    }

    async fn donate_with_signature(
        &self,
        call: &DonationCall,
    ) -> Result<String, SettlementError> {
        let tx_hash = self.send_tx(encode_donation(call)?).await?;
        tracing::info!(
            tx_hash,
            signer = %call.signer_address,
            nonce = call.nonce,
            campaign = call.campaign_onchain_id,
            "submitted donation allocation"
        );
        Ok(tx_hash)
    }

    async fn approve_milestone(&self, call: &ApprovalCall) -> Result<String, SettlementError> {
        let tx_hash = self.send_tx(encode_approval(call)?).await?;
        tracing::info!(
            tx_hash,
            signer = %call.signer_address,
            nonce = call.nonce,
            campaign = call.campaign_onchain_id,
            milestone = call.milestone_index,
            "submitted milestone approval"
        );
        Ok(tx_hash)
    }

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus, SettlementError> {
        let receipt = self
            .rpc_call("eth_getTransactionReceipt", serde_json::json!([tx_hash]))
            .await?;

        // Null receipt means the transaction is still pending.
        if receipt.is_null() {
            return Ok(TxStatus::Pending);
        }

        let status_hex = receipt
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("0x0");
        if status_hex == "0x0" {
            return Ok(TxStatus::Failed);
        }

        let tx_block = receipt
            .get("blockNumber")
            .and_then(parse_hex_quantity)
            .unwrap_or(0);
        let current_block = self
            .rpc_call("eth_blockNumber", serde_json::json!([]))
            .await
            .map(|v| parse_hex_quantity(&v).unwrap_or(0))?;

        // The mined block itself counts as one confirmation.
        let confirmations = current_block.saturating_sub(tx_block).saturating_add(1);
        if confirmations >= self.config.confirmations_required {
            Ok(TxStatus::Confirmed)
        } else {
            Ok(TxStatus::Pending)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use giv_signer::typed_data::TypedSignature;

    const ADDR_A: &str = "0x00000000000000000000000000000000000000aa";
    const ADDR_B: &str = "0x00000000000000000000000000000000000000bb";

    fn config() -> EvmSettlementConfig {
        EvmSettlementConfig::new("https://rpc.example.com", ADDR_A, ADDR_B, "base", 8453)
    }

    fn donation_call() -> DonationCall {
        DonationCall {
            signer_address: "0xDeadBeefDeadBeefDeadBeefDeadBeefDeadBeef".to_string(),
            campaign_onchain_id: 7,
            amount_minor: 73_450,
            payment_ref: "pi_abc".to_string(),
            nonce: 3,
            signature: TypedSignature::from_bytes(&[0x5a; 64]),
        }
    }

    #[test]
    fn config_defaults() {
        let c = config();
        assert_eq!(c.confirmations_required, 3);
        assert_eq!(c.timeout_secs, 30);
        assert_eq!(c.chain_id, 8453);
        assert_eq!(config().with_confirmations(12).confirmations_required, 12);
    }

    #[test]
    fn client_rejects_invalid_addresses() {
        let mut bad = config();
        bad.contract_address = "not-an-address".to_string();
        assert!(JsonRpcSettlementClient::new(bad).is_err());

        let mut bad = config();
        bad.from_address = "0x123".to_string();
        assert!(JsonRpcSettlementClient::new(bad).is_err());

        assert!(JsonRpcSettlementClient::new(config()).is_ok());
    }

    #[test]
    fn donation_calldata_layout() {
        let data = encode_donation(&donation_call()).unwrap();
        // 0x + 8 (selector) + 5 words * 64 + 128 (signature) = 458 chars
        assert_eq!(data.len(), 458);
        assert!(data.starts_with("0x8f38fb17"));
        // Signer address is lowercased and left-padded.
        assert!(data[10..74].ends_with("deadbeefdeadbeefdeadbeefdeadbeefdeadbeef"));
        assert!(data[10..74].starts_with("000000000000000000000000"));
        // Amount word.
        assert_eq!(&data[138..202], &format!("{:064x}", 73_450u64));
    }

    #[test]
    fn approval_calldata_layout() {
        let call = ApprovalCall {
            signer_address: ADDR_A.to_string(),
            campaign_onchain_id: 7,
            milestone_index: 2,
            nonce: 9,
            signature: TypedSignature::from_bytes(&[1u8; 64]),
        };
        let data = encode_approval(&call).unwrap();
        // 0x + 8 + 4 words * 64 + 128 = 394 chars
        assert_eq!(data.len(), 394);
        assert!(data.starts_with("0x5b7633d0"));
        assert_eq!(&data[138..202], &format!("{:064x}", 2u64));
    }

    #[test]
    fn payment_ref_word_is_stable_sha256() {
        let a = word_payment_ref("pi_abc");
        let b = word_payment_ref("pi_abc");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, word_payment_ref("pi_abd"));
    }

    #[test]
    fn negative_amount_is_rejected() {
        let mut call = donation_call();
        call.amount_minor = -1;
        assert!(matches!(
            encode_donation(&call),
            Err(SettlementError::InvalidCall(_))
        ));
    }

    #[test]
    fn hex_quantity_parsing() {
        assert_eq!(
            parse_hex_quantity(&serde_json::json!("0x2a")),
            Some(42)
        );
        assert_eq!(parse_hex_quantity(&serde_json::json!("1f")), Some(31));
        assert_eq!(parse_hex_quantity(&serde_json::json!(null)), None);
        assert_eq!(parse_hex_quantity(&serde_json::json!("zz")), None);
    }
}
