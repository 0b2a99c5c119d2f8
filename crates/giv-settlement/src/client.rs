// SPDX-License-Identifier: BUSL-1.1
//! # Settlement Client Trait
//!
//! The orchestrator's view of the settlement contract: query a signer's
//! expected nonce, submit signed donation and approval calls, poll
//! transaction status. [`crate::evm::JsonRpcSettlementClient`] is the
//! production implementation; [`crate::mock::MockSettlementClient`] backs
//! tests.

use async_trait::async_trait;
use std::time::Duration;

use giv_signer::typed_data::TypedSignature;

use crate::error::SettlementError;

/// Status of a submitted settlement transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Not yet mined, or below the confirmation threshold.
    Pending,
    /// Mined with enough confirmations.
    Confirmed,
    /// Mined and reverted.
    Failed,
}

/// A signed `donateWithSignature` call.
#[derive(Debug, Clone)]
pub struct DonationCall {
    /// Settlement address of the signing custody key.
    pub signer_address: String,
    /// On-chain campaign identifier.
    pub campaign_onchain_id: u64,
    /// Allocation amount in minor units.
    pub amount_minor: i64,
    /// Processor payment reference (hashed into calldata).
    pub payment_ref: String,
    /// Nonce the signature was prepared for.
    pub nonce: u64,
    pub signature: TypedSignature,
}

/// A signed `approveMilestone` call.
#[derive(Debug, Clone)]
pub struct ApprovalCall {
    /// Settlement address of the signing custody key.
    pub signer_address: String,
    /// On-chain campaign identifier.
    pub campaign_onchain_id: u64,
    /// Index of the milestone being approved.
    pub milestone_index: u32,
    /// Nonce the signature was prepared for.
    pub nonce: u64,
    pub signature: TypedSignature,
}

/// Async interface to the settlement contract.
#[async_trait]
pub trait SettlementClient: Send + Sync {
    /// The next nonce the contract expects from `signer_address`.
    ///
    /// Always queried fresh before signing — the chain is the only
    /// authority on nonce state.
    async fn expected_nonce(&self, signer_address: &str) -> Result<u64, SettlementError>;

    /// Submit a signed donation allocation. Returns the transaction hash.
    async fn donate_with_signature(
        &self,
        call: &DonationCall,
    ) -> Result<String, SettlementError>;

    /// Submit a signed milestone approval. Returns the transaction hash.
    async fn approve_milestone(&self, call: &ApprovalCall) -> Result<String, SettlementError>;

    /// Current status of a submitted transaction.
    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus, SettlementError>;
}

/// Poll until `tx_hash` is confirmed or the window closes.
///
/// Returns `Reverted` if the transaction failed on-chain and
/// `ConfirmationTimeout` if it is still pending after `max_polls`
/// attempts spaced `poll_interval` apart. Timeout is not failure: the
/// transaction stays in flight and the settlement sweep resolves it.
pub async fn await_confirmation(
    client: &dyn SettlementClient,
    tx_hash: &str,
    poll_interval: Duration,
    max_polls: u32,
) -> Result<(), SettlementError> {
    for attempt in 0..max_polls {
        match client.transaction_status(tx_hash).await? {
            TxStatus::Confirmed => return Ok(()),
            TxStatus::Failed => {
                return Err(SettlementError::Reverted {
                    tx_hash: tx_hash.to_string(),
                    reason: "transaction reverted on-chain".to_string(),
                })
            }
            TxStatus::Pending => {
                tracing::debug!(tx_hash, attempt, "settlement tx still pending");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
    Err(SettlementError::ConfirmationTimeout {
        tx_hash: tx_hash.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSettlementClient;

    fn donation_call(nonce: u64) -> DonationCall {
        DonationCall {
            signer_address: "0x00000000000000000000000000000000000000aa".to_string(),
            campaign_onchain_id: 1,
            amount_minor: 73_450,
            payment_ref: "pi_1".to_string(),
            nonce,
            signature: TypedSignature::from_bytes(&[7u8; 64]),
        }
    }

    #[tokio::test]
    async fn await_confirmation_succeeds_on_confirmed() {
        let client = MockSettlementClient::new();
        let tx = client.donate_with_signature(&donation_call(0)).await.unwrap();
        assert!(
            await_confirmation(&client, &tx, Duration::from_millis(1), 3)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn await_confirmation_times_out_on_pending() {
        let client = MockSettlementClient::new();
        let tx = client.donate_with_signature(&donation_call(0)).await.unwrap();
        client.set_status(&tx, TxStatus::Pending);
        let result = await_confirmation(&client, &tx, Duration::from_millis(1), 3).await;
        assert!(matches!(
            result,
            Err(SettlementError::ConfirmationTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn await_confirmation_surfaces_revert() {
        let client = MockSettlementClient::new();
        let tx = client.donate_with_signature(&donation_call(0)).await.unwrap();
        client.set_status(&tx, TxStatus::Failed);
        let result = await_confirmation(&client, &tx, Duration::from_millis(1), 3).await;
        assert!(matches!(result, Err(SettlementError::Reverted { .. })));
    }
}
