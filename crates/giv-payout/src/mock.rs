// SPDX-License-Identifier: BUSL-1.1
//! # Mock Payout Rail
//!
//! In-memory payout provider for tests. Honors idempotency keys the way
//! the real rail does: a replayed key returns the original transfer
//! instead of paying twice.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::PayoutError;
use crate::rail::{PayoutRail, Transfer, TransferRequest, TransferStatus};

/// Scriptable in-memory payout rail.
#[derive(Debug, Default)]
pub struct MockPayoutRail {
    accounts: Mutex<Vec<String>>,
    by_idempotency_key: DashMap<String, Transfer>,
    transfers: Mutex<Vec<TransferRequest>>,
    statuses: DashMap<String, TransferStatus>,
    counter: AtomicU64,
    fail_transfers: AtomicU32,
}

impl MockPayoutRail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` transfers fail at the rail.
    pub fn fail_next_transfers(&self, n: u32) {
        self.fail_transfers.store(n, Ordering::SeqCst);
    }

    /// All transfer requests the rail executed (replays excluded).
    pub fn executed_transfers(&self) -> Vec<TransferRequest> {
        self.transfers.lock().clone()
    }

    /// Accounts provisioned so far.
    pub fn provisioned_accounts(&self) -> Vec<String> {
        self.accounts.lock().clone()
    }

    /// Script the status reported for a transfer id.
    pub fn set_status(&self, transfer_id: &str, status: TransferStatus) {
        self.statuses.insert(transfer_id.to_string(), status);
    }
}

#[async_trait::async_trait]
impl PayoutRail for MockPayoutRail {
    async fn provision_account(
        &self,
        ngo_name: &str,
        _contact_email: &str,
    ) -> Result<String, PayoutError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let id = format!("acct_{n}_{}", ngo_name.to_ascii_lowercase().replace(' ', "_"));
        self.accounts.lock().push(id.clone());
        Ok(id)
    }

    async fn transfer(&self, request: &TransferRequest) -> Result<Transfer, PayoutError> {
        if !request.amount.is_positive() {
            return Err(PayoutError::InvalidTransfer(format!(
                "non-positive amount: {}",
                request.amount
            )));
        }

        // Idempotent replay: same key, same transfer.
        if let Some(prior) = self.by_idempotency_key.get(&request.idempotency_key) {
            return Ok(prior.clone());
        }

        let remaining = self.fail_transfers.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_transfers.store(remaining - 1, Ordering::SeqCst);
            return Err(PayoutError::ApiError {
                endpoint: "/v1/transfers".to_string(),
                status: 502,
                body: "scripted failure".to_string(),
            });
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let transfer = Transfer {
            id: format!("tr_{n}"),
            status: TransferStatus::Paid,
        };
        self.statuses.insert(transfer.id.clone(), transfer.status);
        self.by_idempotency_key
            .insert(request.idempotency_key.clone(), transfer.clone());
        self.transfers.lock().push(request.clone());
        Ok(transfer)
    }

    async fn transfer_status(&self, transfer_id: &str) -> Result<TransferStatus, PayoutError> {
        self.statuses
            .get(transfer_id)
            .map(|s| *s)
            .ok_or_else(|| PayoutError::ApiError {
                endpoint: format!("/v1/transfers/{transfer_id}"),
                status: 404,
                body: "no such transfer".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use giv_core::Money;

    fn request(key: &str, minor: i64) -> TransferRequest {
        TransferRequest {
            destination_account: "acct_ngo".to_string(),
            amount: Money::from_minor(minor),
            description: "milestone release".to_string(),
            idempotency_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn replayed_idempotency_key_returns_same_transfer() {
        let rail = MockPayoutRail::new();
        let first = rail.transfer(&request("key-1", 73_450)).await.unwrap();
        let second = rail.transfer(&request("key-1", 73_450)).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(rail.executed_transfers().len(), 1);
    }

    #[tokio::test]
    async fn distinct_keys_pay_separately() {
        let rail = MockPayoutRail::new();
        let a = rail.transfer(&request("key-1", 100)).await.unwrap();
        let b = rail.transfer(&request("key-2", 100)).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(rail.executed_transfers().len(), 2);
    }

    #[tokio::test]
    async fn scripted_failure_then_retry_succeeds() {
        let rail = MockPayoutRail::new();
        rail.fail_next_transfers(1);
        assert!(rail.transfer(&request("key-1", 100)).await.is_err());
        // Retry with the same key succeeds and pays once.
        let t = rail.transfer(&request("key-1", 100)).await.unwrap();
        assert_eq!(t.status, TransferStatus::Paid);
        assert_eq!(rail.executed_transfers().len(), 1);
    }

    #[tokio::test]
    async fn provisioned_accounts_are_recorded() {
        let rail = MockPayoutRail::new();
        let id = rail
            .provision_account("Water For All", "ops@wfa.org")
            .await
            .unwrap();
        assert!(id.starts_with("acct_"));
        assert_eq!(rail.provisioned_accounts(), vec![id]);
    }

    #[tokio::test]
    async fn status_lookup() {
        let rail = MockPayoutRail::new();
        let t = rail.transfer(&request("key-1", 100)).await.unwrap();
        assert_eq!(rail.transfer_status(&t.id).await.unwrap(), TransferStatus::Paid);
        rail.set_status(&t.id, TransferStatus::Failed);
        assert_eq!(rail.transfer_status(&t.id).await.unwrap(), TransferStatus::Failed);
        assert!(rail.transfer_status("tr_nope").await.is_err());
    }
}
