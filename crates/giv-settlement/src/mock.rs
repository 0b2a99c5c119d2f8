// SPDX-License-Identifier: BUSL-1.1
//! # Mock Settlement Client
//!
//! In-memory settlement contract for tests: tracks per-signer nonces,
//! records every submitted call, and lets tests script failures and
//! transaction statuses.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::client::{ApprovalCall, DonationCall, SettlementClient, TxStatus};
use crate::error::SettlementError;

/// A call the mock accepted, for test assertions.
#[derive(Debug, Clone)]
pub enum SubmittedCall {
    Donation(DonationCall),
    Approval(ApprovalCall),
}

/// Scriptable in-memory settlement client.
///
/// Enforces the contract's nonce rule: a call whose nonce does not match
/// the signer's expected nonce reverts, and a successful call increments
/// it. New transactions start `Confirmed` unless a status is scripted.
#[derive(Debug, Default)]
pub struct MockSettlementClient {
    nonces: DashMap<String, u64>,
    statuses: DashMap<String, TxStatus>,
    submitted: Mutex<Vec<SubmittedCall>>,
    tx_counter: AtomicU64,
    fail_submissions: AtomicU32,
    unavailable_calls: AtomicU32,
}

impl MockSettlementClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` submissions revert on-chain.
    pub fn fail_next_submissions(&self, n: u32) {
        self.fail_submissions.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` client calls fail as transient unavailability.
    pub fn unavailable_for_next_calls(&self, n: u32) {
        self.unavailable_calls.store(n, Ordering::SeqCst);
    }

    /// Script the status reported for a transaction hash.
    pub fn set_status(&self, tx_hash: &str, status: TxStatus) {
        self.statuses.insert(tx_hash.to_string(), status);
    }

    /// All accepted calls, in submission order.
    pub fn submitted(&self) -> Vec<SubmittedCall> {
        self.submitted.lock().clone()
    }

    /// Nonces consumed by a signer so far.
    pub fn consumed_nonces(&self, signer_address: &str) -> u64 {
        self.nonces
            .get(&signer_address.to_ascii_lowercase())
            .map(|n| *n)
            .unwrap_or(0)
    }

    fn check_unavailable(&self) -> Result<(), SettlementError> {
        let remaining = self.unavailable_calls.load(Ordering::SeqCst);
        if remaining > 0 {
            self.unavailable_calls.store(remaining - 1, Ordering::SeqCst);
            return Err(SettlementError::Unavailable {
                reason: "scripted outage".to_string(),
            });
        }
        Ok(())
    }

    fn next_tx_hash(&self) -> String {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        format!("0x{n:064x}")
    }

    fn submit(
        &self,
        signer_address: &str,
        nonce: u64,
        call: SubmittedCall,
    ) -> Result<String, SettlementError> {
        self.check_unavailable()?;

        let key = signer_address.to_ascii_lowercase();
        let mut expected = self.nonces.entry(key).or_insert(0);
        let tx_hash = self.next_tx_hash();

        if nonce != *expected {
            self.statuses.insert(tx_hash.clone(), TxStatus::Failed);
            return Err(SettlementError::Reverted {
                tx_hash,
                reason: format!("nonce mismatch: got {nonce}, expected {}", *expected),
            });
        }

        let scripted_fail = self.fail_submissions.load(Ordering::SeqCst);
        if scripted_fail > 0 {
            self.fail_submissions.store(scripted_fail - 1, Ordering::SeqCst);
            self.statuses.insert(tx_hash.clone(), TxStatus::Failed);
            return Err(SettlementError::Reverted {
                tx_hash,
                reason: "scripted revert".to_string(),
            });
        }

        *expected += 1;
        self.statuses
            .entry(tx_hash.clone())
            .or_insert(TxStatus::Confirmed);
        self.submitted.lock().push(call);
        Ok(tx_hash)
    }
}

#[async_trait::async_trait]
impl SettlementClient for MockSettlementClient {
    async fn expected_nonce(&self, signer_address: &str) -> Result<u64, SettlementError> {
        self.check_unavailable()?;
        Ok(self.consumed_nonces(signer_address))
    }

    async fn donate_with_signature(
        &self,
        call: &DonationCall,
    ) -> Result<String, SettlementError> {
        self.submit(
            &call.signer_address,
            call.nonce,
            SubmittedCall::Donation(call.clone()),
        )
    }

    async fn approve_milestone(&self, call: &ApprovalCall) -> Result<String, SettlementError> {
        self.submit(
            &call.signer_address,
            call.nonce,
            SubmittedCall::Approval(call.clone()),
        )
    }

    async fn transaction_status(&self, tx_hash: &str) -> Result<TxStatus, SettlementError> {
        self.check_unavailable()?;
        Ok(self
            .statuses
            .get(tx_hash)
            .map(|s| *s)
            .unwrap_or(TxStatus::Pending))
    }
}
