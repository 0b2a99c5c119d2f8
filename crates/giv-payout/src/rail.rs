// SPDX-License-Identifier: BUSL-1.1
//! # Payout Rail Trait
//!
//! The orchestrator's view of the fiat payout provider: provision an NGO
//! account once at campaign setup, then move released escrow to it with
//! idempotent transfers. Every transfer carries an idempotency key so a
//! retried call can never pay twice.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use giv_core::Money;

use crate::error::PayoutError;

/// Status of a payout transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Accepted by the rail; settlement in progress.
    Pending,
    /// Funds delivered.
    Paid,
    /// The rail definitively failed the transfer.
    Failed,
}

/// A transfer request for released escrow.
#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    /// Destination payout account id.
    pub destination_account: String,
    pub amount: Money,
    /// Human-readable statement line.
    pub description: String,
    /// Caller-chosen key; the rail deduplicates on it.
    pub idempotency_key: String,
}

/// A transfer as acknowledged by the rail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    /// Rail-assigned transfer id.
    pub id: String,
    pub status: TransferStatus,
}

/// Async interface to the payout provider.
#[async_trait]
pub trait PayoutRail: Send + Sync {
    /// Create a payout account for an NGO. Returns the account id.
    async fn provision_account(
        &self,
        ngo_name: &str,
        contact_email: &str,
    ) -> Result<String, PayoutError>;

    /// Execute (or replay) an idempotent transfer.
    async fn transfer(&self, request: &TransferRequest) -> Result<Transfer, PayoutError>;

    /// Current status of a previously created transfer.
    async fn transfer_status(&self, transfer_id: &str) -> Result<TransferStatus, PayoutError>;
}
