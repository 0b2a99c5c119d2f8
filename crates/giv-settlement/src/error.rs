// SPDX-License-Identifier: BUSL-1.1
//! Settlement error taxonomy.
//!
//! The split matters to the orchestrator: `Unavailable` is transient and
//! retryable, `Reverted` consumed a nonce and must never be blindly
//! resubmitted, `ConfirmationTimeout` leaves the transaction in flight
//! for the settlement sweep to resolve.

use thiserror::Error;

/// Errors from the settlement layer.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Endpoint unreachable, timed out, or returned a malformed response.
    /// Transient: safe to retry after re-deriving the nonce.
    #[error("settlement endpoint unavailable: {reason}")]
    Unavailable { reason: String },

    /// The JSON-RPC layer returned an error for this call.
    #[error("settlement rpc error ({method}): {reason}")]
    Rpc { method: String, reason: String },

    /// The call was submitted and the contract reverted it. The nonce may
    /// or may not have been consumed; re-derive before any retry.
    #[error("settlement call reverted (tx {tx_hash}): {reason}")]
    Reverted { tx_hash: String, reason: String },

    /// Submission was accepted but confirmation did not arrive inside the
    /// polling window. The transaction is still in flight.
    #[error("confirmation window elapsed for tx {tx_hash}")]
    ConfirmationTimeout { tx_hash: String },

    /// Call parameters that cannot be encoded into calldata.
    #[error("invalid settlement call: {0}")]
    InvalidCall(String),
}

impl SettlementError {
    /// True for failures where a retry with a fresh nonce can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_transient() {
        assert!(SettlementError::Unavailable {
            reason: "timeout".into()
        }
        .is_transient());
        assert!(!SettlementError::Reverted {
            tx_hash: "0x1".into(),
            reason: "nonce".into()
        }
        .is_transient());
        assert!(!SettlementError::ConfirmationTimeout {
            tx_hash: "0x1".into()
        }
        .is_transient());
    }
}
