// SPDX-License-Identifier: BUSL-1.1
//! Signer gateway error types.

use thiserror::Error;

/// Errors from custody key and signing operations.
#[derive(Error, Debug)]
pub enum SignerError {
    /// The custody key service is unreachable or the key is temporarily
    /// unavailable. Retryable.
    #[error("signer unavailable: {reason}")]
    Unavailable {
        /// Human-readable description of the outage.
        reason: String,
    },

    /// No custodian is registered for the requested key id.
    #[error("unknown key id: {key_id}")]
    UnknownKey {
        /// The key id that was looked up.
        key_id: String,
    },

    /// The address derived from the custody key does not match the stored
    /// address. Fatal — indicates data corruption or misconfiguration,
    /// never retried.
    #[error("signer address mismatch for key {key_id}: stored {stored}, derived {derived}")]
    AddressMismatch {
        key_id: String,
        stored: String,
        derived: String,
    },

    /// Key material is malformed (wrong length, bad hex).
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    /// Signature bytes are malformed.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Message canonicalization failed.
    #[error("canonicalization failed: {0}")]
    Canonical(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_display_names_both_addresses() {
        let err = SignerError::AddressMismatch {
            key_id: "ngo-7".to_string(),
            stored: "0xaaaa".to_string(),
            derived: "0xbbbb".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("0xaaaa"));
        assert!(msg.contains("0xbbbb"));
        assert!(msg.contains("ngo-7"));
    }

    #[test]
    fn unavailable_display() {
        let err = SignerError::Unavailable {
            reason: "vault sealed".to_string(),
        };
        assert!(format!("{err}").contains("vault sealed"));
    }
}
