// SPDX-License-Identifier: BUSL-1.1
//! # Validation Error Types
//!
//! Boundary validation errors shared by the intake surfaces. A validation
//! failure is rejected before any side effect — it never reaches the
//! orchestrator.

use thiserror::Error;

/// Errors from validating externally supplied values.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Amount string could not be parsed as exact minor-unit decimal.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Payment reference is empty or malformed.
    #[error("invalid payment reference: {0}")]
    InvalidPaymentRef(String),

    /// The direct/escrow split in event metadata does not sum to the
    /// gross amount.
    #[error("amount mismatch: direct {direct} + escrow {escrow} != gross {gross}")]
    AmountMismatch {
        direct: String,
        escrow: String,
        gross: String,
    },

    /// A field required by the event kind is missing.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field has an out-of-range or malformed value.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ValidationError::AmountMismatch {
            direct: "10.00".to_string(),
            escrow: "5.00".to_string(),
            gross: "20.00".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("10.00"));
        assert!(msg.contains("20.00"));
    }

    #[test]
    fn all_variants_are_debug() {
        let variants = vec![
            ValidationError::InvalidAmount("x".to_string()),
            ValidationError::InvalidPaymentRef("y".to_string()),
            ValidationError::MissingField("campaign_id"),
            ValidationError::InvalidField {
                field: "nonce",
                reason: "negative".to_string(),
            },
        ];
        for v in variants {
            assert!(!format!("{v:?}").is_empty());
        }
    }
}
