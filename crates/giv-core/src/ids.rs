// SPDX-License-Identifier: BUSL-1.1
//! # Typed Identifiers
//!
//! Newtype UUIDs for the ledger's entities, plus the externally supplied
//! payment reference. Wrapping `Uuid` keeps a campaign id from being
//! handed to a function expecting a donation id.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
            PartialOrd, Ord,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// Identifier of a fundraising campaign.
    CampaignId
);
entity_id!(
    /// Identifier of a donation (one external payment event).
    DonationId
);
entity_id!(
    /// Identifier of a single allocation of a donation to a milestone.
    AllocationId
);

/// External payment reference from the payment processor.
///
/// Unique per captured payment; the donation path's idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentRef(String);

impl PaymentRef {
    /// Maximum accepted reference length. Processor references are short
    /// opaque tokens; anything longer is a malformed event.
    const MAX_LEN: usize = 128;

    /// Validate and wrap a processor payment reference.
    pub fn new(raw: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidPaymentRef(
                "payment reference must not be empty".to_string(),
            ));
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(ValidationError::InvalidPaymentRef(format!(
                "payment reference exceeds {} characters",
                Self::MAX_LEN
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The reference string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        // Compile-time property; runtime sanity only.
        let c = CampaignId::new();
        let d = DonationId::new();
        assert_ne!(c.0, d.0);
    }

    #[test]
    fn id_display_matches_uuid() {
        let id = CampaignId::new();
        assert_eq!(id.to_string(), id.0.to_string());
    }

    #[test]
    fn id_serde_is_transparent() {
        let id = DonationId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
        let back: DonationId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn payment_ref_trims_and_accepts() {
        let r = PaymentRef::new("  pi_3Abc123  ").unwrap();
        assert_eq!(r.as_str(), "pi_3Abc123");
    }

    #[test]
    fn payment_ref_rejects_empty() {
        assert!(PaymentRef::new("").is_err());
        assert!(PaymentRef::new("   ").is_err());
    }

    #[test]
    fn payment_ref_rejects_oversized() {
        assert!(PaymentRef::new("x".repeat(129)).is_err());
        assert!(PaymentRef::new("x".repeat(128)).is_ok());
    }
}
