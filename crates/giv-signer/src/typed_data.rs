// SPDX-License-Identifier: BUSL-1.1
//! # Typed Structured Data
//!
//! EIP-712-style typed messages for settlement-contract calls. Every
//! signature covers a domain separator (app name, version, network id,
//! settlement-contract address) plus a primary type tag, so a donation
//! permit signed for one contract or network can never be replayed
//! against another.
//!
//! The envelope is canonicalized with [`CanonicalBytes`] and signed
//! directly — the settlement layer verifies the same canonical encoding.

use serde::{Deserialize, Serialize};
use serde_json::json;

use giv_core::CanonicalBytes;

use crate::error::SignerError;
use crate::hex::{bytes_to_hex, hex_to_bytes};

/// Typed-data domain separator.
///
/// Matches the settlement contract's `{name, version, chainId,
/// verifyingContract}` domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementDomain {
    /// Application name (e.g. "giv-settlement").
    pub name: String,
    /// Domain version string.
    pub version: String,
    /// Network/chain identifier.
    pub chain_id: u64,
    /// Settlement contract address ("0x" + 40 hex chars).
    pub verifying_contract: String,
}

/// Permit for a single donation allocation, consumed by
/// `donateWithSignature`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationPermit {
    /// On-chain campaign identifier.
    pub campaign_onchain_id: u64,
    /// Allocation amount in minor units.
    pub amount_minor: i64,
    /// External payment reference string.
    pub payment_ref: String,
    /// The signer nonce this permit consumes.
    pub nonce: u64,
}

/// Approval of the campaign's current milestone, consumed by
/// `approveMilestone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneApproval {
    /// On-chain campaign identifier.
    pub campaign_onchain_id: u64,
    /// Index of the milestone being approved.
    pub milestone_index: u32,
    /// The signer nonce this approval consumes.
    pub nonce: u64,
}

/// Typed messages the gateway knows how to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedMessage {
    /// `giv.donation.permit.v1`
    Donation(DonationPermit),
    /// `giv.milestone.approval.v1`
    Approval(MilestoneApproval),
}

impl TypedMessage {
    /// Primary type tag included in the signed envelope.
    pub fn primary_type(&self) -> &'static str {
        match self {
            Self::Donation(_) => "giv.donation.permit.v1",
            Self::Approval(_) => "giv.milestone.approval.v1",
        }
    }

    /// Canonical signing envelope: domain + primary type + message.
    pub fn signing_bytes(
        &self,
        domain: &SettlementDomain,
    ) -> Result<CanonicalBytes, SignerError> {
        let message = match self {
            Self::Donation(m) => serde_json::to_value(m),
            Self::Approval(m) => serde_json::to_value(m),
        }
        .map_err(|e| SignerError::Canonical(e.to_string()))?;

        CanonicalBytes::new(&json!({
            "domain": domain,
            "primary_type": self.primary_type(),
            "message": message,
        }))
        .map_err(|e| SignerError::Canonical(e.to_string()))
    }
}

/// A detached signature over a typed message.
///
/// Transported as hex in settlement calldata and persisted alongside the
/// allocation for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypedSignature(String);

impl TypedSignature {
    /// Wrap raw signature bytes.
    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        Self(bytes_to_hex(bytes))
    }

    /// Hex encoding (128 chars, no prefix).
    pub fn to_hex(&self) -> &str {
        &self.0
    }

    /// Decode back to raw bytes.
    pub fn to_bytes(&self) -> Result<[u8; 64], SignerError> {
        let bytes = hex_to_bytes(&self.0)?;
        bytes
            .try_into()
            .map_err(|_| SignerError::InvalidSignature("expected 64 bytes".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_domain() -> SettlementDomain {
        SettlementDomain {
            name: "giv-settlement".to_string(),
            version: "1".to_string(),
            chain_id: 8453,
            verifying_contract: "0x00000000000000000000000000000000000000aa".to_string(),
        }
    }

    #[test]
    fn signing_bytes_are_deterministic() {
        let msg = TypedMessage::Donation(DonationPermit {
            campaign_onchain_id: 7,
            amount_minor: 73_450,
            payment_ref: "pi_abc".to_string(),
            nonce: 3,
        });
        let a = msg.signing_bytes(&test_domain()).unwrap();
        let b = msg.signing_bytes(&test_domain()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_domains_produce_different_bytes() {
        let msg = TypedMessage::Approval(MilestoneApproval {
            campaign_onchain_id: 7,
            milestone_index: 0,
            nonce: 9,
        });
        let mut other = test_domain();
        other.chain_id = 1;
        assert_ne!(
            msg.signing_bytes(&test_domain()).unwrap(),
            msg.signing_bytes(&other).unwrap()
        );
    }

    #[test]
    fn different_nonces_produce_different_bytes() {
        let a = TypedMessage::Donation(DonationPermit {
            campaign_onchain_id: 1,
            amount_minor: 100,
            payment_ref: "r".to_string(),
            nonce: 1,
        });
        let b = TypedMessage::Donation(DonationPermit {
            campaign_onchain_id: 1,
            amount_minor: 100,
            payment_ref: "r".to_string(),
            nonce: 2,
        });
        assert_ne!(
            a.signing_bytes(&test_domain()).unwrap(),
            b.signing_bytes(&test_domain()).unwrap()
        );
    }

    #[test]
    fn primary_type_tags() {
        let d = TypedMessage::Donation(DonationPermit {
            campaign_onchain_id: 1,
            amount_minor: 1,
            payment_ref: "r".to_string(),
            nonce: 0,
        });
        let a = TypedMessage::Approval(MilestoneApproval {
            campaign_onchain_id: 1,
            milestone_index: 2,
            nonce: 0,
        });
        assert_eq!(d.primary_type(), "giv.donation.permit.v1");
        assert_eq!(a.primary_type(), "giv.milestone.approval.v1");
    }

    #[test]
    fn signature_hex_roundtrip() {
        let bytes = [0x5au8; 64];
        let sig = TypedSignature::from_bytes(&bytes);
        assert_eq!(sig.to_hex().len(), 128);
        assert_eq!(sig.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn signature_rejects_truncated_hex() {
        let sig = TypedSignature("abcd".to_string());
        assert!(sig.to_bytes().is_err());
    }
}
