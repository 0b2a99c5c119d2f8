// SPDX-License-Identifier: BUSL-1.1
//! # Signer Gateway
//!
//! Key-id → custodian registry with typed-data signing and address
//! derivation. Stateless beyond the key lookup: nonce bookkeeping and
//! submission ordering live in the settlement client, not here.
//!
//! The settlement address for a key is derived from its verifying key
//! (last 20 bytes of the SHA-256 of the public key bytes, "0x"-prefixed),
//! matching the settlement layer's account derivation. `assert_address`
//! is called once at signer provisioning time: a stored address that the
//! custody key cannot reproduce means corrupted configuration and is
//! surfaced as the fatal [`SignerError::AddressMismatch`].

use std::sync::Arc;

use dashmap::DashMap;
use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};

use crate::custodian::KeyCustodian;
use crate::error::SignerError;
use crate::hex::bytes_to_hex;
use crate::typed_data::{SettlementDomain, TypedMessage, TypedSignature};

/// Derive the settlement address for a verifying key.
pub fn derive_settlement_address(key: &VerifyingKey) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("0x{}", bytes_to_hex(&digest[12..32]))
}

/// Validate that a string is a well-formed settlement address
/// ("0x" + 40 hex chars).
pub fn is_valid_settlement_address(addr: &str) -> bool {
    addr.len() == 42
        && addr.starts_with("0x")
        && addr[2..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Custody key registry and typed-data signer.
///
/// Thread-safe via `DashMap`; clients hold it behind an `Arc` and call it
/// from concurrent orchestrator tasks.
pub struct SignerGateway {
    custodians: DashMap<String, Arc<dyn KeyCustodian>>,
    domain: SettlementDomain,
}

impl SignerGateway {
    /// Create an empty gateway for the given settlement domain.
    pub fn new(domain: SettlementDomain) -> Self {
        Self {
            custodians: DashMap::new(),
            domain,
        }
    }

    /// The typed-data domain this gateway signs under.
    pub fn domain(&self) -> &SettlementDomain {
        &self.domain
    }

    /// Register a custodian under a key id.
    pub fn register(&self, key_id: impl Into<String>, custodian: Arc<dyn KeyCustodian>) {
        self.custodians.insert(key_id.into(), custodian);
    }

    fn custodian(&self, key_id: &str) -> Result<Arc<dyn KeyCustodian>, SignerError> {
        self.custodians
            .get(key_id)
            .map(|c| c.value().clone())
            .ok_or_else(|| SignerError::UnknownKey {
                key_id: key_id.to_string(),
            })
    }

    /// Sign a typed message with the key registered under `key_id`.
    pub fn sign(&self, key_id: &str, message: &TypedMessage) -> Result<TypedSignature, SignerError> {
        let custodian = self.custodian(key_id)?;
        let bytes = message.signing_bytes(&self.domain)?;
        let signature = custodian.sign(&bytes)?;
        Ok(TypedSignature::from_bytes(&signature.to_bytes()))
    }

    /// Derive the settlement address for the key registered under `key_id`.
    pub fn address_for(&self, key_id: &str) -> Result<String, SignerError> {
        let custodian = self.custodian(key_id)?;
        let vk = custodian.verifying_key()?;
        Ok(derive_settlement_address(&vk))
    }

    /// Assert that the stored address matches what the custody key derives.
    ///
    /// Called at provisioning time. A mismatch is fatal configuration
    /// corruption — the caller must not retry.
    pub fn assert_address(&self, key_id: &str, stored: &str) -> Result<(), SignerError> {
        let derived = self.address_for(key_id)?;
        if !derived.eq_ignore_ascii_case(stored) {
            return Err(SignerError::AddressMismatch {
                key_id: key_id.to_string(),
                stored: stored.to_string(),
                derived,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for SignerGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerGateway")
            .field("keys", &self.custodians.len())
            .field("domain", &self.domain)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custodian::{verify, LocalKeyCustodian};
    use crate::typed_data::DonationPermit;

    fn test_gateway() -> SignerGateway {
        SignerGateway::new(SettlementDomain {
            name: "giv-settlement".to_string(),
            version: "1".to_string(),
            chain_id: 8453,
            verifying_contract: "0x00000000000000000000000000000000000000aa".to_string(),
        })
    }

    fn permit(nonce: u64) -> TypedMessage {
        TypedMessage::Donation(DonationPermit {
            campaign_onchain_id: 3,
            amount_minor: 50_000,
            payment_ref: "pi_xyz".to_string(),
            nonce,
        })
    }

    #[test]
    fn derived_address_is_wellformed() {
        let custodian = LocalKeyCustodian::generate();
        let addr = derive_settlement_address(&custodian.verifying_key().unwrap());
        assert!(is_valid_settlement_address(&addr));
    }

    #[test]
    fn address_derivation_is_deterministic() {
        let custodian = LocalKeyCustodian::from_seed(&[7u8; 32]);
        let vk = custodian.verifying_key().unwrap();
        assert_eq!(derive_settlement_address(&vk), derive_settlement_address(&vk));
    }

    #[test]
    fn sign_produces_verifiable_signature() {
        let gateway = test_gateway();
        let custodian = Arc::new(LocalKeyCustodian::from_seed(&[1u8; 32]));
        gateway.register("ngo-1", custodian.clone());

        let msg = permit(0);
        let sig = gateway.sign("ngo-1", &msg).unwrap();

        let bytes = msg.signing_bytes(gateway.domain()).unwrap();
        let vk = custodian.verifying_key().unwrap();
        let raw = ed25519_dalek::Signature::from_bytes(&sig.to_bytes().unwrap());
        assert!(verify(&vk, &bytes, &raw).is_ok());
    }

    #[test]
    fn sign_is_deterministic() {
        let gateway = test_gateway();
        gateway.register("ngo-1", Arc::new(LocalKeyCustodian::from_seed(&[2u8; 32])));
        let msg = permit(5);
        assert_eq!(
            gateway.sign("ngo-1", &msg).unwrap(),
            gateway.sign("ngo-1", &msg).unwrap()
        );
    }

    #[test]
    fn unknown_key_id_errors() {
        let gateway = test_gateway();
        assert!(matches!(
            gateway.sign("missing", &permit(0)),
            Err(SignerError::UnknownKey { .. })
        ));
        assert!(matches!(
            gateway.address_for("missing"),
            Err(SignerError::UnknownKey { .. })
        ));
    }

    #[test]
    fn assert_address_accepts_matching() {
        let gateway = test_gateway();
        gateway.register("ngo-1", Arc::new(LocalKeyCustodian::from_seed(&[3u8; 32])));
        let addr = gateway.address_for("ngo-1").unwrap();
        assert!(gateway.assert_address("ngo-1", &addr).is_ok());
        // Case-insensitive match.
        assert!(gateway.assert_address("ngo-1", &addr.to_uppercase().replace("0X", "0x")).is_ok());
    }

    #[test]
    fn assert_address_rejects_mismatch() {
        let gateway = test_gateway();
        gateway.register("ngo-1", Arc::new(LocalKeyCustodian::from_seed(&[4u8; 32])));
        let result = gateway.assert_address(
            "ngo-1",
            "0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef",
        );
        assert!(matches!(result, Err(SignerError::AddressMismatch { .. })));
    }

    #[test]
    fn address_validation() {
        assert!(is_valid_settlement_address(
            "0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef"
        ));
        assert!(!is_valid_settlement_address("0x123"));
        assert!(!is_valid_settlement_address(
            "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef00"
        ));
        assert!(!is_valid_settlement_address(
            "0xGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG"
        ));
    }
}
