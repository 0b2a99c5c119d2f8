// SPDX-License-Identifier: BUSL-1.1
//! # Webhook Signature Verification
//!
//! Verifies the payment processor's detached Ed25519 signature over the
//! raw request body. Verification happens on the exact bytes received —
//! re-serializing the parsed JSON would open a canonicalization split
//! between what was signed and what was checked.

use ed25519_dalek::{Signature, VerifyingKey};
use giv_core::CanonicalBytes;

use crate::custodian::verify;
use crate::error::SignerError;
use crate::hex::hex_to_bytes;

/// Parse a hex-encoded Ed25519 verifying key (64 hex chars).
pub fn parse_verifying_key(hex: &str) -> Result<VerifyingKey, SignerError> {
    let bytes = hex_to_bytes(hex)?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| SignerError::InvalidKey("expected 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&arr).map_err(|e| SignerError::InvalidKey(e.to_string()))
}

/// Verify a detached hex signature over the raw webhook body.
pub fn verify_event_signature(
    key: &VerifyingKey,
    body: &[u8],
    signature_hex: &str,
) -> Result<(), SignerError> {
    let sig_bytes = hex_to_bytes(signature_hex)?;
    let arr: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| SignerError::InvalidSignature("expected 64 bytes".to_string()))?;
    let signature = Signature::from_bytes(&arr);
    verify(key, &CanonicalBytes::from_raw(body.to_vec()), &signature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custodian::{KeyCustodian, LocalKeyCustodian};
    use crate::hex::bytes_to_hex;

    fn signed_body(custodian: &LocalKeyCustodian, body: &[u8]) -> String {
        let sig = custodian
            .sign(&CanonicalBytes::from_raw(body.to_vec()))
            .unwrap();
        bytes_to_hex(&sig.to_bytes())
    }

    #[test]
    fn valid_signature_verifies() {
        let custodian = LocalKeyCustodian::from_seed(&[11u8; 32]);
        let body = br#"{"payment_reference":"pi_1","gross_amount":"10.00"}"#;
        let sig_hex = signed_body(&custodian, body);
        let vk = custodian.verifying_key().unwrap();
        assert!(verify_event_signature(&vk, body, &sig_hex).is_ok());
    }

    #[test]
    fn tampered_body_fails() {
        let custodian = LocalKeyCustodian::from_seed(&[11u8; 32]);
        let body = br#"{"gross_amount":"10.00"}"#;
        let sig_hex = signed_body(&custodian, body);
        let vk = custodian.verifying_key().unwrap();
        let tampered = br#"{"gross_amount":"99.00"}"#;
        assert!(verify_event_signature(&vk, tampered, &sig_hex).is_err());
    }

    #[test]
    fn wrong_key_fails() {
        let signer = LocalKeyCustodian::from_seed(&[11u8; 32]);
        let other = LocalKeyCustodian::from_seed(&[12u8; 32]);
        let body = b"payload";
        let sig_hex = signed_body(&signer, body);
        let vk = other.verifying_key().unwrap();
        assert!(verify_event_signature(&vk, body, &sig_hex).is_err());
    }

    #[test]
    fn malformed_signature_hex_fails() {
        let custodian = LocalKeyCustodian::from_seed(&[11u8; 32]);
        let vk = custodian.verifying_key().unwrap();
        assert!(verify_event_signature(&vk, b"x", "zz").is_err());
        assert!(verify_event_signature(&vk, b"x", "abcd").is_err());
    }

    #[test]
    fn parse_verifying_key_roundtrip() {
        let custodian = LocalKeyCustodian::from_seed(&[13u8; 32]);
        let vk = custodian.verifying_key().unwrap();
        let hex = bytes_to_hex(vk.as_bytes());
        assert_eq!(parse_verifying_key(&hex).unwrap(), vk);
    }

    #[test]
    fn parse_verifying_key_rejects_bad_length() {
        assert!(parse_verifying_key("abcd").is_err());
    }
}
