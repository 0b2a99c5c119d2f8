// SPDX-License-Identifier: BUSL-1.1
//! # Custody Key Backends
//!
//! Abstracts custody key storage and signing behind a trait so the
//! gateway can mix backends per NGO:
//!
//! - [`LocalKeyCustodian`]: in-memory key for development and testing.
//! - [`EnvKeyCustodian`]: loads key material from an environment variable
//!   (hex-encoded 32-byte Ed25519 seed). Suitable for container
//!   deployments where secrets are injected via environment.
//!
//! ## Security Invariants
//!
//! - All key material implements `Zeroize + Drop` for secure cleanup.
//! - `KeyCustodian` is `Send + Sync` for use across async tasks.
//! - Signing input is `&CanonicalBytes` (never raw bytes).

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use giv_core::CanonicalBytes;
use zeroize::Zeroize;

use crate::error::SignerError;
use crate::hex::hex_to_bytes;

/// Trait for custody key storage and signing backends.
///
/// Implementations must be `Send + Sync` for use in multi-threaded async
/// runtimes. Signatures are deterministic: signing the same canonical
/// bytes twice yields identical output.
pub trait KeyCustodian: Send + Sync {
    /// Sign canonicalized data with the managed key.
    fn sign(&self, data: &CanonicalBytes) -> Result<Signature, SignerError>;

    /// Return the verifying (public) key.
    fn verifying_key(&self) -> Result<VerifyingKey, SignerError>;

    /// Human-readable name for this backend (for diagnostics/logging).
    fn backend_name(&self) -> &str;
}

/// Verify a signature over canonical bytes against a verifying key.
pub fn verify(
    key: &VerifyingKey,
    data: &CanonicalBytes,
    signature: &Signature,
) -> Result<(), SignerError> {
    key.verify(data.as_bytes(), signature)
        .map_err(|e| SignerError::VerificationFailed(e.to_string()))
}

// ─── LocalKeyCustodian ───────────────────────────────────────────────────

/// In-memory custody key for development and testing.
///
/// Wraps a [`SigningKey`] directly. Key material lives in process memory
/// and is zeroized on drop.
pub struct LocalKeyCustodian {
    key: SigningKey,
}

impl LocalKeyCustodian {
    /// Create from an existing signing key.
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Generate a new random key using the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut rand_core::OsRng),
        }
    }

    /// Create from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(seed),
        }
    }
}

impl KeyCustodian for LocalKeyCustodian {
    fn sign(&self, data: &CanonicalBytes) -> Result<Signature, SignerError> {
        Ok(self.key.sign(data.as_bytes()))
    }

    fn verifying_key(&self) -> Result<VerifyingKey, SignerError> {
        Ok(self.key.verifying_key())
    }

    fn backend_name(&self) -> &str {
        "LocalKeyCustodian"
    }
}

// ─── EnvKeyCustodian ─────────────────────────────────────────────────────

/// Loads a custody key from an environment variable.
///
/// The variable must contain a 64-character hex string encoding the
/// 32-byte Ed25519 seed. The key is loaded once at construction and held
/// in memory (zeroized on drop).
pub struct EnvKeyCustodian {
    key: SigningKey,
    var_name: String,
}

impl EnvKeyCustodian {
    /// Load the signing key from the named environment variable.
    ///
    /// Every intermediate copy of the seed is zeroized before return.
    pub fn from_env(var_name: &str) -> Result<Self, SignerError> {
        let mut hex = std::env::var(var_name).map_err(|_| SignerError::Unavailable {
            reason: format!("environment variable {var_name} not set"),
        })?;

        let decoded = hex_to_bytes(&hex);
        hex.zeroize();
        let mut bytes = decoded?;
        if bytes.len() != 32 {
            bytes.zeroize();
            return Err(SignerError::InvalidKey(format!(
                "expected 32 bytes (64 hex chars) in {var_name}"
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        bytes.zeroize();
        let key = SigningKey::from_bytes(&seed);
        seed.zeroize();

        Ok(Self {
            key,
            var_name: var_name.to_string(),
        })
    }

    /// The environment variable name this custodian was loaded from.
    pub fn var_name(&self) -> &str {
        &self.var_name
    }
}

impl KeyCustodian for EnvKeyCustodian {
    fn sign(&self, data: &CanonicalBytes) -> Result<Signature, SignerError> {
        Ok(self.key.sign(data.as_bytes()))
    }

    fn verifying_key(&self) -> Result<VerifyingKey, SignerError> {
        Ok(self.key.verifying_key())
    }

    fn backend_name(&self) -> &str {
        "EnvKeyCustodian"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn local_sign_and_verify() {
        let custodian = LocalKeyCustodian::generate();
        let data = CanonicalBytes::new(&json!({"action": "test"})).unwrap();
        let sig = custodian.sign(&data).unwrap();
        let vk = custodian.verifying_key().unwrap();
        assert!(verify(&vk, &data, &sig).is_ok());
    }

    #[test]
    fn local_from_seed_deterministic() {
        let seed = [42u8; 32];
        let a = LocalKeyCustodian::from_seed(&seed);
        let b = LocalKeyCustodian::from_seed(&seed);
        assert_eq!(a.verifying_key().unwrap(), b.verifying_key().unwrap());

        let data = CanonicalBytes::new(&json!({"n": 1})).unwrap();
        assert_eq!(a.sign(&data).unwrap(), b.sign(&data).unwrap());
    }

    #[test]
    fn verify_rejects_tampered_data() {
        let custodian = LocalKeyCustodian::generate();
        let data = CanonicalBytes::new(&json!({"amount": 100})).unwrap();
        let tampered = CanonicalBytes::new(&json!({"amount": 999})).unwrap();
        let sig = custodian.sign(&data).unwrap();
        let vk = custodian.verifying_key().unwrap();
        assert!(verify(&vk, &tampered, &sig).is_err());
    }

    #[test]
    fn env_custodian_missing_var_is_unavailable() {
        let result = EnvKeyCustodian::from_env("GIV_TEST_KEY_THAT_DOES_NOT_EXIST_9913");
        assert!(matches!(result, Err(SignerError::Unavailable { .. })));
    }

    #[test]
    fn env_custodian_loads_and_matches_local() {
        let seed = [0x99u8; 32];
        let hex: String = seed.iter().map(|b| format!("{b:02x}")).collect();
        let var = "GIV_TEST_CUSTODIAN_COMPAT";
        std::env::set_var(var, &hex);

        let env = EnvKeyCustodian::from_env(var).unwrap();
        let local = LocalKeyCustodian::from_seed(&seed);
        assert_eq!(env.verifying_key().unwrap(), local.verifying_key().unwrap());
        assert_eq!(env.backend_name(), "EnvKeyCustodian");
        assert_eq!(env.var_name(), var);

        std::env::remove_var(var);
    }

    #[test]
    fn env_custodian_rejects_short_seed() {
        let var = "GIV_TEST_CUSTODIAN_SHORT";
        std::env::set_var(var, "aabbccdd");
        assert!(matches!(
            EnvKeyCustodian::from_env(var),
            Err(SignerError::InvalidKey(_))
        ));
        std::env::remove_var(var);
    }

    #[test]
    fn custodian_trait_object_safe() {
        let custodian = LocalKeyCustodian::generate();
        let _boxed: Box<dyn KeyCustodian> = Box::new(custodian);
    }
}
