// SPDX-License-Identifier: BUSL-1.1
//! # Canonical Bytes and Content Digests
//!
//! The only sanctioned path to a deterministic byte encoding of a
//! serializable value. Typed-data signing, webhook verification, and
//! settlement calldata all hash [`CanonicalBytes`], never ad-hoc
//! serializations — two components that serialize the same value
//! independently must produce the same digest.
//!
//! Canonicalization: serialize to a `serde_json::Value` (object keys are
//! kept in sorted order) and encode with no insignificant whitespace.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Canonicalization failure (non-serializable value).
#[derive(Error, Debug)]
#[error("canonicalization failed: {0}")]
pub struct CanonicalError(String);

/// Deterministic byte encoding of a serializable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize a serializable value.
    pub fn new<T: Serialize>(value: &T) -> Result<Self, CanonicalError> {
        // serde_json's Map is a BTreeMap by default, so object keys come
        // out sorted; compact encoding removes whitespace variance.
        let value = serde_json::to_value(value).map_err(|e| CanonicalError(e.to_string()))?;
        let bytes = serde_json::to_vec(&value).map_err(|e| CanonicalError(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Wrap raw bytes that are already canonical (e.g. a verbatim webhook
    /// body whose signature covers the exact bytes on the wire).
    pub fn from_raw(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// SHA-256 digest of canonical content.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// The raw 32 digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding (64 characters).
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode from a 64-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, CanonicalError> {
        if hex.len() != 64 {
            return Err(CanonicalError(format!(
                "expected 64 hex chars, got {}",
                hex.len()
            )));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let s = std::str::from_utf8(chunk).map_err(|e| CanonicalError(e.to_string()))?;
            bytes[i] =
                u8::from_str_radix(s, 16).map_err(|e| CanonicalError(e.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Compute a SHA-256 content digest from canonical bytes.
///
/// The signature requires [`CanonicalBytes`] — raw byte slices are not
/// accepted, so every digest in the workspace was computed from properly
/// canonicalized data.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    ContentDigest(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_bytes_sort_object_keys() {
        let a = CanonicalBytes::new(&json!({"b": 2, "a": 1})).unwrap();
        let b = CanonicalBytes::new(&json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_bytes(), br#"{"a":1,"b":2}"#);
    }

    #[test]
    fn digest_is_deterministic() {
        let c = CanonicalBytes::new(&json!({"x": [1, 2, 3]})).unwrap();
        assert_eq!(sha256_digest(&c), sha256_digest(&c));
    }

    #[test]
    fn digest_differs_for_different_input() {
        let a = CanonicalBytes::new(&json!({"x": 1})).unwrap();
        let b = CanonicalBytes::new(&json!({"x": 2})).unwrap();
        assert_ne!(sha256_digest(&a), sha256_digest(&b));
    }

    #[test]
    fn digest_hex_is_64_chars() {
        let c = CanonicalBytes::new(&json!({})).unwrap();
        let hex = sha256_digest(&c).to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_hex_roundtrip() {
        let c = CanonicalBytes::new(&json!({"k": "v"})).unwrap();
        let d = sha256_digest(&c);
        let back = ContentDigest::from_hex(&d.to_hex()).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn digest_from_hex_rejects_bad_length() {
        assert!(ContentDigest::from_hex("abcd").is_err());
    }

    #[test]
    fn digest_serde_is_hex_string() {
        let c = CanonicalBytes::new(&json!({"k": "v"})).unwrap();
        let d = sha256_digest(&c);
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"{}\"", d.to_hex()));
        let back: ContentDigest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn raw_bytes_digest_matches_wire_bytes() {
        let body = br#"{"amount":"10.00"}"#.to_vec();
        let d1 = sha256_digest(&CanonicalBytes::from_raw(body.clone()));
        let d2 = sha256_digest(&CanonicalBytes::from_raw(body));
        assert_eq!(d1, d2);
    }
}
