// SPDX-License-Identifier: BUSL-1.1
//! Hex encoding helpers shared by key loading and signature transport.

use crate::error::SignerError;

/// Encode bytes as lowercase hex.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode a hex string into bytes.
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, SignerError> {
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    if hex.len() % 2 != 0 {
        return Err(SignerError::InvalidKey(format!(
            "odd hex length: {}",
            hex.len()
        )));
    }
    hex.as_bytes()
        .chunks(2)
        .map(|chunk| {
            let s = std::str::from_utf8(chunk)
                .map_err(|e| SignerError::InvalidKey(e.to_string()))?;
            u8::from_str_radix(s, 16).map_err(|e| SignerError::InvalidKey(e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let bytes = vec![0x00, 0xde, 0xad, 0xff];
        assert_eq!(hex_to_bytes(&bytes_to_hex(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn accepts_0x_prefix() {
        assert_eq!(hex_to_bytes("0xdead").unwrap(), vec![0xde, 0xad]);
    }

    #[test]
    fn rejects_odd_length() {
        assert!(hex_to_bytes("abc").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(hex_to_bytes("zz").is_err());
    }
}
