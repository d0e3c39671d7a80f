//! # Hex Encoding
//!
//! Lowercase hex is the text form of keys and signatures everywhere FairLens
//! crosses a process boundary: API bodies, CLI key files, operation
//! arguments.

use crate::error::CryptoError;

/// Render bytes as lowercase hex.
pub fn encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decode a hex string. Surrounding whitespace is ignored and case is not
/// significant.
pub fn decode(hex: &str) -> Result<Vec<u8>, CryptoError> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return Err(CryptoError::KeyError(format!(
            "hex string must have even length, got {}",
            hex.len()
        )));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| CryptoError::KeyError(format!("invalid hex at position {i}")))
        })
        .collect()
}

/// First four bytes as hex, for `Debug` output that must not show whole keys.
pub(crate) fn prefix(bytes: &[u8]) -> String {
    encode(&bytes[..bytes.len().min(4)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_valid() {
        assert_eq!(decode("deadBEEF").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(decode("  00ff\n").unwrap(), vec![0x00, 0xff]);
        assert_eq!(decode("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn decode_rejects_odd_length_and_garbage() {
        assert!(decode("abc").is_err());
        assert!(decode("zz").is_err());
        assert!(decode("é1").is_err());
    }

    #[test]
    fn encode_is_lowercase() {
        assert_eq!(encode(&[0xAB, 0x01]), "ab01");
    }
}
