//! Hex helpers for the wire transcript and for test frame construction.

use thiserror::Error;

/// Errors that can occur while decoding hex strings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    #[error("empty hex string")]
    EmptyString,

    #[error("odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("hex decoding error: {0}")]
    Decode(String),
}

/// Encode bytes to a lowercase hex string.
pub fn encode_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Format bytes as `04 6b 25 ...` for the wire transcript.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode a hex string, ignoring embedded whitespace.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }
    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }
    hex::decode(&cleaned).map_err(|e| HexError::Decode(e.to_string()))
}

/// Test helper: decode hex or panic.
pub fn hex_to_bytes(hex_str: &str) -> Vec<u8> {
    decode_hex(hex_str).expect("invalid hex in test data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let data = vec![0x04, 0x6B, 0x25, 0x21];
        assert_eq!(decode_hex(&encode_hex(&data)).unwrap(), data);
    }

    #[test]
    fn compact_format() {
        assert_eq!(format_hex_compact(&[0x04, 0xC0, 0x02]), "04 c0 02");
    }

    #[test]
    fn decode_with_whitespace() {
        assert_eq!(decode_hex("04 6b 25").unwrap(), vec![0x04, 0x6B, 0x25]);
    }

    #[test]
    fn decode_errors() {
        assert!(decode_hex("").is_err());
        assert!(decode_hex("046").is_err());
        assert!(decode_hex("zz").is_err());
    }
}
