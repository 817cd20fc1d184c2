//! Base64 transport encoding for audio payloads.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::{Error, ErrorContext, Result};

/// Decode a standard-alphabet, padded base64 payload into raw bytes.
///
/// Characters outside the alphabet and malformed padding are reported as
/// [`Error::Decode`]; nothing is silently truncated.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    STANDARD.decode(payload).map_err(|e| {
        Error::decode_with_context(
            format!("invalid base64 payload: {}", e),
            ErrorContext::new()
                .with_details(format!("payload length {}", payload.len()))
                .with_source("base64"),
        )
    })
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_arbitrary_bytes() {
        let original: Vec<u8> = (0..=255u8).chain([0, 0, 0xFF, 0x7F]).collect();
        let decoded = decode_base64(&encode_base64(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_known_payload() {
        assert_eq!(decode_base64("AAD/fw==").unwrap(), vec![0x00, 0x00, 0xFF, 0x7F]);
        assert!(decode_base64("").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_invalid_alphabet() {
        let err = decode_base64("AAD*fw==").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_rejects_bad_padding() {
        assert!(decode_base64("AAD/fw=").is_err());
        assert!(decode_base64("A").is_err());
    }
}
