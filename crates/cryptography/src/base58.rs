//! Base58 and Base58Check.

use crate::hash::hash256;
use crate::{CryptoError, CryptoResult};

/// Base58-encodes `data` with the Bitcoin alphabet.
pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

/// Decodes a Base58 string.
pub fn base58_decode(input: &str) -> CryptoResult<Vec<u8>> {
    bs58::decode(input)
        .into_vec()
        .map_err(|e| CryptoError::InvalidEncoding(format!("base58: {e}")))
}

/// Base58Check: payload ‖ first four bytes of double-SHA-256.
pub fn base58_check_encode(data: &[u8]) -> String {
    let checksum = hash256(data);
    let mut buffer = Vec::with_capacity(data.len() + 4);
    buffer.extend_from_slice(data);
    buffer.extend_from_slice(&checksum[..4]);
    base58_encode(&buffer)
}

/// Decodes Base58Check, verifying the checksum.
pub fn base58_check_decode(input: &str) -> CryptoResult<Vec<u8>> {
    let decoded = base58_decode(input)?;
    if decoded.len() < 4 {
        return Err(CryptoError::InvalidEncoding(
            "base58check payload too short".into(),
        ));
    }
    let (payload, checksum) = decoded.split_at(decoded.len() - 4);
    let expected = hash256(payload);
    if checksum != &expected[..4] {
        return Err(CryptoError::InvalidEncoding(
            "base58check checksum mismatch".into(),
        ));
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let data = b"Neo N3 reference engine";
        let encoded = base58_encode(data);
        assert_eq!(base58_decode(&encoded).unwrap(), data.to_vec());
    }

    #[test]
    fn check_round_trip_and_tamper() {
        let data = [0x17u8, 1, 2, 3, 4];
        let encoded = base58_check_encode(&data);
        assert_eq!(base58_check_decode(&encoded).unwrap(), data.to_vec());

        let mut tampered = encoded.into_bytes();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == b'1' { b'2' } else { b'1' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(base58_check_decode(&tampered).is_err());
    }
}
