//! Ed25519 signature verification.

use ed25519_dalek::{Signature, VerifyingKey};

/// Verifies a 64-byte Ed25519 signature with a 32-byte public key.
/// Malformed keys or signatures verify as false.
pub fn verify_ed25519(message: &[u8], public_key: &[u8], signature: &[u8]) -> bool {
    let Ok(key_bytes) = <&[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(sig_bytes) = <&[u8; 64]>::try_from(signature) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(key_bytes) else {
        return false;
    };
    key.verify_strict(message, &Signature::from_bytes(sig_bytes))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_lengths_are_false() {
        assert!(!verify_ed25519(b"m", &[0u8; 31], &[0u8; 64]));
        assert!(!verify_ed25519(b"m", &[0u8; 32], &[0u8; 63]));
    }

    #[test]
    fn zero_key_is_false() {
        // The all-zero key is not a valid curve point.
        assert!(!verify_ed25519(b"m", &[0u8; 32], &[0u8; 64]));
    }
}
