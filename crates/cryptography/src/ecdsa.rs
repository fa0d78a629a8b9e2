//! ECDSA verification over secp256r1 and secp256k1.

use crate::{hash::keccak256, hash::sha256, CryptoError, CryptoResult};

/// The two curves the protocol verifies against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    /// NIST P-256.
    Secp256r1,
    /// The Bitcoin/Ethereum curve.
    Secp256k1,
}

/// The message digest applied before verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    Sha256,
    Keccak256,
}

fn digest(message: &[u8], hasher: HashKind) -> [u8; 32] {
    match hasher {
        HashKind::Sha256 => sha256(message),
        HashKind::Keccak256 => keccak256(message),
    }
}

/// Verifies a 64-byte `r ‖ s` signature over `message` with a 33-byte
/// compressed (or 65-byte uncompressed) public key.
///
/// Malformed keys or signatures verify as false rather than erroring: the
/// VM surface treats them as failed checks, not faults.
pub fn verify_ecdsa(
    message: &[u8],
    public_key: &[u8],
    signature: &[u8],
    curve: EcCurve,
    hasher: HashKind,
) -> bool {
    if signature.len() != 64 {
        return false;
    }
    let hashed = digest(message, hasher);
    match curve {
        EcCurve::Secp256r1 => {
            use p256::ecdsa::signature::hazmat::PrehashVerifier;
            use p256::ecdsa::{Signature, VerifyingKey};
            let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
                return false;
            };
            let Ok(sig) = Signature::from_slice(signature) else {
                return false;
            };
            key.verify_prehash(&hashed, &sig).is_ok()
        }
        EcCurve::Secp256k1 => {
            use k256::ecdsa::signature::hazmat::PrehashVerifier;
            use k256::ecdsa::{Signature, VerifyingKey};
            let Ok(key) = VerifyingKey::from_sec1_bytes(public_key) else {
                return false;
            };
            let Ok(sig) = Signature::from_slice(signature) else {
                return false;
            };
            key.verify_prehash(&hashed, &sig).is_ok()
        }
    }
}

/// Recovers a compressed secp256k1 public key from a 32-byte message hash
/// and a 65-byte `r ‖ s ‖ v` (or 64-byte compact with embedded parity)
/// signature. Returns `None` when recovery fails.
pub fn recover_secp256k1(message_hash: &[u8], signature: &[u8]) -> Option<Vec<u8>> {
    use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

    if message_hash.len() != 32 {
        return None;
    }
    let (sig_bytes, recovery) = match signature.len() {
        65 => {
            let v = signature[64];
            let id = match v {
                0..=3 => v,
                27..=30 => v - 27,
                _ => return None,
            };
            (&signature[..64], RecoveryId::try_from(id).ok()?)
        }
        _ => return None,
    };
    let sig = Signature::from_slice(sig_bytes).ok()?;
    let key = VerifyingKey::recover_from_prehash(message_hash, &sig, recovery).ok()?;
    Some(key.to_encoded_point(true).as_bytes().to_vec())
}

/// Maps the protocol's named curve+hash selector to its parts.
pub fn named_curve_hash(selector: i64) -> CryptoResult<(EcCurve, HashKind)> {
    match selector {
        22 => Ok((EcCurve::Secp256k1, HashKind::Sha256)),
        23 => Ok((EcCurve::Secp256r1, HashKind::Sha256)),
        24 => Ok((EcCurve::Secp256k1, HashKind::Keccak256)),
        25 => Ok((EcCurve::Secp256r1, HashKind::Keccak256)),
        other => Err(CryptoError::InvalidEncoding(format!(
            "unknown curve/hash selector {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_inputs_verify_false() {
        assert!(!verify_ecdsa(
            b"msg",
            &[0u8; 33],
            &[0u8; 64],
            EcCurve::Secp256r1,
            HashKind::Sha256
        ));
        assert!(!verify_ecdsa(
            b"msg",
            &[2u8; 33],
            &[0u8; 10],
            EcCurve::Secp256k1,
            HashKind::Sha256
        ));
    }

    #[test]
    fn selector_mapping() {
        assert_eq!(
            named_curve_hash(23).unwrap(),
            (EcCurve::Secp256r1, HashKind::Sha256)
        );
        assert_eq!(
            named_curve_hash(24).unwrap(),
            (EcCurve::Secp256k1, HashKind::Keccak256)
        );
        assert!(named_curve_hash(99).is_err());
    }

    #[test]
    fn recovery_rejects_bad_lengths() {
        assert!(recover_secp256k1(&[0u8; 31], &[0u8; 65]).is_none());
        assert!(recover_secp256k1(&[0u8; 32], &[0u8; 64]).is_none());
    }
}
