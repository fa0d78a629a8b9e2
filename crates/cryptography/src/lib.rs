//! Black-box cryptographic primitives consumed by the Neo N3 execution
//! engine.
//!
//! Every function here has a fixed input/output contract; the engine treats
//! them as oracles and never depends on their internals. Verification only:
//! no key generation or signing lives in this crate.

pub mod base58;
pub mod bls12_381_ops;
pub mod ecdsa;
pub mod ed25519;
pub mod hash;

pub use base58::{base58_check_decode, base58_check_encode, base58_decode, base58_encode};
pub use bls12_381_ops::BlsPoint;
pub use ecdsa::{named_curve_hash, recover_secp256k1, verify_ecdsa, EcCurve, HashKind};
pub use ed25519::verify_ed25519;
pub use hash::{hash160, hash256, keccak256, murmur32, ripemd160, sha256};

use thiserror::Error;

/// Errors from cryptographic primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A key, signature, or point has the wrong length or encoding.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Two points from different groups were combined.
    #[error("point type mismatch")]
    TypeMismatch,

    /// The requested operation is outside this primitive's contract.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

/// Result alias for cryptographic operations.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;
