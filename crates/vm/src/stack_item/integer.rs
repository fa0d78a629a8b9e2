//! Integer encoding and the 32-byte magnitude cap.

use crate::error::{VmError, VmResult};
use num_bigint::BigInt;
use num_traits::Zero;

/// Maximum byte length of the minimal two's-complement encoding.
pub const MAX_INTEGER_SIZE: usize = 32;

/// Minimal two's-complement little-endian encoding; empty for zero.
pub fn to_bytes_le(value: &BigInt) -> Vec<u8> {
    if value.is_zero() {
        return Vec::new();
    }
    value.to_signed_bytes_le()
}

/// Inverse of [`to_bytes_le`]; sign-extends from the final byte.
pub fn from_bytes_le(bytes: &[u8]) -> BigInt {
    if bytes.is_empty() {
        return BigInt::zero();
    }
    BigInt::from_signed_bytes_le(bytes)
}

/// Fails with `Overflow` when the minimal encoding of `value` would exceed
/// [`MAX_INTEGER_SIZE`] bytes. Applied after every arithmetic step.
pub fn check(value: &BigInt, operation: &'static str) -> VmResult<()> {
    let bits = value.bits();
    let fits = if value.sign() == num_bigint::Sign::Minus {
        // Negative values reach down to -2^255 inclusive.
        bits < 256 || (bits == 256 && value.trailing_zeros() == Some(255))
    } else {
        bits <= 255
    };
    if fits {
        Ok(())
    } else {
        Err(VmError::Overflow { operation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::One;

    #[test]
    fn zero_is_empty() {
        assert!(to_bytes_le(&BigInt::zero()).is_empty());
        assert_eq!(from_bytes_le(&[]), BigInt::zero());
    }

    #[test]
    fn minimal_encodings() {
        assert_eq!(to_bytes_le(&BigInt::from(127)), vec![0x7F]);
        assert_eq!(to_bytes_le(&BigInt::from(128)), vec![0x80, 0x00]);
        assert_eq!(to_bytes_le(&BigInt::from(-1)), vec![0xFF]);
        assert_eq!(to_bytes_le(&BigInt::from(-128)), vec![0x80]);
        assert_eq!(to_bytes_le(&BigInt::from(-129)), vec![0x7F, 0xFF]);
    }

    #[test]
    fn sign_extension_on_decode() {
        assert_eq!(from_bytes_le(&[0xFF]), BigInt::from(-1));
        assert_eq!(from_bytes_le(&[0xFF, 0x00]), BigInt::from(255));
    }

    #[test]
    fn cap_boundaries() {
        let max = (BigInt::one() << 255u32) - 1;
        let min = -(BigInt::one() << 255u32);
        assert!(check(&max, "test").is_ok());
        assert!(check(&min, "test").is_ok());
        assert!(check(&(max + 1), "test").is_err());
        assert!(check(&(min - 1), "test").is_err());
        assert_eq!(to_bytes_le(&(-(BigInt::one() << 255u32))).len(), 32);
    }

    #[test]
    fn round_trip_random_widths() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let len = rng.gen_range(0..=32);
            let mut bytes = vec![0u8; len];
            rng.fill(&mut bytes[..]);
            let value = from_bytes_le(&bytes);
            let reencoded = to_bytes_le(&value);
            // Minimality: re-encoding then decoding is the identity.
            assert_eq!(from_bytes_le(&reencoded), value);
            assert!(reencoded.len() <= bytes.len());
        }
    }
}
