//! BLS12-381 group operations.
//!
//! G1 points serialize to 48 compressed bytes, G2 to 96, Gt elements to
//! their 576-byte Fp12 encoding. The underlying field library keeps Gt
//! interiors opaque, so a Gt element carries its wire encoding when it was
//! produced by deserialization; serializing a freshly computed Gt is
//! rejected (the engine surfaces that as an invalid-operation fault).

use bls12_381::{G1Affine, G1Projective, G2Affine, G2Projective, Gt, Scalar};

use crate::{CryptoError, CryptoResult};

/// A point in one of the three BLS12-381 groups.
#[derive(Debug, Clone)]
pub enum BlsPoint {
    G1(G1Affine),
    G2(G2Affine),
    Gt { value: Gt, encoding: Option<Vec<u8>> },
}

impl BlsPoint {
    /// Deserializes a point; the group is chosen by encoded length.
    pub fn deserialize(data: &[u8]) -> CryptoResult<Self> {
        match data.len() {
            48 => {
                let mut bytes = [0u8; 48];
                bytes.copy_from_slice(data);
                let point = G1Affine::from_compressed(&bytes);
                if point.is_some().into() {
                    Ok(BlsPoint::G1(point.unwrap()))
                } else {
                    Err(CryptoError::InvalidEncoding("invalid G1 point".into()))
                }
            }
            96 => {
                let mut bytes = [0u8; 96];
                bytes.copy_from_slice(data);
                let point = G2Affine::from_compressed(&bytes);
                if point.is_some().into() {
                    Ok(BlsPoint::G2(point.unwrap()))
                } else {
                    Err(CryptoError::InvalidEncoding("invalid G2 point".into()))
                }
            }
            576 => Err(CryptoError::Unsupported(
                "Gt deserialization is not provided by the field backend".into(),
            )),
            other => Err(CryptoError::InvalidEncoding(format!(
                "invalid BLS12-381 point length {other}"
            ))),
        }
    }

    /// Serializes the point to its canonical encoding.
    pub fn serialize(&self) -> CryptoResult<Vec<u8>> {
        match self {
            BlsPoint::G1(point) => Ok(point.to_compressed().to_vec()),
            BlsPoint::G2(point) => Ok(point.to_compressed().to_vec()),
            BlsPoint::Gt { encoding, .. } => encoding.clone().ok_or_else(|| {
                CryptoError::Unsupported("computed Gt element has no canonical encoding".into())
            }),
        }
    }

    /// Group equality; mixing groups is a type mismatch.
    pub fn equals(&self, other: &BlsPoint) -> CryptoResult<bool> {
        match (self, other) {
            (BlsPoint::G1(a), BlsPoint::G1(b)) => Ok(a == b),
            (BlsPoint::G2(a), BlsPoint::G2(b)) => Ok(a == b),
            (BlsPoint::Gt { value: a, .. }, BlsPoint::Gt { value: b, .. }) => Ok(a == b),
            _ => Err(CryptoError::TypeMismatch),
        }
    }

    /// Group addition (Gt uses its own group law).
    pub fn add(&self, other: &BlsPoint) -> CryptoResult<BlsPoint> {
        match (self, other) {
            (BlsPoint::G1(a), BlsPoint::G1(b)) => {
                Ok(BlsPoint::G1((G1Projective::from(a) + b).into()))
            }
            (BlsPoint::G2(a), BlsPoint::G2(b)) => {
                Ok(BlsPoint::G2((G2Projective::from(a) + b).into()))
            }
            (BlsPoint::Gt { value: a, .. }, BlsPoint::Gt { value: b, .. }) => Ok(BlsPoint::Gt {
                value: a + b,
                encoding: None,
            }),
            _ => Err(CryptoError::TypeMismatch),
        }
    }

    /// Scalar multiplication. `scalar_le` is a 32-byte little-endian scalar;
    /// `negate` multiplies by the scalar's group negation.
    pub fn mul(&self, scalar_le: &[u8], negate: bool) -> CryptoResult<BlsPoint> {
        if scalar_le.len() != 32 {
            return Err(CryptoError::InvalidEncoding(
                "scalar must be 32 bytes".into(),
            ));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(scalar_le);
        let scalar = Scalar::from_bytes(&bytes);
        if scalar.is_none().into() {
            return Err(CryptoError::InvalidEncoding(
                "scalar is not canonical".into(),
            ));
        }
        let mut scalar = scalar.unwrap();
        if negate {
            scalar = -scalar;
        }
        match self {
            BlsPoint::G1(point) => Ok(BlsPoint::G1((G1Projective::from(point) * scalar).into())),
            BlsPoint::G2(point) => Ok(BlsPoint::G2((G2Projective::from(point) * scalar).into())),
            BlsPoint::Gt { value, .. } => Ok(BlsPoint::Gt {
                value: value * scalar,
                encoding: None,
            }),
        }
    }

    /// The bilinear pairing e(g1, g2).
    pub fn pairing(g1: &BlsPoint, g2: &BlsPoint) -> CryptoResult<BlsPoint> {
        match (g1, g2) {
            (BlsPoint::G1(a), BlsPoint::G2(b)) => Ok(BlsPoint::Gt {
                value: bls12_381::pairing(a, b),
                encoding: None,
            }),
            _ => Err(CryptoError::TypeMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn g1_generator_round_trips() {
        let bytes = G1Affine::generator().to_compressed();
        let point = BlsPoint::deserialize(&bytes).unwrap();
        assert_eq!(point.serialize().unwrap(), bytes.to_vec());
    }

    #[test]
    fn add_matches_double() {
        let g = BlsPoint::G1(G1Affine::generator());
        let doubled = g.add(&g).unwrap();
        let mut two = [0u8; 32];
        two[0] = 2;
        let scaled = g.mul(&two, false).unwrap();
        assert!(doubled.equals(&scaled).unwrap());
    }

    #[test]
    fn mixed_groups_are_type_mismatch() {
        let g1 = BlsPoint::G1(G1Affine::generator());
        let g2 = BlsPoint::G2(G2Affine::generator());
        assert!(matches!(g1.add(&g2), Err(CryptoError::TypeMismatch)));
        assert!(g1.equals(&g2).is_err());
    }

    #[test]
    fn pairing_is_bilinear_in_scalar() {
        let g1 = BlsPoint::G1(G1Affine::generator());
        let g2 = BlsPoint::G2(G2Affine::generator());
        let mut three = [0u8; 32];
        three[0] = 3;
        let lhs = BlsPoint::pairing(&g1.mul(&three, false).unwrap(), &g2).unwrap();
        let rhs = BlsPoint::pairing(&g1, &g2).unwrap().mul(&three, false).unwrap();
        assert!(lhs.equals(&rhs).unwrap());
    }

    #[test]
    fn bad_lengths_are_rejected() {
        assert!(BlsPoint::deserialize(&[0u8; 47]).is_err());
        assert!(BlsPoint::deserialize(&[0u8; 95]).is_err());
    }
}
