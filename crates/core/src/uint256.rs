//! 256-bit hash (transaction / block identity).

use crate::{CoreError, CoreResult};
use neo_io::{BinaryReader, BinaryWriter, IoResult, Serializable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The length of a `UInt256` in bytes.
pub const UINT256_SIZE: usize = 32;

/// A 256-bit value stored little-endian.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UInt256([u8; UINT256_SIZE]);

impl UInt256 {
    /// The all-zero value.
    pub const ZERO: UInt256 = UInt256([0u8; UINT256_SIZE]);

    /// Returns the all-zero value.
    pub fn zero() -> Self {
        Self::ZERO
    }

    /// Returns true when every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; UINT256_SIZE]
    }

    /// Creates a value from exactly 32 bytes.
    pub fn from_bytes(value: &[u8]) -> CoreResult<Self> {
        let bytes: [u8; UINT256_SIZE] =
            value.try_into().map_err(|_| CoreError::InvalidLength {
                expected: UINT256_SIZE,
                actual: value.len(),
            })?;
        Ok(Self(bytes))
    }

    /// Returns the little-endian bytes.
    pub fn as_bytes(&self) -> &[u8; UINT256_SIZE] {
        &self.0
    }

    /// Returns the bytes as an owned vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Parses the `0x…` big-endian hex form.
    pub fn from_hex(hex_str: &str) -> CoreResult<Self> {
        let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let mut bytes = hex::decode(trimmed)
            .map_err(|e| CoreError::invalid_format(format!("hex: {e}")))?;
        bytes.reverse();
        Self::from_bytes(&bytes)
    }
}

impl Serializable for UInt256 {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_bytes(&self.0);
        Ok(())
    }

    fn deserialize(reader: &mut BinaryReader<'_>) -> IoResult<Self> {
        let bytes = reader.read_bytes(UINT256_SIZE)?;
        let mut value = [0u8; UINT256_SIZE];
        value.copy_from_slice(&bytes);
        Ok(Self(value))
    }
}

impl fmt::Debug for UInt256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UInt256({self})")
    }
}

impl fmt::Display for UInt256 {
    /// Big-endian `0x…` form, matching RPC conventions.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        write!(f, "0x{}", hex::encode(reversed))
    }
}

impl From<[u8; UINT256_SIZE]> for UInt256 {
    fn from(value: [u8; UINT256_SIZE]) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_is_enforced() {
        assert!(UInt256::from_bytes(&[0u8; 31]).is_err());
        assert!(UInt256::from_bytes(&[0u8; 32]).is_ok());
    }

    #[test]
    fn hex_round_trip() {
        let mut bytes = [0u8; 32];
        bytes[31] = 0x01;
        let value = UInt256::from(bytes);
        assert!(value.to_string().starts_with("0x01"));
        assert_eq!(UInt256::from_hex(&value.to_string()).unwrap(), value);
    }
}
