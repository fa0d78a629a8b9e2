//! 160-bit hash (script hash / account identity).

use crate::{CoreError, CoreResult};
use neo_config::ADDRESS_VERSION;
use neo_cryptography::{base58_check_decode, base58_check_encode};
use neo_io::{BinaryReader, BinaryWriter, IoResult, Serializable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The length of a `UInt160` in bytes.
pub const UINT160_SIZE: usize = 20;

/// A 160-bit value stored little-endian, identifying a script or account.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UInt160([u8; UINT160_SIZE]);

impl UInt160 {
    /// The all-zero value.
    pub const ZERO: UInt160 = UInt160([0u8; UINT160_SIZE]);

    /// Returns the all-zero value.
    pub fn zero() -> Self {
        Self::ZERO
    }

    /// Returns true when every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; UINT160_SIZE]
    }

    /// Creates a value from exactly 20 bytes.
    pub fn from_bytes(value: &[u8]) -> CoreResult<Self> {
        let bytes: [u8; UINT160_SIZE] =
            value.try_into().map_err(|_| CoreError::InvalidLength {
                expected: UINT160_SIZE,
                actual: value.len(),
            })?;
        Ok(Self(bytes))
    }

    /// Returns the little-endian bytes.
    pub fn as_bytes(&self) -> &[u8; UINT160_SIZE] {
        &self.0
    }

    /// Returns the bytes as an owned vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Parses the `0x…` big-endian hex form used in manifests and JSON.
    pub fn from_hex(hex_str: &str) -> CoreResult<Self> {
        let trimmed = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let mut bytes = hex::decode(trimmed)
            .map_err(|e| CoreError::invalid_format(format!("hex: {e}")))?;
        bytes.reverse();
        Self::from_bytes(&bytes)
    }

    /// Encodes the N3 address (`AddressVersion ‖ hash`, Base58Check).
    pub fn to_address(&self) -> String {
        let mut payload = Vec::with_capacity(1 + UINT160_SIZE);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(&self.0);
        base58_check_encode(&payload)
    }

    /// Decodes an N3 address back into a script hash.
    pub fn from_address(address: &str) -> CoreResult<Self> {
        let payload = base58_check_decode(address)
            .map_err(|e| CoreError::invalid_format(e.to_string()))?;
        if payload.len() != 1 + UINT160_SIZE || payload[0] != ADDRESS_VERSION {
            return Err(CoreError::invalid_format("invalid address payload"));
        }
        Self::from_bytes(&payload[1..])
    }
}

impl Serializable for UInt160 {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_bytes(&self.0);
        Ok(())
    }

    fn deserialize(reader: &mut BinaryReader<'_>) -> IoResult<Self> {
        let bytes = reader.read_bytes(UINT160_SIZE)?;
        let mut value = [0u8; UINT160_SIZE];
        value.copy_from_slice(&bytes);
        Ok(Self(value))
    }
}

impl fmt::Debug for UInt160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UInt160({self})")
    }
}

impl fmt::Display for UInt160 {
    /// Big-endian `0x…` form, matching manifest and RPC conventions.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        write!(f, "0x{}", hex::encode(reversed))
    }
}

impl From<[u8; UINT160_SIZE]> for UInt160 {
    fn from(value: [u8; UINT160_SIZE]) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_enforces_width() {
        assert!(UInt160::from_bytes(&[0u8; 19]).is_err());
        assert!(UInt160::from_bytes(&[0u8; 20]).is_ok());
    }

    #[test]
    fn hex_round_trip_is_big_endian() {
        let mut bytes = [0u8; 20];
        bytes[0] = 0xAA;
        let value = UInt160::from(bytes);
        let hex_form = value.to_string();
        assert!(hex_form.ends_with("aa"));
        assert_eq!(UInt160::from_hex(&hex_form).unwrap(), value);
    }

    #[test]
    fn address_round_trip() {
        let value = UInt160::from([7u8; 20]);
        let address = value.to_address();
        assert!(address.starts_with('N'));
        assert_eq!(UInt160::from_address(&address).unwrap(), value);
    }
}
