//! Sequential little-endian reader for Neo wire data.

use crate::serializable::Serializable;
use crate::{IoError, IoResult};

/// A bounds-checked cursor over a byte slice, decoding Neo protocol data in
/// little-endian byte order.
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    /// Creates a reader over `data` starting at offset zero.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Returns the current read offset.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Returns true when every byte has been consumed.
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, count: usize) -> IoResult<&'a [u8]> {
        if self.remaining() < count {
            return Err(IoError::EndOfInput {
                needed: count,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(slice)
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> IoResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a boolean; any nonzero byte other than 0x01 is rejected.
    pub fn read_bool(&mut self) -> IoResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(IoError::invalid_format(format!(
                "invalid boolean byte {other:#04x}"
            ))),
        }
    }

    /// Reads a `u16` little-endian.
    pub fn read_u16(&mut self) -> IoResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a `u32` little-endian.
    pub fn read_u32(&mut self) -> IoResult<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a `u64` little-endian.
    pub fn read_u64(&mut self) -> IoResult<u64> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads an `i8`.
    pub fn read_i8(&mut self) -> IoResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Reads an `i16` little-endian.
    pub fn read_i16(&mut self) -> IoResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// Reads an `i32` little-endian.
    pub fn read_i32(&mut self) -> IoResult<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Reads an `i64` little-endian.
    pub fn read_i64(&mut self) -> IoResult<i64> {
        Ok(self.read_u64()? as i64)
    }

    /// Reads exactly `count` raw bytes.
    pub fn read_bytes(&mut self, count: usize) -> IoResult<Vec<u8>> {
        Ok(self.take(count)?.to_vec())
    }

    /// Reads a Neo var-int, rejecting values above `max`.
    pub fn read_var_int(&mut self, max: u64) -> IoResult<u64> {
        let prefix = self.read_u8()?;
        let value = match prefix {
            0xFD => u64::from(self.read_u16()?),
            0xFE => u64::from(self.read_u32()?),
            0xFF => self.read_u64()?,
            byte => u64::from(byte),
        };
        if value > max {
            return Err(IoError::LengthExceeded { length: value, max });
        }
        Ok(value)
    }

    /// Reads var-bytes with a maximum length bound.
    pub fn read_var_bytes(&mut self, max: usize) -> IoResult<Vec<u8>> {
        let length = self.read_var_int(max as u64)? as usize;
        self.read_bytes(length)
    }

    /// Reads a var-length UTF-8 string.
    pub fn read_var_string(&mut self, max: usize) -> IoResult<String> {
        let bytes = self.read_var_bytes(max)?;
        String::from_utf8(bytes)
            .map_err(|_| IoError::invalid_format("string is not valid UTF-8"))
    }

    /// Reads a serializable value.
    pub fn read_serializable<T: Serializable>(&mut self) -> IoResult<T> {
        T::deserialize(self)
    }

    /// Reads a var-int count then that many elements, bounded by `max`.
    pub fn read_serializable_list<T: Serializable>(&mut self, max: usize) -> IoResult<Vec<T>> {
        let count = self.read_var_int(max as u64)? as usize;
        let mut values = Vec::with_capacity(count.min(0x1000));
        for _ in 0..count {
            values.push(T::deserialize(self)?);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BinaryWriter;

    #[test]
    fn round_trip_integers() {
        let mut w = BinaryWriter::new();
        w.write_u32(0xDEAD_BEEF);
        w.write_i64(-42);
        let bytes = w.into_bytes();
        let mut r = BinaryReader::new(&bytes);
        assert_eq!(r.read_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.read_i64().unwrap(), -42);
        assert!(r.is_at_end());
    }

    #[test]
    fn var_int_bound_is_enforced() {
        let mut w = BinaryWriter::new();
        w.write_var_int(300);
        let bytes = w.into_bytes();
        let mut r = BinaryReader::new(&bytes);
        assert!(matches!(
            r.read_var_int(255),
            Err(IoError::LengthExceeded { length: 300, .. })
        ));
    }

    #[test]
    fn end_of_input_reports_need() {
        let mut r = BinaryReader::new(&[1, 2]);
        assert!(matches!(
            r.read_u32(),
            Err(IoError::EndOfInput {
                needed: 4,
                available: 2
            })
        ));
    }

    #[test]
    fn strict_boolean_bytes() {
        let mut r = BinaryReader::new(&[2]);
        assert!(r.read_bool().is_err());
    }
}
