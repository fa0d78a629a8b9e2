//! Wire serialization trait.

use crate::{BinaryReader, BinaryWriter, IoResult};

/// A value with a canonical Neo wire encoding.
pub trait Serializable: Sized {
    /// Writes the canonical encoding of `self`.
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()>;

    /// Reads a value from its canonical encoding.
    fn deserialize(reader: &mut BinaryReader<'_>) -> IoResult<Self>;

    /// Serializes to a fresh byte vector.
    fn to_bytes(&self) -> IoResult<Vec<u8>> {
        let mut writer = BinaryWriter::new();
        self.serialize(&mut writer)?;
        Ok(writer.into_bytes())
    }

    /// Deserializes from a byte slice, requiring full consumption.
    fn from_bytes(data: &[u8]) -> IoResult<Self> {
        let mut reader = BinaryReader::new(data);
        let value = Self::deserialize(&mut reader)?;
        if !reader.is_at_end() {
            return Err(crate::IoError::invalid_format(format!(
                "{} trailing bytes after deserialization",
                reader.remaining()
            )));
        }
        Ok(value)
    }
}
