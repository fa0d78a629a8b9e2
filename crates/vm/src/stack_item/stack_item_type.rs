//! Stack item type tags.

use crate::error::{VmError, VmResult};

/// The wire-level type tag of a stack item, shared by ISTYPE/CONVERT
/// operands and the binary serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StackItemType {
    /// Null (the absence of a value).
    Any = 0x00,
    Pointer = 0x10,
    Boolean = 0x20,
    Integer = 0x21,
    ByteString = 0x28,
    Buffer = 0x30,
    Array = 0x40,
    Struct = 0x41,
    Map = 0x48,
    InteropInterface = 0x60,
}

impl StackItemType {
    /// Decodes a type byte.
    pub fn from_byte(byte: u8) -> VmResult<StackItemType> {
        match byte {
            0x00 => Ok(StackItemType::Any),
            0x10 => Ok(StackItemType::Pointer),
            0x20 => Ok(StackItemType::Boolean),
            0x21 => Ok(StackItemType::Integer),
            0x28 => Ok(StackItemType::ByteString),
            0x30 => Ok(StackItemType::Buffer),
            0x40 => Ok(StackItemType::Array),
            0x41 => Ok(StackItemType::Struct),
            0x48 => Ok(StackItemType::Map),
            0x60 => Ok(StackItemType::InteropInterface),
            other => Err(VmError::invalid_argument(format!(
                "undefined stack item type {other:#04x}"
            ))),
        }
    }

    /// Whether the type is a valid Map key (Boolean, Integer, ByteString).
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            StackItemType::Boolean | StackItemType::Integer | StackItemType::ByteString
        )
    }

    /// The display name used in errors and result projections.
    pub fn name(&self) -> &'static str {
        match self {
            StackItemType::Any => "Any",
            StackItemType::Pointer => "Pointer",
            StackItemType::Boolean => "Boolean",
            StackItemType::Integer => "Integer",
            StackItemType::ByteString => "ByteString",
            StackItemType::Buffer => "Buffer",
            StackItemType::Array => "Array",
            StackItemType::Struct => "Struct",
            StackItemType::Map => "Map",
            StackItemType::InteropInterface => "InteropInterface",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_round_trip() {
        for ty in [
            StackItemType::Any,
            StackItemType::Pointer,
            StackItemType::Boolean,
            StackItemType::Integer,
            StackItemType::ByteString,
            StackItemType::Buffer,
            StackItemType::Array,
            StackItemType::Struct,
            StackItemType::Map,
            StackItemType::InteropInterface,
        ] {
            assert_eq!(StackItemType::from_byte(ty as u8).unwrap(), ty);
        }
        assert!(StackItemType::from_byte(0x42).is_err());
    }

    #[test]
    fn primitives() {
        assert!(StackItemType::Integer.is_primitive());
        assert!(StackItemType::ByteString.is_primitive());
        assert!(!StackItemType::Array.is_primitive());
        assert!(!StackItemType::Any.is_primitive());
    }
}
