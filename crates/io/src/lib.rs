//! Binary serialization primitives for the Neo N3 wire formats.
//!
//! All multi-byte integers are little-endian. Variable-length integers use
//! the Neo var-int encoding: a prefix byte below 0xFD is the value itself,
//! 0xFD/0xFE/0xFF introduce a u16/u32/u64 payload.

pub mod binary_reader;
pub mod binary_writer;
pub mod serializable;

pub use binary_reader::BinaryReader;
pub use binary_writer::BinaryWriter;
pub use serializable::Serializable;

use thiserror::Error;

/// Errors raised while reading or writing wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    /// The reader ran past the end of its input.
    #[error("unexpected end of input: needed {needed} bytes, {available} available")]
    EndOfInput { needed: usize, available: usize },

    /// A length prefix exceeded the caller-supplied bound.
    #[error("length {length} exceeds maximum {max}")]
    LengthExceeded { length: u64, max: u64 },

    /// The encoded data violates a format rule.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

impl IoError {
    /// Creates an [`IoError::InvalidFormat`].
    pub fn invalid_format<S: Into<String>>(message: S) -> Self {
        Self::InvalidFormat(message.into())
    }
}

/// Result alias for I/O operations.
pub type IoResult<T> = std::result::Result<T, IoError>;
