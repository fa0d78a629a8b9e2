//! Core domain types for the Neo N3 execution engine.
//!
//! This crate holds the types every other layer speaks: fixed-width hashes,
//! the hardfork table, protocol settings profiles, and the transaction
//! envelope with its signer scoping rules.

pub mod block;
pub mod hardfork;
pub mod protocol_settings;
pub mod signer;
pub mod transaction;
pub mod uint160;
pub mod uint256;
pub mod witness;
pub mod witness_rule;

pub use block::{Block, BlockHeader};
pub use hardfork::Hardfork;
pub use protocol_settings::ProtocolSettings;
pub use signer::Signer;
pub use transaction::{OracleResponseCode, Transaction, TransactionAttribute};
pub use uint160::UInt160;
pub use uint256::UInt256;
pub use witness::Witness;
pub use witness_rule::{WitnessCondition, WitnessRule, WitnessRuleAction, WitnessScope};

use thiserror::Error;

/// Errors raised by core type construction and envelope decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A byte slice had the wrong width for a fixed-size type.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// The encoded data violates an envelope rule.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Wire-level decode failure.
    #[error("io: {0}")]
    Io(#[from] neo_io::IoError),
}

impl CoreError {
    /// Creates a [`CoreError::InvalidFormat`].
    pub fn invalid_format<S: Into<String>>(message: S) -> Self {
        Self::InvalidFormat(message.into())
    }
}

/// Result alias for core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;
