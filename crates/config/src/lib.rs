//! Protocol constants and network profiles for the Neo N3 execution engine.
//!
//! Everything in this crate is fixed protocol data: sizes, limits and the
//! magic numbers that identify the public networks. Runtime-tunable policy
//! values (fees, storage price) live in the Policy native contract instead.

pub mod network;

pub use network::NetworkType;

/// Size of a 256-bit hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Size of a 160-bit script hash (address) in bytes.
pub const ADDRESS_SIZE: usize = 20;

/// Size of a compressed elliptic-curve point in bytes.
pub const EC_POINT_SIZE: usize = 33;

/// Address version byte shared by all Neo N3 networks.
pub const ADDRESS_VERSION: u8 = 0x35;

/// Maximum size of a serialized transaction envelope.
pub const MAX_TRANSACTION_SIZE: usize = 102_400;

/// Maximum number of transactions in one block.
pub const MAX_TRANSACTIONS_PER_BLOCK: u32 = 512;

/// Maximum number of signers (and of witnesses) per transaction.
pub const MAX_TRANSACTION_SIGNERS: usize = 16;

/// Maximum number of attributes per transaction.
pub const MAX_TRANSACTION_ATTRIBUTES: usize = 16;

/// Maximum entries in a signer's allowed-contracts / allowed-groups list.
pub const MAX_SUBITEMS: usize = 16;

/// Maximum nesting depth of a witness condition tree.
pub const MAX_NESTING_DEPTH: usize = 2;

/// Default milliseconds between blocks.
pub const MILLISECONDS_PER_BLOCK: u32 = 15_000;

/// Default upper bound on `valid_until_block - current_height`.
pub const MAX_VALID_UNTIL_BLOCK_INCREMENT: u32 = 5_760;

/// Default number of blocks a transaction stays traceable.
pub const MAX_TRACEABLE_BLOCKS: u32 = 2_102_400;

/// Number of consensus validators.
pub const VALIDATORS_COUNT: usize = 7;

/// Number of committee members.
pub const COMMITTEE_MEMBERS_COUNT: usize = 21;

/// Total NEO supply, indivisible units.
pub const NEO_TOTAL_SUPPLY: u64 = 100_000_000;

/// GAS decimals.
pub const GAS_DECIMALS: u32 = 8;

/// One GAS expressed in datoshi (1 datoshi = 1e-8 GAS).
pub const GAS_FACTOR: i64 = 100_000_000;

/// GAS distributed at genesis, in datoshi.
pub const INITIAL_GAS_DISTRIBUTION: i64 = 52_000_000 * GAS_FACTOR;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_limits_are_protocol_values() {
        assert_eq!(MAX_TRANSACTION_SIZE, 102_400);
        assert_eq!(MAX_TRANSACTION_SIGNERS, 16);
        assert_eq!(MAX_VALID_UNTIL_BLOCK_INCREMENT, 5_760);
    }

    #[test]
    fn gas_units() {
        assert_eq!(GAS_FACTOR, 100_000_000);
        assert_eq!(INITIAL_GAS_DISTRIBUTION / GAS_FACTOR, 52_000_000);
    }
}
