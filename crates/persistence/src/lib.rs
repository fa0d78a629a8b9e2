//! Snapshot and in-memory store for the Neo N3 execution engine.
//!
//! Persisted state is a flat key-value map. The engine never touches a
//! store directly: it works through a [`DataCache`], an isolated view that
//! buffers writes until commit and can be layered for per-call rollback.

pub mod data_cache;
pub mod store;

pub use data_cache::DataCache;
pub use store::{MemoryStore, SeekDirection, Store};

use thiserror::Error;

/// Errors raised by the persistence layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// An `add` hit an existing key.
    #[error("key already exists")]
    KeyAlreadyExists,
}

/// Result alias for persistence operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
