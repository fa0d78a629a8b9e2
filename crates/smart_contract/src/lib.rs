//! Application engine, syscalls and native contracts for the Neo N3
//! execution engine.
//!
//! This crate layers the host semantics over the bare NeoVM: gas metering,
//! hardfork-gated syscall dispatch, inter-contract calls with snapshot
//! isolation, method tokens, deployed-contract state, and the eleven
//! protocol-defined native contracts.

pub mod application_engine;
pub mod binary_serializer;
pub mod contract_state;
pub mod interop_service;
pub mod json_serializer;
pub mod manifest;
pub mod native;
pub mod storage;
pub mod transition;
pub mod trigger;

pub use application_engine::{
    ApplicationEngine, ExecutionResult, NotificationEvent, ScriptContainer, StackItemProjection,
};
pub use contract_state::{ContractState, MethodToken, NefFile};
pub use manifest::ContractManifest;
pub use storage::{FindOptions, StorageContext, StorageItem, StorageKey};
pub use trigger::TriggerType;

use thiserror::Error;

/// Errors raised outside the VM step loop (deserialization, state layout).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContractError {
    /// Wire-level decode failure.
    #[error("io: {0}")]
    Io(#[from] neo_io::IoError),

    /// A manifest or NEF violates a structural rule.
    #[error("invalid contract: {0}")]
    InvalidContract(String),

    /// A VM error escaped into host-level plumbing.
    #[error("vm: {0}")]
    Vm(#[from] neo_vm::VmError),
}

/// Result alias for contract-layer operations.
pub type ContractResult<T> = std::result::Result<T, ContractError>;
