//! LedgerContract (-4): persisted blocks and transactions.

use super::{arg_bytes, arg_i64, arg_uint256, NativeContract, NativeMethod};
use crate::application_engine::EngineHost;
use crate::storage::StorageKey;
use neo_core::{Block, Transaction, UInt160, UInt256};
use neo_io::Serializable;
use neo_persistence::DataCache;
use neo_vm::{CallFlags, ExecutionEngine, StackItem, VMState, VmError, VmResult};

/// Contract id.
pub const ID: i32 = -4;

pub const PREFIX_BLOCK: u8 = 5;
pub const PREFIX_BLOCK_HASH: u8 = 9;
pub const PREFIX_TRANSACTION: u8 = 11;
pub const PREFIX_CURRENT_BLOCK: u8 = 12;

/// The LedgerContract hash.
pub fn hash() -> UInt160 {
    super::native_hash("LedgerContract")
}

fn block_hash_key(index: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(5);
    key.push(PREFIX_BLOCK_HASH);
    key.extend_from_slice(&index.to_le_bytes());
    key
}

fn block_key(hash: &UInt256) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(PREFIX_BLOCK);
    key.extend_from_slice(hash.as_bytes());
    key
}

fn transaction_key(hash: &UInt256) -> Vec<u8> {
    let mut key = Vec::with_capacity(33);
    key.push(PREFIX_TRANSACTION);
    key.extend_from_slice(hash.as_bytes());
    key
}

/// Persists a block and its index mapping (transition layer).
pub fn store_block(snapshot: &mut DataCache, block: &Block) {
    let hash = block.hash();
    let bytes = block.to_bytes().expect("block serialization cannot fail");
    snapshot.put(
        &StorageKey::new(ID, block_key(&hash)).to_bytes(),
        &bytes,
    );
    snapshot.put(
        &StorageKey::new(ID, block_hash_key(block.index())).to_bytes(),
        hash.as_bytes(),
    );
    let mut current = Vec::with_capacity(36);
    current.extend_from_slice(hash.as_bytes());
    current.extend_from_slice(&block.index().to_le_bytes());
    snapshot.put(
        &StorageKey::new(ID, vec![PREFIX_CURRENT_BLOCK]).to_bytes(),
        &current,
    );
}

/// Persists a transaction with its execution outcome (transition layer).
pub fn store_transaction(
    snapshot: &mut DataCache,
    transaction: &Transaction,
    block_index: u32,
    state: VMState,
) {
    let mut value = Vec::new();
    value.extend_from_slice(&block_index.to_le_bytes());
    value.push(match state {
        VMState::HALT => 1,
        VMState::FAULT => 2,
        _ => 0,
    });
    value.extend_from_slice(
        &transaction
            .to_bytes()
            .expect("transaction serialization cannot fail"),
    );
    snapshot.put(
        &StorageKey::new(ID, transaction_key(&transaction.hash())).to_bytes(),
        &value,
    );
}

fn read_transaction_record(
    host: &EngineHost,
    hash: &UInt256,
) -> VmResult<Option<(u32, u8, Transaction)>> {
    let Some(value) = host.storage_get(ID, &transaction_key(hash))? else {
        return Ok(None);
    };
    if value.len() < 5 {
        return Ok(None);
    }
    let block_index = u32::from_le_bytes([value[0], value[1], value[2], value[3]]);
    let state = value[4];
    let transaction = Transaction::from_bytes(&value[5..])
        .map_err(|e| VmError::invalid_operation(format!("stored transaction: {e}")))?;
    Ok(Some((block_index, state, transaction)))
}

fn read_block(host: &EngineHost, hash: &UInt256) -> VmResult<Option<Block>> {
    let Some(value) = host.storage_get(ID, &block_key(hash))? else {
        return Ok(None);
    };
    Block::from_bytes(&value)
        .map(Some)
        .map_err(|e| VmError::invalid_operation(format!("stored block: {e}")))
}

fn resolve_block_hash(host: &EngineHost, index_or_hash: &[u8]) -> VmResult<Option<UInt256>> {
    if index_or_hash.len() == 32 {
        return Ok(Some(
            UInt256::from_bytes(index_or_hash)
                .map_err(|e| VmError::invalid_argument(e.to_string()))?,
        ));
    }
    if index_or_hash.len() <= 4 {
        let mut buffer = [0u8; 4];
        buffer[..index_or_hash.len()].copy_from_slice(index_or_hash);
        let index = u32::from_le_bytes(buffer);
        return Ok(host
            .storage_get(ID, &block_hash_key(index))?
            .and_then(|bytes| UInt256::from_bytes(&bytes).ok()));
    }
    Err(VmError::invalid_argument(
        "block id must be an index or a 32-byte hash".to_string(),
    ))
}

fn project_transaction(transaction: &Transaction) -> StackItem {
    StackItem::from_struct(vec![
        StackItem::from_byte_string(transaction.hash().to_vec()),
        StackItem::from_int(i64::from(transaction.version)),
        StackItem::from_int(i64::from(transaction.nonce)),
        StackItem::from_byte_string(transaction.sender().to_vec()),
        StackItem::from_int(transaction.system_fee),
        StackItem::from_int(transaction.network_fee),
        StackItem::from_int(i64::from(transaction.valid_until_block)),
        StackItem::from_byte_string(transaction.script.clone()),
    ])
}

fn project_block(block: &Block) -> StackItem {
    let header = &block.header;
    StackItem::from_struct(vec![
        StackItem::from_byte_string(block.hash().to_vec()),
        StackItem::from_int(i64::from(header.version)),
        StackItem::from_byte_string(header.prev_hash.to_vec()),
        StackItem::from_byte_string(header.merkle_root.to_vec()),
        StackItem::from_int(header.timestamp as i64),
        StackItem::from_int(header.nonce as i64),
        StackItem::from_int(i64::from(header.index)),
        StackItem::from_int(i64::from(header.primary_index)),
        StackItem::from_byte_string(header.next_consensus.to_vec()),
        StackItem::from_int(block.transactions.len() as i64),
    ])
}

// Handlers.

fn current_hash(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let value = host.storage_get(ID, &[PREFIX_CURRENT_BLOCK])?;
    let hash = value
        .filter(|v| v.len() >= 32)
        .map(|v| v[..32].to_vec())
        .unwrap_or_else(|| vec![0u8; 32]);
    Ok(Some(StackItem::from_byte_string(hash)))
}

fn current_index(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let value = host.storage_get(ID, &[PREFIX_CURRENT_BLOCK])?;
    let index = value
        .filter(|v| v.len() >= 36)
        .map(|v| u32::from_le_bytes([v[32], v[33], v[34], v[35]]))
        .unwrap_or(0);
    Ok(Some(StackItem::from_int(i64::from(index))))
}

fn get_block(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let index_or_hash = arg_bytes(&args, 0)?;
    let Some(hash) = resolve_block_hash(host, &index_or_hash)? else {
        return Ok(Some(StackItem::Null));
    };
    match read_block(host, &hash)? {
        Some(block) => Ok(Some(project_block(&block))),
        None => Ok(Some(StackItem::Null)),
    }
}

fn get_transaction(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let hash = arg_uint256(&args, 0)?;
    match read_transaction_record(host, &hash)? {
        Some((_, _, transaction)) => Ok(Some(project_transaction(&transaction))),
        None => Ok(Some(StackItem::Null)),
    }
}

fn get_transaction_height(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let hash = arg_uint256(&args, 0)?;
    match read_transaction_record(host, &hash)? {
        Some((height, _, _)) => Ok(Some(StackItem::from_int(i64::from(height)))),
        None => Ok(Some(StackItem::from_int(-1))),
    }
}

fn get_transaction_from_block(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let index_or_hash = arg_bytes(&args, 0)?;
    let tx_index = arg_i64(&args, 1)?;
    if tx_index < 0 {
        return Err(VmError::out_of_range("negative transaction index"));
    }
    let Some(hash) = resolve_block_hash(host, &index_or_hash)? else {
        return Ok(Some(StackItem::Null));
    };
    let Some(block) = read_block(host, &hash)? else {
        return Ok(Some(StackItem::Null));
    };
    let transaction = block.transactions.get(tx_index as usize).ok_or_else(|| {
        VmError::out_of_range(format!(
            "transaction index {tx_index} out of range {}",
            block.transactions.len()
        ))
    })?;
    Ok(Some(project_transaction(transaction)))
}

fn get_transaction_signers(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let hash = arg_uint256(&args, 0)?;
    match read_transaction_record(host, &hash)? {
        None => Ok(Some(StackItem::Null)),
        Some((_, _, transaction)) => {
            let signers: Vec<StackItem> = transaction
                .signers
                .iter()
                .map(|signer| {
                    StackItem::from_struct(vec![
                        StackItem::from_byte_string(signer.account.to_vec()),
                        StackItem::from_int(i64::from(signer.scopes.bits())),
                    ])
                })
                .collect();
            Ok(Some(StackItem::from_array(signers)))
        }
    }
}

fn get_transaction_vm_state(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let hash = arg_uint256(&args, 0)?;
    match read_transaction_record(host, &hash)? {
        None => Ok(Some(StackItem::from_int(0))),
        Some((_, state, _)) => Ok(Some(StackItem::from_int(i64::from(state)))),
    }
}

const NO_PARAMS: &[(&str, &str)] = &[];

macro_rules! ledger_method {
    ($name:literal, $params:literal, $defs:expr, $ret:literal, $handler:path) => {
        NativeMethod {
            name: $name,
            parameters: $params,
            parameter_defs: $defs,
            return_type: $ret,
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: $handler,
        }
    };
}

/// Builds the LedgerContract table.
pub fn contract() -> NativeContract {
    let methods = vec![
        ledger_method!("currentHash", 0, NO_PARAMS, "Hash256", current_hash),
        ledger_method!("currentIndex", 0, NO_PARAMS, "Integer", current_index),
        ledger_method!(
            "getBlock",
            1,
            &[("indexOrHash", "ByteArray")],
            "Array",
            get_block
        ),
        ledger_method!(
            "getTransaction",
            1,
            &[("hash", "Hash256")],
            "Array",
            get_transaction
        ),
        ledger_method!(
            "getTransactionFromBlock",
            2,
            &[("blockIndexOrHash", "ByteArray"), ("txIndex", "Integer")],
            "Array",
            get_transaction_from_block
        ),
        ledger_method!(
            "getTransactionHeight",
            1,
            &[("hash", "Hash256")],
            "Integer",
            get_transaction_height
        ),
        ledger_method!(
            "getTransactionSigners",
            1,
            &[("hash", "Hash256")],
            "Array",
            get_transaction_signers
        ),
        ledger_method!(
            "getTransactionVMState",
            1,
            &[("hash", "Hash256")],
            "Integer",
            get_transaction_vm_state
        ),
    ];

    NativeContract {
        id: ID,
        name: "LedgerContract",
        hash: hash(),
        active_in: None,
        supported_standards: &[],
        methods,
        events: Vec::new(),
        on_persist: None,
        post_persist: None,
    }
}
