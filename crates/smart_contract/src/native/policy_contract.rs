//! PolicyContract (-7): committee-governed network parameters.

use super::{
    arg_i64, arg_string, arg_uint160, registry, require_committee, NativeContract, NativeMethod,
};
use crate::application_engine::EngineHost;
use crate::storage::{StorageItem, StorageKey};
use neo_core::Hardfork;
use neo_persistence::DataCache;
use neo_vm::{CallFlags, ExecutionEngine, StackItem, VmError, VmResult};
use num_bigint::BigInt;

/// Contract id.
pub const ID: i32 = -7;

pub const PREFIX_FEE_PER_BYTE: u8 = 10;
pub const PREFIX_BLOCKED_ACCOUNT: u8 = 15;
pub const PREFIX_EXEC_FEE_FACTOR: u8 = 18;
pub const PREFIX_STORAGE_PRICE: u8 = 19;
pub const PREFIX_ATTRIBUTE_FEE: u8 = 20;
pub const PREFIX_WHITELIST_FEE: u8 = 0x16;
pub const PREFIX_MILLISECONDS_PER_BLOCK: u8 = 23;
pub const PREFIX_MAX_VALID_UNTIL_INCREMENT: u8 = 24;
pub const PREFIX_MAX_TRACEABLE_BLOCKS: u8 = 25;

pub const DEFAULT_FEE_PER_BYTE: i64 = 1_000;
pub const DEFAULT_EXEC_FEE_FACTOR: i64 = 30;
pub const DEFAULT_STORAGE_PRICE: i64 = 100_000;
pub const DEFAULT_ATTRIBUTE_FEE: i64 = 0;

pub const MAX_FEE_PER_BYTE: i64 = 100_000_000;
pub const MAX_EXEC_FEE_FACTOR: i64 = 100;
pub const MAX_STORAGE_PRICE: i64 = 10_000_000;
pub const MAX_ATTRIBUTE_FEE: i64 = 1_000_000_000;

fn read_i64(snapshot: &DataCache, prefix: u8) -> Option<i64> {
    use num_traits::ToPrimitive;
    let key = StorageKey::with_prefix(ID, prefix, &[]).to_bytes();
    snapshot
        .get(&key)
        .map(|value| StorageItem::new(value).as_int())
        .and_then(|v| v.to_i64())
}

/// The live execution fee factor, read directly off a snapshot.
pub fn exec_fee_factor_of(snapshot: &DataCache) -> Option<i64> {
    read_i64(snapshot, PREFIX_EXEC_FEE_FACTOR)
}

/// The live storage price, read directly off a snapshot.
pub fn storage_price_of(snapshot: &DataCache) -> Option<i64> {
    read_i64(snapshot, PREFIX_STORAGE_PRICE)
}

fn get_setting(host: &EngineHost, prefix: u8, default: i64) -> VmResult<i64> {
    Ok(read_i64(host.snapshot()?, prefix).unwrap_or(default))
}

fn put_setting(host: &mut EngineHost, prefix: u8, value: i64) -> VmResult<()> {
    let item = StorageItem::from_int(&BigInt::from(value));
    host.storage_put(ID, &[prefix], &item.value)
}

fn set_setting(
    host: &mut EngineHost,
    prefix: u8,
    value: i64,
    min: i64,
    max: i64,
    what: &str,
) -> VmResult<()> {
    if value < min || value > max {
        return Err(VmError::invalid_argument(format!(
            "{what} must be within [{min}, {max}], got {value}"
        )));
    }
    require_committee(host)?;
    put_setting(host, prefix, value)
}

fn blocked_key(account: &neo_core::UInt160) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(PREFIX_BLOCKED_ACCOUNT);
    key.extend_from_slice(account.as_bytes());
    key
}

/// Whether an account is on the block list.
pub fn is_blocked(host: &EngineHost, account: &neo_core::UInt160) -> VmResult<bool> {
    Ok(host.storage_get(ID, &blocked_key(account))?.is_some())
}

/// The block height at which an account was blocked, if any.
pub fn blocked_since(host: &EngineHost, account: &neo_core::UInt160) -> VmResult<Option<u32>> {
    Ok(host
        .storage_get(ID, &blocked_key(account))?
        .filter(|value| value.len() >= 4)
        .map(|value| u32::from_le_bytes([value[0], value[1], value[2], value[3]])))
}

/// The whitelist fee for a (contract, ABI offset) pair, if set.
pub fn whitelist_fee(
    host: &EngineHost,
    contract: &neo_core::UInt160,
    method_offset: u32,
) -> VmResult<Option<i64>> {
    use num_traits::ToPrimitive;
    Ok(host
        .storage_get(ID, &whitelist_suffix(contract, method_offset))?
        .map(|value| StorageItem::new(value).as_int())
        .and_then(|v| v.to_i64()))
}

// Method handlers. Handlers receive marshalled arguments in ABI order.

fn get_fee_per_byte(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_int(get_setting(
        host,
        PREFIX_FEE_PER_BYTE,
        DEFAULT_FEE_PER_BYTE,
    )?)))
}

fn set_fee_per_byte(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let value = arg_i64(&args, 0)?;
    set_setting(host, PREFIX_FEE_PER_BYTE, value, 0, MAX_FEE_PER_BYTE, "FeePerByte")?;
    Ok(None)
}

fn get_exec_fee_factor(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_int(get_setting(
        host,
        PREFIX_EXEC_FEE_FACTOR,
        DEFAULT_EXEC_FEE_FACTOR,
    )?)))
}

fn set_exec_fee_factor(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let value = arg_i64(&args, 0)?;
    set_setting(
        host,
        PREFIX_EXEC_FEE_FACTOR,
        value,
        1,
        MAX_EXEC_FEE_FACTOR,
        "ExecFeeFactor",
    )?;
    host.exec_fee_factor = value;
    Ok(None)
}

fn get_storage_price(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_int(get_setting(
        host,
        PREFIX_STORAGE_PRICE,
        DEFAULT_STORAGE_PRICE,
    )?)))
}

fn set_storage_price(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let value = arg_i64(&args, 0)?;
    set_setting(
        host,
        PREFIX_STORAGE_PRICE,
        value,
        1,
        MAX_STORAGE_PRICE,
        "StoragePrice",
    )?;
    host.storage_price = value;
    Ok(None)
}

fn get_attribute_fee(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let attribute_type = arg_i64(&args, 0)?;
    let key = [PREFIX_ATTRIBUTE_FEE, attribute_type as u8];
    let fee = host
        .storage_get(ID, &key)?
        .map(|value| StorageItem::new(value).as_int())
        .and_then(|v| num_traits::ToPrimitive::to_i64(&v))
        .unwrap_or(DEFAULT_ATTRIBUTE_FEE);
    Ok(Some(StackItem::from_int(fee)))
}

fn set_attribute_fee(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let attribute_type = arg_i64(&args, 0)?;
    let value = arg_i64(&args, 1)?;
    if !(0..=MAX_ATTRIBUTE_FEE).contains(&value) {
        return Err(VmError::invalid_argument(format!(
            "AttributeFee must be within [0, {MAX_ATTRIBUTE_FEE}], got {value}"
        )));
    }
    require_committee(host)?;
    let key = [PREFIX_ATTRIBUTE_FEE, attribute_type as u8];
    let item = StorageItem::from_int(&BigInt::from(value));
    host.storage_put(ID, &key, &item.value)?;
    Ok(None)
}

fn is_blocked_method(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let account = arg_uint160(&args, 0)?;
    Ok(Some(StackItem::from_bool(is_blocked(host, &account)?)))
}

fn block_account(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    require_committee(host)?;
    let account = arg_uint160(&args, 0)?;
    if registry().by_hash(&account).is_some() {
        return Err(VmError::invalid_argument(
            "native contracts cannot be blocked".to_string(),
        ));
    }
    if is_blocked(host, &account)? {
        return Ok(Some(StackItem::from_bool(false)));
    }
    let height = host.block_index();
    host.storage_put(ID, &blocked_key(&account), &height.to_le_bytes())?;
    // Blocking clears any NEO vote the account held.
    if host.is_hardfork_enabled(Hardfork::Faun) {
        super::neo_token::clear_vote(host, &account)?;
    }
    Ok(Some(StackItem::from_bool(true)))
}

fn unblock_account(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    require_committee(host)?;
    let account = arg_uint160(&args, 0)?;
    if !is_blocked(host, &account)? {
        return Ok(Some(StackItem::from_bool(false)));
    }
    host.storage_delete(ID, &blocked_key(&account))?;
    Ok(Some(StackItem::from_bool(true)))
}

fn get_milliseconds_per_block(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let default = i64::from(host.settings.milliseconds_per_block);
    Ok(Some(StackItem::from_int(get_setting(
        host,
        PREFIX_MILLISECONDS_PER_BLOCK,
        default,
    )?)))
}

fn set_milliseconds_per_block(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let value = arg_i64(&args, 0)?;
    set_setting(
        host,
        PREFIX_MILLISECONDS_PER_BLOCK,
        value,
        1,
        30_000,
        "MillisecondsPerBlock",
    )?;
    Ok(None)
}

fn get_max_valid_until_block_increment(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let default = i64::from(host.settings.max_valid_until_block_increment);
    Ok(Some(StackItem::from_int(get_setting(
        host,
        PREFIX_MAX_VALID_UNTIL_INCREMENT,
        default,
    )?)))
}

fn set_max_valid_until_block_increment(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let value = arg_i64(&args, 0)?;
    set_setting(
        host,
        PREFIX_MAX_VALID_UNTIL_INCREMENT,
        value,
        1,
        86_400,
        "MaxValidUntilBlockIncrement",
    )?;
    Ok(None)
}

fn get_max_traceable_blocks(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let default = i64::from(host.settings.max_traceable_blocks);
    Ok(Some(StackItem::from_int(get_setting(
        host,
        PREFIX_MAX_TRACEABLE_BLOCKS,
        default,
    )?)))
}

fn set_max_traceable_blocks(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let value = arg_i64(&args, 0)?;
    set_setting(
        host,
        PREFIX_MAX_TRACEABLE_BLOCKS,
        value,
        1,
        i64::from(neo_config::MAX_TRACEABLE_BLOCKS),
        "MaxTraceableBlocks",
    )?;
    Ok(None)
}

fn whitelist_suffix(contract: &neo_core::UInt160, offset: u32) -> Vec<u8> {
    let mut suffix = Vec::with_capacity(25);
    suffix.push(PREFIX_WHITELIST_FEE);
    suffix.extend_from_slice(contract.as_bytes());
    suffix.extend_from_slice(&offset.to_le_bytes());
    suffix
}

fn resolve_method_offset(
    host: &EngineHost,
    contract: &neo_core::UInt160,
    method: &str,
) -> VmResult<u32> {
    let state = host
        .get_contract(contract)?
        .ok_or_else(|| VmError::ContractNotFound(contract.to_string()))?;
    state
        .manifest
        .abi
        .methods
        .iter()
        .find(|m| m.name == method)
        .map(|m| m.offset)
        .ok_or_else(|| VmError::MethodNotFound(method.to_string()))
}

fn set_whitelist_fee(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    require_committee(host)?;
    let contract = arg_uint160(&args, 0)?;
    let method = arg_string(&args, 1)?;
    let fee = arg_i64(&args, 2)?;
    if fee < 0 {
        return Err(VmError::invalid_argument("whitelist fee cannot be negative"));
    }
    // The ABI offset is pinned at set time: later contract updates do not
    // move the whitelist entry.
    let offset = resolve_method_offset(host, &contract, &method)?;
    let item = StorageItem::from_int(&BigInt::from(fee));
    host.storage_put(ID, &whitelist_suffix(&contract, offset), &item.value)?;
    Ok(None)
}

fn get_whitelist_fee(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let contract = arg_uint160(&args, 0)?;
    let method = arg_string(&args, 1)?;
    let offset = resolve_method_offset(host, &contract, &method)?;
    match host.storage_get(ID, &whitelist_suffix(&contract, offset))? {
        Some(value) => Ok(Some(StackItem::Integer(StorageItem::new(value).as_int()))),
        None => Ok(Some(StackItem::from_int(-1))),
    }
}

fn remove_whitelist_fee(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    require_committee(host)?;
    let contract = arg_uint160(&args, 0)?;
    let method = arg_string(&args, 1)?;
    let offset = resolve_method_offset(host, &contract, &method)?;
    host.storage_delete(ID, &whitelist_suffix(&contract, offset))?;
    Ok(None)
}

fn recover_fund(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    require_committee(host)?;
    let account = arg_uint160(&args, 0)?;
    let token = arg_uint160(&args, 1)?;
    let Some(blocked_height) = blocked_since(host, &account)? else {
        return Err(VmError::invalid_argument("account is not blocked"));
    };
    // Funds stay locked for roughly a year of blocks.
    let lock_blocks = host.settings.max_traceable_blocks;
    if host.block_index() < blocked_height.saturating_add(lock_blocks) {
        return Err(VmError::invalid_argument(
            "blocked funds are still locked".to_string(),
        ));
    }
    let treasury = super::treasury::hash();
    super::neo_token::recover_token_balance(host, engine, &token, &account, &treasury)?;
    Ok(None)
}

const NO_PARAMS: &[(&str, &str)] = &[];

/// Builds the PolicyContract table.
pub fn contract() -> NativeContract {
    let methods = vec![
        NativeMethod {
            name: "blockAccount",
            parameters: 1,
            parameter_defs: &[("account", "Hash160")],
            return_type: "Boolean",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: block_account,
        },
        NativeMethod {
            name: "getAttributeFee",
            parameters: 1,
            parameter_defs: &[("attributeType", "Integer")],
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_attribute_fee,
        },
        NativeMethod {
            name: "getExecFeeFactor",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_exec_fee_factor,
        },
        NativeMethod {
            name: "getFeePerByte",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_fee_per_byte,
        },
        NativeMethod {
            name: "getMaxTraceableBlocks",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: Some(Hardfork::Echidna),
            deprecated_in: None,
            handler: get_max_traceable_blocks,
        },
        NativeMethod {
            name: "getMaxValidUntilBlockIncrement",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: Some(Hardfork::Echidna),
            deprecated_in: None,
            handler: get_max_valid_until_block_increment,
        },
        NativeMethod {
            name: "getMillisecondsPerBlock",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: Some(Hardfork::Echidna),
            deprecated_in: None,
            handler: get_milliseconds_per_block,
        },
        NativeMethod {
            name: "getStoragePrice",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_storage_price,
        },
        NativeMethod {
            name: "getWhitelistFee",
            parameters: 2,
            parameter_defs: &[("contract", "Hash160"), ("method", "String")],
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: Some(Hardfork::Faun),
            deprecated_in: None,
            handler: get_whitelist_fee,
        },
        NativeMethod {
            name: "isBlocked",
            parameters: 1,
            parameter_defs: &[("account", "Hash160")],
            return_type: "Boolean",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: is_blocked_method,
        },
        NativeMethod {
            name: "recoverFund",
            parameters: 2,
            parameter_defs: &[("account", "Hash160"), ("token", "Hash160")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: Some(Hardfork::Faun),
            deprecated_in: None,
            handler: recover_fund,
        },
        NativeMethod {
            name: "removeWhitelistFee",
            parameters: 2,
            parameter_defs: &[("contract", "Hash160"), ("method", "String")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: Some(Hardfork::Faun),
            deprecated_in: None,
            handler: remove_whitelist_fee,
        },
        NativeMethod {
            name: "setAttributeFee",
            parameters: 2,
            parameter_defs: &[("attributeType", "Integer"), ("value", "Integer")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: set_attribute_fee,
        },
        NativeMethod {
            name: "setExecFeeFactor",
            parameters: 1,
            parameter_defs: &[("value", "Integer")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: set_exec_fee_factor,
        },
        NativeMethod {
            name: "setFeePerByte",
            parameters: 1,
            parameter_defs: &[("value", "Integer")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: set_fee_per_byte,
        },
        NativeMethod {
            name: "setMaxTraceableBlocks",
            parameters: 1,
            parameter_defs: &[("value", "Integer")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: Some(Hardfork::Echidna),
            deprecated_in: None,
            handler: set_max_traceable_blocks,
        },
        NativeMethod {
            name: "setMaxValidUntilBlockIncrement",
            parameters: 1,
            parameter_defs: &[("value", "Integer")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: Some(Hardfork::Echidna),
            deprecated_in: None,
            handler: set_max_valid_until_block_increment,
        },
        NativeMethod {
            name: "setMillisecondsPerBlock",
            parameters: 1,
            parameter_defs: &[("value", "Integer")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: Some(Hardfork::Echidna),
            deprecated_in: None,
            handler: set_milliseconds_per_block,
        },
        NativeMethod {
            name: "setStoragePrice",
            parameters: 1,
            parameter_defs: &[("value", "Integer")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: set_storage_price,
        },
        NativeMethod {
            name: "setWhitelistFee",
            parameters: 3,
            parameter_defs: &[
                ("contract", "Hash160"),
                ("method", "String"),
                ("fee", "Integer"),
            ],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: Some(Hardfork::Faun),
            deprecated_in: None,
            handler: set_whitelist_fee,
        },
    ];

    NativeContract {
        id: ID,
        name: "PolicyContract",
        hash: super::native_hash("PolicyContract"),
        active_in: None,
        supported_standards: &[],
        methods,
        events: Vec::new(),
        on_persist: None,
        post_persist: None,
    }
}

/// Genesis defaults written by the transition layer.
pub fn initialize(snapshot: &mut DataCache) {
    for (prefix, value) in [
        (PREFIX_FEE_PER_BYTE, DEFAULT_FEE_PER_BYTE),
        (PREFIX_EXEC_FEE_FACTOR, DEFAULT_EXEC_FEE_FACTOR),
        (PREFIX_STORAGE_PRICE, DEFAULT_STORAGE_PRICE),
    ] {
        let key = StorageKey::with_prefix(ID, prefix, &[]).to_bytes();
        let item = StorageItem::from_int(&BigInt::from(value));
        snapshot.put(&key, &item.value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_persistence::MemoryStore;

    #[test]
    fn defaults_read_back_from_snapshot() {
        let mut snapshot = DataCache::new(MemoryStore::shared());
        assert_eq!(exec_fee_factor_of(&snapshot), None);
        initialize(&mut snapshot);
        assert_eq!(exec_fee_factor_of(&snapshot), Some(DEFAULT_EXEC_FEE_FACTOR));
        assert_eq!(storage_price_of(&snapshot), Some(DEFAULT_STORAGE_PRICE));
    }
}
