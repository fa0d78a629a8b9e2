//! GasToken (-6): the NEP-17 utility token paying for execution.

use super::{arg, arg_int, arg_uint160, NativeContract, NativeEvent, NativeMethod};
use crate::application_engine::EngineHost;
use crate::storage::{StorageItem, StorageKey};
use neo_core::{TransactionAttribute, UInt160};
use neo_persistence::DataCache;
use neo_vm::{CallFlags, ExecutionEngine, StackItem, VmError, VmResult};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

/// Contract id.
pub const ID: i32 = -6;

pub const PREFIX_TOTAL_SUPPLY: u8 = 11;
pub const PREFIX_ACCOUNT: u8 = 20;

pub const DECIMALS: u8 = 8;
pub const SYMBOL: &str = "GAS";

/// The GAS contract hash.
pub fn hash() -> UInt160 {
    super::native_hash("GasToken")
}

fn account_key(account: &UInt160) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(PREFIX_ACCOUNT);
    key.extend_from_slice(account.as_bytes());
    key
}

/// Reads an account balance.
pub fn balance_of(host: &EngineHost, account: &UInt160) -> VmResult<BigInt> {
    Ok(host
        .storage_get(ID, &account_key(account))?
        .map(|value| StorageItem::new(value).as_int())
        .unwrap_or_else(BigInt::zero))
}

/// Reads the total supply.
pub fn total_supply(host: &EngineHost) -> VmResult<BigInt> {
    Ok(host
        .storage_get(ID, &[PREFIX_TOTAL_SUPPLY])?
        .map(|value| StorageItem::new(value).as_int())
        .unwrap_or_else(BigInt::zero))
}

fn write_balance(host: &mut EngineHost, account: &UInt160, balance: &BigInt) -> VmResult<()> {
    let key = account_key(account);
    if balance.is_zero() {
        host.storage_delete(ID, &key)
    } else {
        host.storage_put(ID, &key, &StorageItem::from_int(balance).value)
    }
}

fn adjust_supply(host: &mut EngineHost, delta: &BigInt) -> VmResult<()> {
    let supply = total_supply(host)? + delta;
    host.storage_put(ID, &[PREFIX_TOTAL_SUPPLY], &StorageItem::from_int(&supply).value)
}

fn transfer_notification(
    host: &mut EngineHost,
    from: Option<&UInt160>,
    to: Option<&UInt160>,
    amount: &BigInt,
) -> VmResult<()> {
    let project = |account: Option<&UInt160>| match account {
        Some(hash) => StackItem::from_byte_string(hash.to_vec()),
        None => StackItem::Null,
    };
    host.notify(
        hash(),
        "Transfer".to_string(),
        vec![project(from), project(to), StackItem::Integer(amount.clone())],
    )
}

/// Mints GAS to an account.
pub fn mint(host: &mut EngineHost, account: &UInt160, amount: &BigInt) -> VmResult<()> {
    if amount.is_negative() {
        return Err(VmError::invalid_argument("mint amount cannot be negative"));
    }
    if amount.is_zero() {
        return Ok(());
    }
    let balance = balance_of(host, account)? + amount;
    write_balance(host, account, &balance)?;
    adjust_supply(host, amount)?;
    transfer_notification(host, None, Some(account), amount)
}

/// Burns GAS from an account.
pub fn burn(host: &mut EngineHost, account: &UInt160, amount: &BigInt) -> VmResult<()> {
    if amount.is_negative() {
        return Err(VmError::invalid_argument("burn amount cannot be negative"));
    }
    if amount.is_zero() {
        return Ok(());
    }
    let balance = balance_of(host, account)?;
    if balance < *amount {
        return Err(VmError::invalid_argument(format!(
            "insufficient GAS: balance {balance}, burning {amount}"
        )));
    }
    let balance = balance - amount;
    write_balance(host, account, &balance)?;
    adjust_supply(host, &-amount)?;
    transfer_notification(host, Some(account), None, amount)
}

/// The NEP-17 transfer, shared with the recovery path.
pub fn transfer_internal(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    from: &UInt160,
    to: &UInt160,
    amount: &BigInt,
    data: StackItem,
    check_witness: bool,
) -> VmResult<bool> {
    if amount.is_negative() {
        return Err(VmError::invalid_argument("transfer amount cannot be negative"));
    }
    if check_witness {
        let authorized =
            host.calling_script_hash()? == *from || host.check_witness(from)?;
        if !authorized {
            return Ok(false);
        }
    }
    if !amount.is_zero() {
        let from_balance = balance_of(host, from)?;
        if from_balance < *amount {
            return Ok(false);
        }
        if from != to {
            write_balance(host, from, &(from_balance - amount))?;
            let to_balance = balance_of(host, to)? + amount;
            write_balance(host, to, &to_balance)?;
        }
    }
    transfer_notification(host, Some(from), Some(to), amount)?;
    on_payment_callback(host, engine, from, to, amount, data)?;
    Ok(true)
}

/// Calls `onNEP17Payment` when the recipient is a contract.
pub fn on_payment_callback(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    from: &UInt160,
    to: &UInt160,
    amount: &BigInt,
    data: StackItem,
) -> VmResult<()> {
    let Some(recipient) = host.get_contract(to)? else {
        return Ok(());
    };
    if !recipient.manifest.abi.has_method("onNEP17Payment") {
        return Err(VmError::MethodNotFound(format!(
            "{} does not accept NEP-17 payments",
            recipient.manifest.name
        )));
    }
    crate::application_engine::contract_syscalls::call_contract(
        host,
        engine,
        to,
        "onNEP17Payment",
        CallFlags::ALL,
        vec![
            StackItem::from_byte_string(from.to_vec()),
            StackItem::Integer(amount.clone()),
            data,
        ],
    )
}

// Handlers.

fn symbol(
    _: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_byte_string(SYMBOL.as_bytes().to_vec())))
}

fn decimals(
    _: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_int(i64::from(DECIMALS))))
}

fn total_supply_method(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::Integer(total_supply(host)?)))
}

fn balance_of_method(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let account = arg_uint160(&args, 0)?;
    Ok(Some(StackItem::Integer(balance_of(host, &account)?)))
}

fn transfer_method(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let from = arg_uint160(&args, 0)?;
    let to = arg_uint160(&args, 1)?;
    let amount = arg_int(&args, 2)?;
    let data = arg(&args, 3)?.clone();
    let ok = transfer_internal(host, engine, &from, &to, &amount, data, true)?;
    Ok(Some(StackItem::from_bool(ok)))
}

/// OnPersist: burn each transaction's fees from its sender, then mint the
/// collected network fees (net of notary shares) to the primary.
fn on_persist(host: &mut EngineHost, _engine: &mut ExecutionEngine) -> VmResult<()> {
    let Some(block) = host.persisting_block.clone() else {
        return Ok(());
    };
    let mut total_network_fee = BigInt::zero();
    for tx in &block.transactions {
        let fees = BigInt::from(tx.system_fee) + BigInt::from(tx.network_fee);
        if fees.is_positive() {
            burn(host, &tx.sender(), &fees)?;
        }
        total_network_fee += BigInt::from(tx.network_fee);
        for attribute in &tx.attributes {
            if let TransactionAttribute::NotaryAssisted { n_keys } = attribute {
                // The notary share is settled by the Notary contract.
                let per_key = BigInt::from(super::notary::FIXED_FEE_PER_KEY);
                total_network_fee -= per_key * (i64::from(*n_keys) + 1);
            }
        }
    }
    if total_network_fee.is_positive() {
        let primary = super::neo_token::primary_account(host, block.header.primary_index)?;
        if let Some(primary) = primary {
            mint(host, &primary, &total_network_fee)?;
        }
    }
    Ok(())
}

/// Genesis mint; accumulates across allocation entries.
pub fn initialize(snapshot: &mut DataCache, recipient: &UInt160, amount: i64) {
    let key = StorageKey::with_prefix(ID, PREFIX_ACCOUNT, recipient.as_bytes()).to_bytes();
    let balance = snapshot
        .get(&key)
        .map(|value| StorageItem::new(value).as_int())
        .unwrap_or_else(BigInt::zero)
        + amount;
    snapshot.put(&key, &StorageItem::from_int(&balance).value);
    let supply_key = StorageKey::with_prefix(ID, PREFIX_TOTAL_SUPPLY, &[]).to_bytes();
    let supply = snapshot
        .get(&supply_key)
        .map(|value| StorageItem::new(value).as_int())
        .unwrap_or_else(BigInt::zero)
        + amount;
    snapshot.put(&supply_key, &StorageItem::from_int(&supply).value);
}

const NO_PARAMS: &[(&str, &str)] = &[];

/// Builds the GasToken table.
pub fn contract() -> NativeContract {
    let methods = vec![
        NativeMethod {
            name: "balanceOf",
            parameters: 1,
            parameter_defs: &[("account", "Hash160")],
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: balance_of_method,
        },
        NativeMethod {
            name: "decimals",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Integer",
            cpu_fee: 0,
            storage_fee: 0,
            required_flags: CallFlags::NONE,
            active_in: None,
            deprecated_in: None,
            handler: decimals,
        },
        NativeMethod {
            name: "symbol",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "String",
            cpu_fee: 0,
            storage_fee: 0,
            required_flags: CallFlags::NONE,
            active_in: None,
            deprecated_in: None,
            handler: symbol,
        },
        NativeMethod {
            name: "totalSupply",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: total_supply_method,
        },
        NativeMethod {
            name: "transfer",
            parameters: 4,
            parameter_defs: &[
                ("from", "Hash160"),
                ("to", "Hash160"),
                ("amount", "Integer"),
                ("data", "Any"),
            ],
            return_type: "Boolean",
            cpu_fee: 1 << 17,
            storage_fee: 50,
            required_flags: CallFlags::STATES
                .union(CallFlags::ALLOW_CALL)
                .union(CallFlags::ALLOW_NOTIFY),
            active_in: None,
            deprecated_in: None,
            handler: transfer_method,
        },
    ];

    NativeContract {
        id: ID,
        name: "GasToken",
        hash: hash(),
        active_in: None,
        supported_standards: &["NEP-17"],
        methods,
        events: vec![NativeEvent {
            name: "Transfer",
            parameters: &[("from", "Hash160"), ("to", "Hash160"), ("amount", "Integer")],
            active_in: None,
            deprecated_in: None,
        }],
        on_persist: Some(on_persist),
        post_persist: None,
    }
}
