//! Treasury (-11, Faun): the recovered-funds pool.

use super::{arg, arg_int, arg_uint160, require_committee, NativeContract, NativeMethod};
use crate::application_engine::EngineHost;
use crate::storage::StorageItem;
use neo_core::{Hardfork, UInt160};
use neo_vm::{CallFlags, ExecutionEngine, StackItem, VmError, VmResult};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

/// Contract id.
pub const ID: i32 = -11;

pub const PREFIX_BALANCE: u8 = 20;

/// The Treasury hash.
pub fn hash() -> UInt160 {
    super::native_hash("Treasury")
}

fn balance(host: &EngineHost) -> VmResult<BigInt> {
    Ok(host
        .storage_get(ID, &[PREFIX_BALANCE])?
        .map(|value| StorageItem::new(value).as_int())
        .unwrap_or_else(BigInt::zero))
}

fn write_balance(host: &mut EngineHost, value: &BigInt) -> VmResult<()> {
    host.storage_put(ID, &[PREFIX_BALANCE], &StorageItem::from_int(value).value)
}

// Handlers.

fn get_balance(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::Integer(balance(host)?)))
}

fn distribute(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let to = arg_uint160(&args, 0)?;
    let amount = arg_int(&args, 1)?;
    if !amount.is_positive() {
        return Err(VmError::invalid_argument("amount must be positive"));
    }
    require_committee(host)?;
    let current = balance(host)?;
    if amount > current {
        return Err(VmError::invalid_argument(format!(
            "treasury holds {current}, requested {amount}"
        )));
    }
    write_balance(host, &(current - &amount))?;
    super::gas_token::transfer_internal(
        host,
        engine,
        &hash(),
        &to,
        &amount,
        StackItem::Null,
        false,
    )?;
    Ok(Some(StackItem::from_bool(true)))
}

/// The treasury accepts any NEP-17 payment; the pool counter tracks GAS.
fn on_nep17_payment(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let _from = arg(&args, 0)?;
    let amount = arg_int(&args, 1)?;
    if amount.is_negative() {
        return Err(VmError::invalid_argument("amount cannot be negative"));
    }
    if host.calling_script_hash()? == super::gas_token::hash() {
        let total = balance(host)? + &amount;
        write_balance(host, &total)?;
    }
    Ok(None)
}

/// Withdrawals verify against the committee.
fn verify(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_bool(host.check_committee()?)))
}

/// Builds the Treasury table.
pub fn contract() -> NativeContract {
    let methods = vec![
        NativeMethod {
            name: "distribute",
            parameters: 2,
            parameter_defs: &[("to", "Hash160"), ("amount", "Integer")],
            return_type: "Boolean",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES
                .union(CallFlags::ALLOW_CALL)
                .union(CallFlags::ALLOW_NOTIFY),
            active_in: None,
            deprecated_in: None,
            handler: distribute,
        },
        NativeMethod {
            name: "getBalance",
            parameters: 0,
            parameter_defs: &[],
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_balance,
        },
        NativeMethod {
            name: "onNEP17Payment",
            parameters: 3,
            parameter_defs: &[
                ("from", "Hash160"),
                ("amount", "Integer"),
                ("data", "Any"),
            ],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: on_nep17_payment,
        },
        NativeMethod {
            name: "verify",
            parameters: 0,
            parameter_defs: &[],
            return_type: "Boolean",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: verify,
        },
    ];

    NativeContract {
        id: ID,
        name: "Treasury",
        hash: hash(),
        active_in: Some(Hardfork::Faun),
        supported_standards: &[],
        methods,
        events: Vec::new(),
        on_persist: None,
        post_persist: None,
    }
}
