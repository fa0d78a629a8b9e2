//! Notary (-10, Echidna): deposits backing notary-assisted transactions.

use super::{arg, arg_bytes, arg_i64, arg_int, arg_uint160, require_committee, NativeContract, NativeMethod};
use crate::application_engine::EngineHost;
use crate::storage::StorageItem;
use neo_core::{Hardfork, TransactionAttribute, UInt160};
use neo_cryptography::hash160;
use neo_vm::{CallFlags, ExecutionEngine, StackItem, VmError, VmResult};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// Contract id.
pub const ID: i32 = -10;

pub const PREFIX_DEPOSIT: u8 = 1;
pub const PREFIX_MAX_NOT_VALID_BEFORE_DELTA: u8 = 10;

/// Default bound on `NotValidBefore` distance.
pub const DEFAULT_MAX_NOT_VALID_BEFORE_DELTA: u32 = 140;
/// Notary fee per signing key, in datoshi.
pub const FIXED_FEE_PER_KEY: i64 = 10_000_000;

/// The Notary hash.
pub fn hash() -> UInt160 {
    super::native_hash("Notary")
}

/// One deposit: spendable amount plus its lock height.
#[derive(Debug, Clone, Default)]
pub struct Deposit {
    pub amount: BigInt,
    pub till: u32,
}

impl Deposit {
    fn to_bytes(&self) -> Vec<u8> {
        let mut amount = self.amount.to_signed_bytes_le();
        amount.resize(32, if self.amount.is_negative() { 0xFF } else { 0 });
        let mut bytes = amount;
        bytes.extend_from_slice(&self.till.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> Deposit {
        if bytes.len() < 36 {
            return Deposit::default();
        }
        Deposit {
            amount: BigInt::from_signed_bytes_le(&bytes[..32]),
            till: u32::from_le_bytes([bytes[32], bytes[33], bytes[34], bytes[35]]),
        }
    }
}

fn deposit_key(account: &UInt160) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(PREFIX_DEPOSIT);
    key.extend_from_slice(account.as_bytes());
    key
}

fn deposit_of(host: &EngineHost, account: &UInt160) -> VmResult<Option<Deposit>> {
    Ok(host
        .storage_get(ID, &deposit_key(account))?
        .map(|bytes| Deposit::from_bytes(&bytes)))
}

fn write_deposit(host: &mut EngineHost, account: &UInt160, deposit: &Deposit) -> VmResult<()> {
    let key = deposit_key(account);
    if deposit.amount.is_zero() {
        host.storage_delete(ID, &key)
    } else {
        host.storage_put(ID, &key, &deposit.to_bytes())
    }
}

/// The configured `NotValidBefore` delta bound.
pub fn max_not_valid_before_delta(host: &EngineHost) -> VmResult<u32> {
    Ok(host
        .storage_get(ID, &[PREFIX_MAX_NOT_VALID_BEFORE_DELTA])?
        .map(|value| StorageItem::new(value).as_int())
        .and_then(|v| v.to_u32())
        .unwrap_or(DEFAULT_MAX_NOT_VALID_BEFORE_DELTA))
}

// Handlers.

fn balance_of(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let account = arg_uint160(&args, 0)?;
    let amount = deposit_of(host, &account)?
        .map(|d| d.amount)
        .unwrap_or_else(BigInt::zero);
    Ok(Some(StackItem::Integer(amount)))
}

fn expiration_of(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let account = arg_uint160(&args, 0)?;
    let till = deposit_of(host, &account)?.map(|d| d.till).unwrap_or(0);
    Ok(Some(StackItem::from_int(i64::from(till))))
}

/// Deposits arrive as GAS payments with `data = [account, till]`.
fn on_nep17_payment(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    if host.calling_script_hash()? != super::gas_token::hash() {
        return Err(VmError::invalid_argument(
            "notary deposits must arrive in GAS".to_string(),
        ));
    }
    let from = arg_uint160(&args, 0)?;
    let amount = arg_int(&args, 1)?;
    let data = arg(&args, 2)?;
    let StackItem::Array(data) = data else {
        return Err(data.type_mismatch("Array"));
    };
    let fields = data.borrow().clone();
    if fields.len() != 2 {
        return Err(VmError::invalid_argument(
            "deposit data must be [account, till]".to_string(),
        ));
    }
    let account = if fields[0].is_null() {
        from
    } else {
        let bytes = fields[0].as_bytes()?;
        UInt160::from_bytes(&bytes).map_err(|_| VmError::BadScriptHash {
            expected: 20,
            actual: bytes.len(),
        })?
    };
    let till = fields[1]
        .as_int()?
        .to_u32()
        .ok_or_else(|| VmError::invalid_argument("till out of range"))?;
    if till < host.block_index() {
        return Err(VmError::invalid_argument("till is already in the past"));
    }

    let mut deposit = deposit_of(host, &account)?.unwrap_or_default();
    deposit.amount += &amount;
    deposit.till = deposit.till.max(till);
    write_deposit(host, &account, &deposit)?;
    Ok(None)
}

fn lock_deposit_until(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let account = arg_uint160(&args, 0)?;
    let till = arg_i64(&args, 1)?;
    let till = u32::try_from(till)
        .map_err(|_| VmError::invalid_argument("till out of range"))?;
    if !host.check_witness(&account)? {
        return Ok(Some(StackItem::from_bool(false)));
    }
    let Some(mut deposit) = deposit_of(host, &account)? else {
        return Ok(Some(StackItem::from_bool(false)));
    };
    if till < deposit.till {
        return Ok(Some(StackItem::from_bool(false)));
    }
    deposit.till = till;
    write_deposit(host, &account, &deposit)?;
    Ok(Some(StackItem::from_bool(true)))
}

fn withdraw(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let from = arg_uint160(&args, 0)?;
    let to = arg_uint160(&args, 1)?;
    if !host.check_witness(&from)? {
        return Ok(Some(StackItem::from_bool(false)));
    }
    let Some(deposit) = deposit_of(host, &from)? else {
        return Ok(Some(StackItem::from_bool(false)));
    };
    if host.block_index() < deposit.till {
        return Ok(Some(StackItem::from_bool(false)));
    }
    write_deposit(host, &from, &Deposit::default())?;
    super::gas_token::transfer_internal(
        host,
        engine,
        &hash(),
        &to,
        &deposit.amount,
        StackItem::Null,
        false,
    )?;
    Ok(Some(StackItem::from_bool(true)))
}

fn get_max_not_valid_before_delta(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_int(i64::from(
        max_not_valid_before_delta(host)?,
    ))))
}

fn set_max_not_valid_before_delta(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let value = arg_i64(&args, 0)?;
    if !(1..=1024).contains(&value) {
        return Err(VmError::invalid_argument(
            "MaxNotValidBeforeDelta must be within [1, 1024]".to_string(),
        ));
    }
    require_committee(host)?;
    host.storage_put(
        ID,
        &[PREFIX_MAX_NOT_VALID_BEFORE_DELTA],
        &StorageItem::from_int(&BigInt::from(value)).value,
    )?;
    Ok(None)
}

/// A notary-assisted transaction verifies when it carries the attribute,
/// the signature belongs to a designated notary, and the payer's deposit
/// covers the fee.
fn verify(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let signature = arg_bytes(&args, 0)?;
    let Some(tx) = host.container.as_transaction().cloned() else {
        return Ok(Some(StackItem::from_bool(false)));
    };
    let Some(n_keys) = tx.attributes.iter().find_map(|attribute| match attribute {
        TransactionAttribute::NotaryAssisted { n_keys } => Some(*n_keys),
        _ => None,
    }) else {
        return Ok(Some(StackItem::from_bool(false)));
    };
    let payer = tx.sender();
    let fee = BigInt::from(FIXED_FEE_PER_KEY) * (i64::from(n_keys) + 1);
    let deposit = deposit_of(host, &payer)?.unwrap_or_default();
    if deposit.amount < fee {
        return Ok(Some(StackItem::from_bool(false)));
    }

    let notaries = super::role_management::designated_by_role(
        host,
        super::role_management::Role::P2PNotary,
        host.block_index(),
    )?;
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&host.settings.network.to_le_bytes());
    data.extend_from_slice(tx.hash().as_bytes());
    let valid = notaries.iter().any(|key| {
        neo_cryptography::verify_ecdsa(
            &data,
            key,
            &signature,
            neo_cryptography::EcCurve::Secp256r1,
            neo_cryptography::HashKind::Sha256,
        )
    });
    Ok(Some(StackItem::from_bool(valid)))
}

/// OnPersist: settle notary fees out of payer deposits to the designated
/// notary nodes.
fn on_persist(host: &mut EngineHost, _: &mut ExecutionEngine) -> VmResult<()> {
    let Some(block) = host.persisting_block.clone() else {
        return Ok(());
    };
    let notaries = super::role_management::designated_by_role(
        host,
        super::role_management::Role::P2PNotary,
        host.block_index(),
    )?;
    let mut total_fees = BigInt::zero();
    for tx in &block.transactions {
        let Some(n_keys) = tx.attributes.iter().find_map(|attribute| match attribute {
            TransactionAttribute::NotaryAssisted { n_keys } => Some(*n_keys),
            _ => None,
        }) else {
            continue;
        };
        let fee = BigInt::from(FIXED_FEE_PER_KEY) * (i64::from(n_keys) + 1);
        let payer = tx.sender();
        let mut deposit = deposit_of(host, &payer)?.unwrap_or_default();
        deposit.amount -= &fee;
        if deposit.amount.is_negative() {
            deposit.amount = BigInt::zero();
        }
        write_deposit(host, &payer, &deposit)?;
        total_fees += fee;
    }
    if total_fees.is_positive() && !notaries.is_empty() {
        let share = &total_fees / notaries.len() as i64;
        if share.is_positive() {
            for key in &notaries {
                let script =
                    crate::application_engine::contract_syscalls::standard_account_script(key);
                let account = UInt160::from(hash160(&script));
                super::gas_token::mint(host, &account, &share)?;
            }
        }
    }
    Ok(())
}

/// Builds the Notary table.
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
            handler: balance_of,
        },
        NativeMethod {
            name: "expirationOf",
            parameters: 1,
            parameter_defs: &[("account", "Hash160")],
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: expiration_of,
        },
        NativeMethod {
            name: "getMaxNotValidBeforeDelta",
            parameters: 0,
            parameter_defs: &[],
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_max_not_valid_before_delta,
        },
        NativeMethod {
            name: "lockDepositUntil",
            parameters: 2,
            parameter_defs: &[("account", "Hash160"), ("till", "Integer")],
            return_type: "Boolean",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: lock_deposit_until,
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
            name: "setMaxNotValidBeforeDelta",
            parameters: 1,
            parameter_defs: &[("value", "Integer")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: set_max_not_valid_before_delta,
        },
        NativeMethod {
            name: "verify",
            parameters: 1,
            parameter_defs: &[("signature", "ByteArray")],
            return_type: "Boolean",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: verify,
        },
        NativeMethod {
            name: "withdraw",
            parameters: 2,
            parameter_defs: &[("from", "Hash160"), ("to", "Hash160")],
            return_type: "Boolean",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES
                .union(CallFlags::ALLOW_CALL)
                .union(CallFlags::ALLOW_NOTIFY),
            active_in: None,
            deprecated_in: None,
            handler: withdraw,
        },
    ];

    NativeContract {
        id: ID,
        name: "Notary",
        hash: hash(),
        active_in: Some(Hardfork::Echidna),
        supported_standards: &[],
        methods,
        events: Vec::new(),
        on_persist: Some(on_persist),
        post_persist: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_round_trip() {
        let deposit = Deposit {
            amount: BigInt::from(123_456_789),
            till: 500,
        };
        let parsed = Deposit::from_bytes(&deposit.to_bytes());
        assert_eq!(parsed.amount, deposit.amount);
        assert_eq!(parsed.till, 500);
    }
}
