//! NeoToken (-5): the governance token, candidate voting and the
//! committee.

use super::{arg, arg_int, arg_uint160, require_committee, NativeContract, NativeEvent, NativeMethod};
use crate::application_engine::{contract_syscalls, EngineHost};
use crate::storage::{StorageItem, StorageKey};
use neo_core::UInt160;
use neo_cryptography::hash160;
use neo_persistence::DataCache;
use neo_vm::{CallFlags, ExecutionEngine, StackItem, VmError, VmResult};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// Contract id.
pub const ID: i32 = -5;

pub const PREFIX_VOTERS_COUNT: u8 = 1;
pub const PREFIX_TOTAL_SUPPLY: u8 = 11;
pub const PREFIX_REGISTER_PRICE: u8 = 13;
pub const PREFIX_COMMITTEE: u8 = 14;
pub const PREFIX_ACCOUNT: u8 = 20;
pub const PREFIX_GAS_PER_BLOCK: u8 = 29;
pub const PREFIX_CANDIDATE: u8 = 33;

pub const SYMBOL: &str = "NEO";
pub const DECIMALS: u8 = 0;
/// Total indivisible supply.
pub const TOTAL_SUPPLY: i64 = 100_000_000;
/// Default GAS generated per block, in datoshi.
pub const DEFAULT_GAS_PER_BLOCK: i64 = 5 * 100_000_000;
/// Default candidate registration price, in datoshi.
pub const DEFAULT_REGISTER_PRICE: i64 = 1000 * 100_000_000;
/// Share of generated GAS that flows to plain holders, in percent.
pub const NEO_HOLDER_REWARD_RATIO: i64 = 10;

/// The NEO contract hash.
pub fn hash() -> UInt160 {
    super::native_hash("NeoToken")
}

/// Per-account state: balance, the height it last changed, and the vote.
#[derive(Debug, Clone, Default)]
pub struct NeoAccountState {
    pub balance: BigInt,
    pub balance_height: u32,
    pub vote_to: Option<Vec<u8>>,
}

impl NeoAccountState {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(70);
        let mut balance = self.balance.to_signed_bytes_le();
        balance.resize(32, if self.balance.is_negative() { 0xFF } else { 0 });
        bytes.extend_from_slice(&balance);
        bytes.extend_from_slice(&self.balance_height.to_le_bytes());
        match &self.vote_to {
            Some(key) => {
                bytes.push(1);
                bytes.extend_from_slice(key);
            }
            None => bytes.push(0),
        }
        bytes
    }

    fn from_bytes(bytes: &[u8]) -> NeoAccountState {
        if bytes.len() < 37 {
            return NeoAccountState::default();
        }
        let balance = BigInt::from_signed_bytes_le(&bytes[..32]);
        let balance_height = u32::from_le_bytes([bytes[32], bytes[33], bytes[34], bytes[35]]);
        let vote_to = if bytes[36] == 1 && bytes.len() >= 70 {
            Some(bytes[37..70].to_vec())
        } else {
            None
        };
        NeoAccountState {
            balance,
            balance_height,
            vote_to,
        }
    }
}

fn account_key(account: &UInt160) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(PREFIX_ACCOUNT);
    key.extend_from_slice(account.as_bytes());
    key
}

fn candidate_key(public_key: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(34);
    key.push(PREFIX_CANDIDATE);
    key.extend_from_slice(public_key);
    key
}

fn account_state(host: &EngineHost, account: &UInt160) -> VmResult<Option<NeoAccountState>> {
    Ok(host
        .storage_get(ID, &account_key(account))?
        .map(|bytes| NeoAccountState::from_bytes(&bytes)))
}

fn write_account_state(
    host: &mut EngineHost,
    account: &UInt160,
    state: &NeoAccountState,
) -> VmResult<()> {
    let key = account_key(account);
    if state.balance.is_zero() && state.vote_to.is_none() {
        host.storage_delete(ID, &key)
    } else {
        host.storage_put(ID, &key, &state.to_bytes())
    }
}

/// Reads an account balance.
pub fn balance_of(host: &EngineHost, account: &UInt160) -> VmResult<BigInt> {
    Ok(account_state(host, account)?
        .map(|state| state.balance)
        .unwrap_or_else(BigInt::zero))
}

/// The current GAS generated per block.
pub fn gas_per_block(host: &EngineHost) -> VmResult<i64> {
    Ok(host
        .storage_get(ID, &[PREFIX_GAS_PER_BLOCK])?
        .map(|value| StorageItem::new(value).as_int())
        .and_then(|v| v.to_i64())
        .unwrap_or(DEFAULT_GAS_PER_BLOCK))
}

/// The candidate registration price.
pub fn register_price(host: &EngineHost) -> VmResult<i64> {
    Ok(host
        .storage_get(ID, &[PREFIX_REGISTER_PRICE])?
        .map(|value| StorageItem::new(value).as_int())
        .and_then(|v| v.to_i64())
        .unwrap_or(DEFAULT_REGISTER_PRICE))
}

/// Registered candidates as (key, votes), vote-descending then key order.
pub fn candidates(host: &EngineHost) -> VmResult<Vec<(Vec<u8>, BigInt)>> {
    let mut result: Vec<(Vec<u8>, BigInt)> = host
        .storage_find(ID, &[PREFIX_CANDIDATE], neo_persistence::SeekDirection::Forward)?
        .into_iter()
        .map(|(key, value)| (key[1..].to_vec(), StorageItem::new(value).as_int()))
        .collect();
    result.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(result)
}

/// The current committee keys: elected candidates padded with standby
/// members.
pub fn committee(host: &EngineHost) -> VmResult<Vec<Vec<u8>>> {
    if let Some(stored) = host.storage_get(ID, &[PREFIX_COMMITTEE])? {
        if !stored.is_empty() {
            let count = stored[0] as usize;
            let mut keys = Vec::with_capacity(count);
            for i in 0..count {
                let start = 1 + i * 33;
                if stored.len() < start + 33 {
                    break;
                }
                keys.push(stored[start..start + 33].to_vec());
            }
            if !keys.is_empty() {
                return Ok(keys);
            }
        }
    }
    compute_committee(host)
}

fn compute_committee(host: &EngineHost) -> VmResult<Vec<Vec<u8>>> {
    let size = host.settings.committee_members_count;
    let mut keys: Vec<Vec<u8>> = candidates(host)?
        .into_iter()
        .filter(|(_, votes)| votes.is_positive())
        .map(|(key, _)| key)
        .take(size)
        .collect();
    for standby in &host.settings.standby_committee {
        if keys.len() >= size {
            break;
        }
        if !keys.contains(standby) {
            keys.push(standby.clone());
        }
    }
    Ok(keys)
}

fn store_committee(host: &mut EngineHost, keys: &[Vec<u8>]) -> VmResult<()> {
    let mut bytes = Vec::with_capacity(1 + keys.len() * 33);
    bytes.push(keys.len() as u8);
    for key in keys {
        bytes.extend_from_slice(key);
    }
    host.storage_put(ID, &[PREFIX_COMMITTEE], &bytes)
}

/// The committee multisig address: majority of the sorted committee keys.
pub fn committee_address(host: &EngineHost) -> VmResult<UInt160> {
    let mut keys = committee(host)?;
    if keys.is_empty() {
        return Ok(UInt160::ZERO);
    }
    keys.sort();
    let m = keys.len() - (keys.len() - 1) / 2;
    let script = contract_syscalls::multisig_account_script(m, &keys)?;
    Ok(UInt160::from(hash160(&script)))
}

/// The standard account of the block primary, from the validator set.
pub fn primary_account(host: &EngineHost, primary_index: u8) -> VmResult<Option<UInt160>> {
    let keys = committee(host)?;
    let validator_count = host.settings.validators_count.min(keys.len());
    if validator_count == 0 {
        return Ok(None);
    }
    let key = &keys[primary_index as usize % validator_count];
    let script = contract_syscalls::standard_account_script(key);
    Ok(Some(UInt160::from(hash160(&script))))
}

/// GAS accrued by a balance held from `start` to `end`.
fn accrued_gas(host: &EngineHost, balance: &BigInt, start: u32, end: u32) -> VmResult<BigInt> {
    if balance.is_zero() || end <= start {
        return Ok(BigInt::zero());
    }
    let per_block = BigInt::from(gas_per_block(host)?);
    let blocks = BigInt::from(end - start);
    Ok(balance * per_block * blocks * NEO_HOLDER_REWARD_RATIO / 100 / TOTAL_SUPPLY)
}

/// Settles the unclaimed GAS of an account up to the current height.
fn settle_gas(host: &mut EngineHost, account: &UInt160, state: &mut NeoAccountState) -> VmResult<()> {
    let height = host.block_index();
    let accrued = accrued_gas(host, &state.balance, state.balance_height, height)?;
    state.balance_height = height;
    if accrued.is_positive() {
        super::gas_token::mint(host, account, &accrued)?;
    }
    Ok(())
}

fn adjust_candidate_votes(host: &mut EngineHost, candidate: &[u8], delta: &BigInt) -> VmResult<()> {
    let key = candidate_key(candidate);
    let Some(stored) = host.storage_get(ID, &key)? else {
        return Ok(());
    };
    let votes = StorageItem::new(stored).as_int() + delta;
    host.storage_put(ID, &key, &StorageItem::from_int(&votes).value)
}

/// Removes an account's vote; used when the account is blocked.
pub fn clear_vote(host: &mut EngineHost, account: &UInt160) -> VmResult<()> {
    let Some(mut state) = account_state(host, account)? else {
        return Ok(());
    };
    if let Some(candidate) = state.vote_to.take() {
        adjust_candidate_votes(host, &candidate, &-state.balance.clone())?;
        adjust_voters_count(host, &-BigInt::from(1))?;
        write_account_state(host, account, &state)?;
    }
    Ok(())
}

fn adjust_voters_count(host: &mut EngineHost, delta: &BigInt) -> VmResult<()> {
    let count = host
        .storage_get(ID, &[PREFIX_VOTERS_COUNT])?
        .map(|value| StorageItem::new(value).as_int())
        .unwrap_or_else(BigInt::zero)
        + delta;
    host.storage_put(ID, &[PREFIX_VOTERS_COUNT], &StorageItem::from_int(&count).value)
}

/// Moves a blocked account's full balance of a native token into the
/// recovery target. Supports the two native NEP-17 tokens.
pub fn recover_token_balance(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    token: &UInt160,
    from: &UInt160,
    to: &UInt160,
) -> VmResult<()> {
    if *token == hash() {
        let Some(mut from_state) = account_state(host, from)? else {
            return Ok(());
        };
        clear_vote(host, from)?;
        let amount = from_state.balance.clone();
        if amount.is_zero() {
            return Ok(());
        }
        from_state.balance = BigInt::zero();
        write_account_state(host, from, &from_state)?;
        let mut to_state = account_state(host, to)?.unwrap_or_default();
        to_state.balance += &amount;
        write_account_state(host, to, &to_state)?;
        host.notify(
            hash(),
            "Transfer".to_string(),
            vec![
                StackItem::from_byte_string(from.to_vec()),
                StackItem::from_byte_string(to.to_vec()),
                StackItem::Integer(amount),
            ],
        )
    } else if *token == super::gas_token::hash() {
        let amount = super::gas_token::balance_of(host, from)?;
        if amount.is_zero() {
            return Ok(());
        }
        super::gas_token::transfer_internal(host, engine, from, to, &amount, StackItem::Null, false)
            .map(|_| ())
    } else {
        Err(VmError::ContractNotFound(format!(
            "recovery supports native tokens only, got {token}"
        )))
    }
}

// Handlers.

fn symbol(_: &mut EngineHost, _: &mut ExecutionEngine, _: Vec<StackItem>) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_byte_string(SYMBOL.as_bytes().to_vec())))
}

fn decimals(_: &mut EngineHost, _: &mut ExecutionEngine, _: Vec<StackItem>) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_int(i64::from(DECIMALS))))
}

fn total_supply_method(
    _: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_int(TOTAL_SUPPLY)))
}

fn balance_of_method(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let account = arg_uint160(&args, 0)?;
    Ok(Some(StackItem::Integer(balance_of(host, &account)?)))
}

fn get_account_state(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let account = arg_uint160(&args, 0)?;
    match account_state(host, &account)? {
        None => Ok(Some(StackItem::Null)),
        Some(state) => Ok(Some(StackItem::from_struct(vec![
            StackItem::Integer(state.balance),
            StackItem::from_int(i64::from(state.balance_height)),
            match state.vote_to {
                Some(key) => StackItem::from_byte_string(key),
                None => StackItem::Null,
            },
        ]))),
    }
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
    if amount.is_negative() {
        return Err(VmError::invalid_argument("transfer amount cannot be negative"));
    }

    let authorized = host.calling_script_hash()? == from || host.check_witness(&from)?;
    if !authorized {
        return Ok(Some(StackItem::from_bool(false)));
    }

    let Some(mut from_state) = account_state(host, &from)? else {
        return Ok(Some(StackItem::from_bool(amount.is_zero())));
    };
    if from_state.balance < amount {
        return Ok(Some(StackItem::from_bool(false)));
    }

    // Balance changes settle the unclaimed GAS of both parties.
    settle_gas(host, &from, &mut from_state)?;
    if !amount.is_zero() && from != to {
        if let Some(candidate) = from_state.vote_to.clone() {
            adjust_candidate_votes(host, &candidate, &-amount.clone())?;
        }
        from_state.balance -= &amount;
        if from_state.balance.is_zero() && from_state.vote_to.take().is_some() {
            // A drained voter no longer counts.
            adjust_voters_count(host, &-BigInt::from(1))?;
        }
        write_account_state(host, &from, &from_state)?;

        let mut to_state = account_state(host, &to)?.unwrap_or_default();
        settle_gas(host, &to, &mut to_state)?;
        if let Some(candidate) = to_state.vote_to.clone() {
            adjust_candidate_votes(host, &candidate, &amount)?;
        }
        to_state.balance += &amount;
        write_account_state(host, &to, &to_state)?;
    } else {
        write_account_state(host, &from, &from_state)?;
    }

    host.notify(
        hash(),
        "Transfer".to_string(),
        vec![
            StackItem::from_byte_string(from.to_vec()),
            StackItem::from_byte_string(to.to_vec()),
            StackItem::Integer(amount.clone()),
        ],
    )?;
    super::gas_token::on_payment_callback(host, engine, &from, &to, &amount, data)?;
    Ok(Some(StackItem::from_bool(true)))
}

fn unclaimed_gas(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let account = arg_uint160(&args, 0)?;
    let end = arg_int(&args, 1)?
        .to_u32()
        .ok_or_else(|| VmError::invalid_argument("end height out of range"))?;
    let state = account_state(host, &account)?.unwrap_or_default();
    let accrued = accrued_gas(host, &state.balance, state.balance_height, end)?;
    Ok(Some(StackItem::Integer(accrued)))
}

fn register_candidate(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let public_key = super::arg_bytes(&args, 0)?;
    if public_key.len() != 33 {
        return Err(VmError::invalid_argument("public key must be 33 bytes"));
    }
    let account_script = contract_syscalls::standard_account_script(&public_key);
    let owner = UInt160::from(hash160(&account_script));
    if !host.check_witness(&owner)? {
        return Ok(Some(StackItem::from_bool(false)));
    }
    // Registration burns the register price as a fee.
    let price = register_price(host)?;
    host.add_gas(price)?;
    let _ = engine;
    let key = candidate_key(&public_key);
    if host.storage_get(ID, &key)?.is_none() {
        host.storage_put(ID, &key, &StorageItem::from_int(&BigInt::zero()).value)?;
        host.notify(
            hash(),
            "CandidateStateChanged".to_string(),
            vec![
                StackItem::from_byte_string(public_key),
                StackItem::from_bool(true),
                StackItem::from_int(0),
            ],
        )?;
    }
    Ok(Some(StackItem::from_bool(true)))
}

fn unregister_candidate(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let public_key = super::arg_bytes(&args, 0)?;
    if public_key.len() != 33 {
        return Err(VmError::invalid_argument("public key must be 33 bytes"));
    }
    let account_script = contract_syscalls::standard_account_script(&public_key);
    let owner = UInt160::from(hash160(&account_script));
    if !host.check_witness(&owner)? {
        return Ok(Some(StackItem::from_bool(false)));
    }
    let key = candidate_key(&public_key);
    if let Some(stored) = host.storage_get(ID, &key)? {
        let votes = StorageItem::new(stored).as_int();
        host.storage_delete(ID, &key)?;
        host.notify(
            hash(),
            "CandidateStateChanged".to_string(),
            vec![
                StackItem::from_byte_string(public_key),
                StackItem::from_bool(false),
                StackItem::Integer(votes),
            ],
        )?;
    }
    Ok(Some(StackItem::from_bool(true)))
}

fn vote(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let account = arg_uint160(&args, 0)?;
    let target = arg(&args, 1)?;
    let vote_to = if target.is_null() {
        None
    } else {
        let key = target.as_bytes()?;
        if key.len() != 33 {
            return Err(VmError::invalid_argument("public key must be 33 bytes"));
        }
        Some(key)
    };
    if !host.check_witness(&account)? {
        return Ok(Some(StackItem::from_bool(false)));
    }
    let Some(mut state) = account_state(host, &account)? else {
        return Ok(Some(StackItem::from_bool(false)));
    };
    if let Some(candidate) = &vote_to {
        if host.storage_get(ID, &candidate_key(candidate))?.is_none() {
            return Ok(Some(StackItem::from_bool(false)));
        }
    }

    let old_vote = state.vote_to.clone();
    match (&old_vote, &vote_to) {
        (None, Some(_)) => adjust_voters_count(host, &BigInt::from(1))?,
        (Some(_), None) => adjust_voters_count(host, &-BigInt::from(1))?,
        _ => {}
    }
    if let Some(candidate) = &old_vote {
        adjust_candidate_votes(host, candidate, &-state.balance.clone())?;
    }
    if let Some(candidate) = &vote_to {
        adjust_candidate_votes(host, candidate, &state.balance.clone())?;
    }
    state.vote_to = vote_to.clone();
    write_account_state(host, &account, &state)?;
    host.notify(
        hash(),
        "Vote".to_string(),
        vec![
            StackItem::from_byte_string(account.to_vec()),
            match old_vote {
                Some(key) => StackItem::from_byte_string(key),
                None => StackItem::Null,
            },
            match vote_to {
                Some(key) => StackItem::from_byte_string(key),
                None => StackItem::Null,
            },
            StackItem::Integer(state.balance),
        ],
    )?;
    Ok(Some(StackItem::from_bool(true)))
}

fn get_candidates(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let entries: Vec<StackItem> = candidates(host)?
        .into_iter()
        .map(|(key, votes)| {
            StackItem::from_struct(vec![
                StackItem::from_byte_string(key),
                StackItem::Integer(votes),
            ])
        })
        .collect();
    Ok(Some(StackItem::from_array(entries)))
}

fn get_committee(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let mut keys = committee(host)?;
    keys.sort();
    Ok(Some(StackItem::from_array(
        keys.into_iter().map(StackItem::from_byte_string).collect(),
    )))
}

fn get_committee_address(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_byte_string(
        committee_address(host)?.to_vec(),
    )))
}

fn get_next_block_validators(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let keys = committee(host)?;
    let validators: Vec<StackItem> = keys
        .into_iter()
        .take(host.settings.validators_count)
        .map(StackItem::from_byte_string)
        .collect();
    Ok(Some(StackItem::from_array(validators)))
}

fn get_gas_per_block(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_int(gas_per_block(host)?)))
}

fn set_gas_per_block(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let value = super::arg_i64(&args, 0)?;
    if !(0..=10 * 100_000_000).contains(&value) {
        return Err(VmError::invalid_argument(
            "GasPerBlock must be within [0, 10 GAS]".to_string(),
        ));
    }
    require_committee(host)?;
    host.storage_put(ID, &[PREFIX_GAS_PER_BLOCK], &StorageItem::from_int(&BigInt::from(value)).value)?;
    Ok(None)
}

fn get_register_price(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_int(register_price(host)?)))
}

fn set_register_price(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let value = super::arg_i64(&args, 0)?;
    if value <= 0 {
        return Err(VmError::invalid_argument("RegisterPrice must be positive"));
    }
    require_committee(host)?;
    host.storage_put(ID, &[PREFIX_REGISTER_PRICE], &StorageItem::from_int(&BigInt::from(value)).value)?;
    Ok(None)
}

/// OnPersist: refresh the stored committee from the live vote standings.
fn on_persist(host: &mut EngineHost, _: &mut ExecutionEngine) -> VmResult<()> {
    let keys = compute_committee(host)?;
    store_committee(host, &keys)
}

/// PostPersist: the committee member in rotation collects its share of
/// the generated GAS.
fn post_persist(host: &mut EngineHost, _: &mut ExecutionEngine) -> VmResult<()> {
    let keys = committee(host)?;
    if keys.is_empty() {
        return Ok(());
    }
    let index = host.block_index() as usize % keys.len();
    let member = &keys[index];
    let per_block = gas_per_block(host)?;
    let committee_share: BigInt = BigInt::from(per_block) * (100 - NEO_HOLDER_REWARD_RATIO) / 100
        / keys.len() as i64;
    if committee_share.is_positive() {
        let script = contract_syscalls::standard_account_script(member);
        let account = UInt160::from(hash160(&script));
        super::gas_token::mint(host, &account, &committee_share)?;
    }
    Ok(())
}

/// Genesis allocation; accumulates across allocation entries.
pub fn initialize(snapshot: &mut DataCache, recipient: &UInt160, amount: i64) {
    let key = StorageKey::with_prefix(ID, PREFIX_ACCOUNT, recipient.as_bytes()).to_bytes();
    let mut state = snapshot
        .get(&key)
        .map(|bytes| NeoAccountState::from_bytes(&bytes))
        .unwrap_or_default();
    state.balance += amount;
    snapshot.put(&key, &state.to_bytes());
    let supply_key = StorageKey::with_prefix(ID, PREFIX_TOTAL_SUPPLY, &[]).to_bytes();
    let supply = snapshot
        .get(&supply_key)
        .map(|value| StorageItem::new(value).as_int())
        .unwrap_or_else(BigInt::zero)
        + amount;
    snapshot.put(&supply_key, &StorageItem::from_int(&supply).value);
}

const NO_PARAMS: &[(&str, &str)] = &[];

/// Builds the NeoToken table.
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
            name: "getAccountState",
            parameters: 1,
            parameter_defs: &[("account", "Hash160")],
            return_type: "Array",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_account_state,
        },
        NativeMethod {
            name: "getCandidates",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Array",
            cpu_fee: 1 << 22,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_candidates,
        },
        NativeMethod {
            name: "getCommittee",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Array",
            cpu_fee: 1 << 16,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_committee,
        },
        NativeMethod {
            name: "getCommitteeAddress",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Hash160",
            cpu_fee: 1 << 16,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: Some(neo_core::Hardfork::Cockatrice),
            deprecated_in: None,
            handler: get_committee_address,
        },
        NativeMethod {
            name: "getGasPerBlock",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_gas_per_block,
        },
        NativeMethod {
            name: "getNextBlockValidators",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Array",
            cpu_fee: 1 << 16,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_next_block_validators,
        },
        NativeMethod {
            name: "getRegisterPrice",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_register_price,
        },
        NativeMethod {
            name: "registerCandidate",
            parameters: 1,
            parameter_defs: &[("pubkey", "PublicKey")],
            return_type: "Boolean",
            cpu_fee: 0,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: register_candidate,
        },
        NativeMethod {
            name: "setGasPerBlock",
            parameters: 1,
            parameter_defs: &[("gasPerBlock", "Integer")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: set_gas_per_block,
        },
        NativeMethod {
            name: "setRegisterPrice",
            parameters: 1,
            parameter_defs: &[("registerPrice", "Integer")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: set_register_price,
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
        NativeMethod {
            name: "unclaimedGas",
            parameters: 2,
            parameter_defs: &[("account", "Hash160"), ("end", "Integer")],
            return_type: "Integer",
            cpu_fee: 1 << 17,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: unclaimed_gas,
        },
        NativeMethod {
            name: "unregisterCandidate",
            parameters: 1,
            parameter_defs: &[("pubkey", "PublicKey")],
            return_type: "Boolean",
            cpu_fee: 1 << 16,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: unregister_candidate,
        },
        NativeMethod {
            name: "vote",
            parameters: 2,
            parameter_defs: &[("account", "Hash160"), ("voteTo", "PublicKey")],
            return_type: "Boolean",
            cpu_fee: 1 << 16,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: vote,
        },
    ];

    NativeContract {
        id: ID,
        name: "NeoToken",
        hash: hash(),
        active_in: None,
        supported_standards: &["NEP-17"],
        methods,
        events: vec![
            NativeEvent {
                name: "CandidateStateChanged",
                parameters: &[
                    ("pubkey", "PublicKey"),
                    ("registered", "Boolean"),
                    ("votes", "Integer"),
                ],
                active_in: None,
                deprecated_in: None,
            },
            NativeEvent {
                name: "Transfer",
                parameters: &[("from", "Hash160"), ("to", "Hash160"), ("amount", "Integer")],
                active_in: None,
                deprecated_in: None,
            },
            NativeEvent {
                name: "Vote",
                parameters: &[
                    ("account", "Hash160"),
                    ("from", "PublicKey"),
                    ("to", "PublicKey"),
                    ("amount", "Integer"),
                ],
                active_in: None,
                deprecated_in: None,
            },
        ],
        on_persist: Some(on_persist),
        post_persist: Some(post_persist),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_state_round_trip() {
        let state = NeoAccountState {
            balance: BigInt::from(12345),
            balance_height: 77,
            vote_to: Some(vec![2u8; 33]),
        };
        let parsed = NeoAccountState::from_bytes(&state.to_bytes());
        assert_eq!(parsed.balance, state.balance);
        assert_eq!(parsed.balance_height, 77);
        assert_eq!(parsed.vote_to, state.vote_to);

        let plain = NeoAccountState {
            balance: BigInt::from(1),
            balance_height: 0,
            vote_to: None,
        };
        assert_eq!(NeoAccountState::from_bytes(&plain.to_bytes()).vote_to, None);
    }
}
