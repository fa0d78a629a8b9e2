//! ContractManagement (-1): deploy, update and destroy contracts.

use super::{arg, arg_bytes, arg_i64, arg_string, arg_uint160, require_committee, NativeContract, NativeEvent, NativeMethod};
use crate::application_engine::{contract_syscalls, EngineHost};
use crate::contract_state::{ContractState, NefFile};
use crate::manifest::ContractManifest;
use crate::storage::{StorageItem, StorageKey};
use neo_core::UInt160;
use neo_io::Serializable;
use neo_persistence::SeekDirection;
use neo_vm::{CallFlags, ExecutionEngine, Script, StackItem, VmError, VmResult};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Contract id.
pub const ID: i32 = -1;

pub const PREFIX_CONTRACT: u8 = 8;
pub const PREFIX_CONTRACT_HASH: u8 = 12;
pub const PREFIX_NEXT_AVAILABLE_ID: u8 = 15;
pub const PREFIX_MINIMUM_DEPLOYMENT_FEE: u8 = 20;

pub const DEFAULT_MINIMUM_DEPLOYMENT_FEE: i64 = 10 * 100_000_000;

/// The ContractManagement hash.
pub fn hash() -> UInt160 {
    super::native_hash("ContractManagement")
}

fn contract_key(hash: &UInt160) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(PREFIX_CONTRACT);
    key.extend_from_slice(hash.as_bytes());
    key
}

fn id_key(id: i32) -> Vec<u8> {
    let mut key = Vec::with_capacity(5);
    key.push(PREFIX_CONTRACT_HASH);
    key.extend_from_slice(&id.to_le_bytes());
    key
}

/// Reads a deployed contract by hash.
pub fn get_contract(host: &EngineHost, hash: &UInt160) -> VmResult<Option<ContractState>> {
    match host.storage_get(ID, &contract_key(hash))? {
        None => Ok(None),
        Some(bytes) => ContractState::from_storage_bytes(&bytes)
            .map(Some)
            .map_err(|e| VmError::invalid_operation(e.to_string())),
    }
}

fn put_contract(host: &mut EngineHost, state: &ContractState) -> VmResult<()> {
    let bytes = state
        .to_storage_bytes()
        .map_err(|e| VmError::invalid_operation(e.to_string()))?;
    host.storage_put(ID, &contract_key(&state.hash), &bytes)?;
    host.storage_put(ID, &id_key(state.id), state.hash.as_bytes())
}

fn next_available_id(host: &mut EngineHost) -> VmResult<i32> {
    let current = host
        .storage_get(ID, &[PREFIX_NEXT_AVAILABLE_ID])?
        .map(|value| StorageItem::new(value).as_int())
        .and_then(|v| v.to_i32())
        .unwrap_or(1);
    host.storage_put(
        ID,
        &[PREFIX_NEXT_AVAILABLE_ID],
        &StorageItem::from_int(&BigInt::from(current + 1)).value,
    )?;
    Ok(current)
}

fn minimum_deployment_fee(host: &EngineHost) -> VmResult<i64> {
    Ok(host
        .storage_get(ID, &[PREFIX_MINIMUM_DEPLOYMENT_FEE])?
        .map(|value| StorageItem::new(value).as_int())
        .and_then(|v| v.to_i64())
        .unwrap_or(DEFAULT_MINIMUM_DEPLOYMENT_FEE))
}

/// Every group signature must cover the contract hash.
fn check_group_signatures(manifest: &ContractManifest, hash: &UInt160) -> VmResult<()> {
    use base64::Engine as _;
    for group in &manifest.groups {
        let Some(public_key) = group.public_key_bytes() else {
            return Err(VmError::invalid_argument("malformed group key"));
        };
        let signature = base64::engine::general_purpose::STANDARD
            .decode(&group.signature)
            .map_err(|_| VmError::invalid_argument("malformed group signature"))?;
        let valid = neo_cryptography::verify_ecdsa(
            hash.as_bytes(),
            &public_key,
            &signature,
            neo_cryptography::EcCurve::Secp256r1,
            neo_cryptography::HashKind::Sha256,
        );
        if !valid {
            return Err(VmError::invalid_argument(format!(
                "group signature of {} does not cover the contract",
                group.public_key
            )));
        }
    }
    Ok(())
}

/// Runs a freshly deployed or updated contract's `_deploy` callback.
fn deploy_callback(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    state: &ContractState,
    data: StackItem,
    update: bool,
) -> VmResult<()> {
    let Some(method) = state.manifest.abi.get_method("_deploy", 2) else {
        return Ok(());
    };
    contract_syscalls::load_frame(
        host,
        engine,
        Script::new(state.nef.script.clone()),
        method.offset as usize,
        0,
        state.hash,
        Some(hash()),
        CallFlags::ALL,
        vec![data, StackItem::from_bool(update)],
        false,
    )
}

// Handlers.

fn deploy_with(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    nef_bytes: Vec<u8>,
    manifest_bytes: Vec<u8>,
    data: StackItem,
) -> VmResult<Option<StackItem>> {
    let nef = NefFile::from_bytes(&nef_bytes)
        .map_err(|e| VmError::invalid_argument(e.to_string()))?;
    nef.validate()
        .map_err(|e| VmError::invalid_argument(e.to_string()))?;
    let manifest = ContractManifest::from_json(&manifest_bytes)
        .map_err(|e| VmError::invalid_argument(e.to_string()))?;

    let fee = std::cmp::max(
        minimum_deployment_fee(host)?,
        host.storage_price * (nef_bytes.len() + manifest_bytes.len()) as i64,
    );
    host.add_gas(fee)?;

    let sender = host
        .container
        .as_transaction()
        .map(|tx| tx.sender())
        .ok_or_else(|| VmError::invalid_operation("deploy needs a transaction sender"))?;
    let contract_hash = ContractState::compute_hash(&sender, nef.checksum, &manifest.name);
    if super::registry().by_hash(&contract_hash).is_some()
        || get_contract(host, &contract_hash)?.is_some()
    {
        return Err(VmError::invalid_operation(format!(
            "contract {contract_hash} already exists"
        )));
    }
    check_group_signatures(&manifest, &contract_hash)?;

    let state = ContractState {
        id: next_available_id(host)?,
        update_counter: 0,
        hash: contract_hash,
        nef,
        manifest,
    };
    put_contract(host, &state)?;
    host.notify(
        hash(),
        "Deploy".to_string(),
        vec![StackItem::from_byte_string(contract_hash.to_vec())],
    )?;
    deploy_callback(host, engine, &state, data, false)?;
    Ok(Some(project_contract(&state)?))
}

fn deploy2(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let nef = arg_bytes(&args, 0)?;
    let manifest = arg_bytes(&args, 1)?;
    deploy_with(host, engine, nef, manifest, StackItem::Null)
}

fn deploy3(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let nef = arg_bytes(&args, 0)?;
    let manifest = arg_bytes(&args, 1)?;
    let data = arg(&args, 2)?.clone();
    deploy_with(host, engine, nef, manifest, data)
}

fn update_with(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    nef_bytes: Option<Vec<u8>>,
    manifest_bytes: Option<Vec<u8>>,
    data: StackItem,
) -> VmResult<Option<StackItem>> {
    // Contracts update themselves: the caller is the subject.
    let target = host.calling_script_hash()?;
    let mut state = get_contract(host, &target)?
        .ok_or_else(|| VmError::ContractNotFound(target.to_string()))?;
    if nef_bytes.is_none() && manifest_bytes.is_none() {
        return Err(VmError::invalid_argument("nothing to update"));
    }
    let fee_basis =
        nef_bytes.as_ref().map(|b| b.len()).unwrap_or(0) + manifest_bytes.as_ref().map(|b| b.len()).unwrap_or(0);
    host.add_gas(host.storage_price * fee_basis as i64)?;

    if let Some(bytes) = nef_bytes {
        let nef = NefFile::from_bytes(&bytes)
            .map_err(|e| VmError::invalid_argument(e.to_string()))?;
        nef.validate()
            .map_err(|e| VmError::invalid_argument(e.to_string()))?;
        state.nef = nef;
    }
    if let Some(bytes) = manifest_bytes {
        let manifest = ContractManifest::from_json(&bytes)
            .map_err(|e| VmError::invalid_argument(e.to_string()))?;
        if manifest.name != state.manifest.name {
            return Err(VmError::invalid_argument("contract name cannot change"));
        }
        check_group_signatures(&manifest, &state.hash)?;
        state.manifest = manifest;
    }
    state.update_counter += 1;
    put_contract(host, &state)?;
    host.notify(
        hash(),
        "Update".to_string(),
        vec![StackItem::from_byte_string(state.hash.to_vec())],
    )?;
    deploy_callback(host, engine, &state, data, true)?;
    Ok(None)
}

fn update2(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let nef = optional_bytes(&args, 0)?;
    let manifest = optional_bytes(&args, 1)?;
    update_with(host, engine, nef, manifest, StackItem::Null)
}

fn update3(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let nef = optional_bytes(&args, 0)?;
    let manifest = optional_bytes(&args, 1)?;
    let data = arg(&args, 2)?.clone();
    update_with(host, engine, nef, manifest, data)
}

fn optional_bytes(args: &[StackItem], index: usize) -> VmResult<Option<Vec<u8>>> {
    let item = arg(args, index)?;
    if item.is_null() {
        Ok(None)
    } else {
        Ok(Some(item.as_bytes()?))
    }
}

fn destroy(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let target = host.calling_script_hash()?;
    let Some(state) = get_contract(host, &target)? else {
        return Ok(None);
    };
    host.storage_delete(ID, &contract_key(&target))?;
    host.storage_delete(ID, &id_key(state.id))?;
    // Wipe the contract's own storage namespace.
    let keys: Vec<Vec<u8>> = host
        .storage_find(state.id, &[], SeekDirection::Forward)?
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    for key in keys {
        host.storage_delete(state.id, &key)?;
    }
    host.notify(
        hash(),
        "Destroy".to_string(),
        vec![StackItem::from_byte_string(target.to_vec())],
    )?;
    Ok(None)
}

fn get_contract_method(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let target = arg_uint160(&args, 0)?;
    match host.get_contract(&target)? {
        None => Ok(Some(StackItem::Null)),
        Some(state) => Ok(Some(project_contract(&state)?)),
    }
}

fn get_contract_by_id(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let id = arg_i64(&args, 0)? as i32;
    if id < 0 {
        let state = super::registry()
            .by_id(id)
            .map(|native| native.contract_state(&host.settings, host.block_index()));
        return match state {
            Some(state) => Ok(Some(project_contract(&state)?)),
            None => Ok(Some(StackItem::Null)),
        };
    }
    match host.storage_get(ID, &id_key(id))? {
        None => Ok(Some(StackItem::Null)),
        Some(hash_bytes) => {
            let target = UInt160::from_bytes(&hash_bytes)
                .map_err(|e| VmError::invalid_operation(e.to_string()))?;
            match host.get_contract(&target)? {
                None => Ok(Some(StackItem::Null)),
                Some(state) => Ok(Some(project_contract(&state)?)),
            }
        }
    }
}

fn get_contract_hashes(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let entries: Vec<StackItem> = host
        .storage_find(ID, &[PREFIX_CONTRACT_HASH], SeekDirection::Forward)?
        .into_iter()
        .map(|(key, value)| {
            StackItem::from_struct(vec![
                StackItem::from_byte_string(key[1..].to_vec()),
                StackItem::from_byte_string(value),
            ])
        })
        .collect();
    Ok(Some(StackItem::from_array(entries)))
}

fn has_method(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let target = arg_uint160(&args, 0)?;
    let method = arg_string(&args, 1)?;
    let parameter_count = arg_i64(&args, 2)?;
    let result = host
        .get_contract(&target)?
        .map(|state| {
            if parameter_count < 0 {
                state.manifest.abi.has_method(&method)
            } else {
                state
                    .manifest
                    .abi
                    .get_method(&method, parameter_count as usize)
                    .is_some()
            }
        })
        .unwrap_or(false);
    Ok(Some(StackItem::from_bool(result)))
}

fn get_minimum_deployment_fee(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_int(minimum_deployment_fee(host)?)))
}

fn set_minimum_deployment_fee(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let value = arg_i64(&args, 0)?;
    if value < 0 {
        return Err(VmError::invalid_argument("fee cannot be negative"));
    }
    require_committee(host)?;
    host.storage_put(
        ID,
        &[PREFIX_MINIMUM_DEPLOYMENT_FEE],
        &StorageItem::from_int(&BigInt::from(value)).value,
    )?;
    Ok(None)
}

fn project_contract(state: &ContractState) -> VmResult<StackItem> {
    Ok(StackItem::from_struct(vec![
        StackItem::from_int(i64::from(state.id)),
        StackItem::from_int(i64::from(state.update_counter)),
        StackItem::from_byte_string(state.hash.to_vec()),
        StackItem::from_byte_string(
            state
                .nef
                .to_bytes()
                .map_err(|e| VmError::invalid_operation(e.to_string()))?,
        ),
        StackItem::from_byte_string(state.manifest.to_json()),
    ]))
}

const NO_PARAMS: &[(&str, &str)] = &[];

/// Builds the ContractManagement table.
pub fn contract() -> NativeContract {
    let methods = vec![
        NativeMethod {
            name: "deploy",
            parameters: 2,
            parameter_defs: &[("nefFile", "ByteArray"), ("manifest", "ByteArray")],
            return_type: "Array",
            cpu_fee: 0,
            storage_fee: 0,
            required_flags: CallFlags::ALL,
            active_in: None,
            deprecated_in: None,
            handler: deploy2,
        },
        NativeMethod {
            name: "deploy",
            parameters: 3,
            parameter_defs: &[
                ("nefFile", "ByteArray"),
                ("manifest", "ByteArray"),
                ("data", "Any"),
            ],
            return_type: "Array",
            cpu_fee: 0,
            storage_fee: 0,
            required_flags: CallFlags::ALL,
            active_in: None,
            deprecated_in: None,
            handler: deploy3,
        },
        NativeMethod {
            name: "destroy",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES.union(CallFlags::ALLOW_NOTIFY),
            active_in: None,
            deprecated_in: None,
            handler: destroy,
        },
        NativeMethod {
            name: "getContract",
            parameters: 1,
            parameter_defs: &[("hash", "Hash160")],
            return_type: "Array",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_contract_method,
        },
        NativeMethod {
            name: "getContractById",
            parameters: 1,
            parameter_defs: &[("id", "Integer")],
            return_type: "Array",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_contract_by_id,
        },
        NativeMethod {
            name: "getContractHashes",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Array",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_contract_hashes,
        },
        NativeMethod {
            name: "getMinimumDeploymentFee",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_minimum_deployment_fee,
        },
        NativeMethod {
            name: "hasMethod",
            parameters: 3,
            parameter_defs: &[
                ("hash", "Hash160"),
                ("method", "String"),
                ("pcount", "Integer"),
            ],
            return_type: "Boolean",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: has_method,
        },
        NativeMethod {
            name: "setMinimumDeploymentFee",
            parameters: 1,
            parameter_defs: &[("value", "Integer")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: set_minimum_deployment_fee,
        },
        NativeMethod {
            name: "update",
            parameters: 2,
            parameter_defs: &[("nefFile", "ByteArray"), ("manifest", "ByteArray")],
            return_type: "Void",
            cpu_fee: 0,
            storage_fee: 0,
            required_flags: CallFlags::ALL,
            active_in: None,
            deprecated_in: None,
            handler: update2,
        },
        NativeMethod {
            name: "update",
            parameters: 3,
            parameter_defs: &[
                ("nefFile", "ByteArray"),
                ("manifest", "ByteArray"),
                ("data", "Any"),
            ],
            return_type: "Void",
            cpu_fee: 0,
            storage_fee: 0,
            required_flags: CallFlags::ALL,
            active_in: None,
            deprecated_in: None,
            handler: update3,
        },
    ];

    NativeContract {
        id: ID,
        name: "ContractManagement",
        hash: hash(),
        active_in: None,
        supported_standards: &[],
        methods,
        events: vec![
            NativeEvent {
                name: "Deploy",
                parameters: &[("Hash", "Hash160")],
                active_in: None,
                deprecated_in: None,
            },
            NativeEvent {
                name: "Destroy",
                parameters: &[("Hash", "Hash160")],
                active_in: None,
                deprecated_in: None,
            },
            NativeEvent {
                name: "Update",
                parameters: &[("Hash", "Hash160")],
                active_in: None,
                deprecated_in: None,
            },
        ],
        on_persist: None,
        post_persist: None,
    }
}
