//! OracleContract (-9): oracle requests and response callbacks.

use super::{arg, arg_i64, arg_string, arg_uint160, require_committee, NativeContract, NativeEvent, NativeMethod};
use crate::application_engine::{contract_syscalls, EngineHost};
use crate::storage::StorageItem;
use neo_core::{OracleResponseCode, TransactionAttribute, UInt160, UInt256};
use neo_cryptography::hash160;
use neo_io::{BinaryReader, BinaryWriter};
use neo_vm::{CallFlags, ExecutionEngine, StackItem, VmError, VmResult};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Contract id.
pub const ID: i32 = -9;

pub const PREFIX_PRICE: u8 = 5;
pub const PREFIX_ID_LIST: u8 = 6;
pub const PREFIX_REQUEST: u8 = 7;
pub const PREFIX_REQUEST_ID: u8 = 9;

pub const MAX_URL_LENGTH: usize = 256;
pub const MAX_FILTER_LENGTH: usize = 128;
pub const MAX_CALLBACK_LENGTH: usize = 32;
pub const MAX_USER_DATA_LENGTH: usize = 512;
/// Minimum GAS attached for the response, in datoshi.
pub const MIN_RESPONSE_GAS: i64 = 10_000_000;
/// Default request price, in datoshi.
pub const DEFAULT_PRICE: i64 = 50_000_000;

/// The OracleContract hash.
pub fn hash() -> UInt160 {
    super::native_hash("OracleContract")
}

/// One pending oracle request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleRequest {
    pub original_tx: UInt256,
    pub gas_for_response: i64,
    pub url: String,
    pub filter: Option<String>,
    pub callback_contract: UInt160,
    pub callback_method: String,
    pub user_data: Vec<u8>,
}

impl OracleRequest {
    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BinaryWriter::new();
        writer.write_bytes(self.original_tx.as_bytes());
        writer.write_i64(self.gas_for_response);
        writer.write_var_string(&self.url);
        match &self.filter {
            Some(filter) => {
                writer.write_bool(true);
                writer.write_var_string(filter);
            }
            None => writer.write_bool(false),
        }
        writer.write_bytes(self.callback_contract.as_bytes());
        writer.write_var_string(&self.callback_method);
        writer.write_var_bytes(&self.user_data);
        writer.into_bytes()
    }

    fn from_bytes(bytes: &[u8]) -> VmResult<OracleRequest> {
        let read = |reader: &mut BinaryReader<'_>| -> Result<OracleRequest, neo_io::IoError> {
            let original_tx = UInt256::from_bytes(&reader.read_bytes(32)?)
                .map_err(|e| neo_io::IoError::invalid_format(e.to_string()))?;
            let gas_for_response = reader.read_i64()?;
            let url = reader.read_var_string(MAX_URL_LENGTH)?;
            let filter = if reader.read_bool()? {
                Some(reader.read_var_string(MAX_FILTER_LENGTH)?)
            } else {
                None
            };
            let callback_contract = UInt160::from_bytes(&reader.read_bytes(20)?)
                .map_err(|e| neo_io::IoError::invalid_format(e.to_string()))?;
            let callback_method = reader.read_var_string(MAX_CALLBACK_LENGTH)?;
            let user_data = reader.read_var_bytes(MAX_USER_DATA_LENGTH)?;
            Ok(OracleRequest {
                original_tx,
                gas_for_response,
                url,
                filter,
                callback_contract,
                callback_method,
                user_data,
            })
        };
        let mut reader = BinaryReader::new(bytes);
        read(&mut reader)
            .map_err(|e| VmError::invalid_operation(format!("stored oracle request: {e}")))
    }
}

fn request_key(id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(PREFIX_REQUEST);
    key.extend_from_slice(&id.to_le_bytes());
    key
}

fn id_list_key(url: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.push(PREFIX_ID_LIST);
    key.extend_from_slice(&hash160(url.as_bytes()));
    key
}

/// The request fee, in datoshi.
pub fn price(host: &EngineHost) -> VmResult<i64> {
    Ok(host
        .storage_get(ID, &[PREFIX_PRICE])?
        .map(|value| StorageItem::new(value).as_int())
        .and_then(|v| v.to_i64())
        .unwrap_or(DEFAULT_PRICE))
}

fn next_request_id(host: &mut EngineHost) -> VmResult<u64> {
    let current = host
        .storage_get(ID, &[PREFIX_REQUEST_ID])?
        .map(|value| StorageItem::new(value).as_int())
        .and_then(|v| v.to_u64())
        .unwrap_or(0);
    host.storage_put(
        ID,
        &[PREFIX_REQUEST_ID],
        &StorageItem::from_int(&BigInt::from(current + 1)).value,
    )?;
    Ok(current)
}

/// Reads a pending request (test and node hook).
pub fn get_request(host: &EngineHost, id: u64) -> VmResult<Option<OracleRequest>> {
    match host.storage_get(ID, &request_key(id))? {
        None => Ok(None),
        Some(bytes) => OracleRequest::from_bytes(&bytes).map(Some),
    }
}

// Handlers.

fn request(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let url = arg_string(&args, 0)?;
    let filter_item = arg(&args, 1)?;
    let filter = if filter_item.is_null() {
        None
    } else {
        Some(filter_item.as_string()?)
    };
    let callback = arg_string(&args, 2)?;
    let user_data = arg(&args, 3)?.clone();
    let gas_for_response = arg_i64(&args, 4)?;

    if url.len() > MAX_URL_LENGTH {
        return Err(VmError::invalid_argument(format!(
            "url exceeds {MAX_URL_LENGTH} bytes"
        )));
    }
    if let Some(filter) = &filter {
        if filter.len() > MAX_FILTER_LENGTH {
            return Err(VmError::invalid_argument(format!(
                "filter exceeds {MAX_FILTER_LENGTH} bytes"
            )));
        }
    }
    if callback.len() > MAX_CALLBACK_LENGTH {
        return Err(VmError::invalid_argument(format!(
            "callback exceeds {MAX_CALLBACK_LENGTH} bytes"
        )));
    }
    if callback.starts_with('_') {
        return Err(VmError::invalid_argument(
            "callback cannot be a reserved method".to_string(),
        ));
    }
    if gas_for_response < MIN_RESPONSE_GAS {
        return Err(VmError::invalid_argument(format!(
            "response gas must be at least {MIN_RESPONSE_GAS}"
        )));
    }

    host.add_gas(price(host)?)?;
    host.add_gas(gas_for_response)?;

    let user_data = crate::binary_serializer::serialize(&user_data, MAX_USER_DATA_LENGTH)
        .map_err(|e| VmError::invalid_argument(e.to_string()))?;
    let original_tx = host
        .container
        .hash()
        .ok_or_else(|| VmError::invalid_operation("oracle requests need a container"))?;
    let callback_contract = host.calling_script_hash()?;

    let id = next_request_id(host)?;
    let record = OracleRequest {
        original_tx,
        gas_for_response,
        url: url.clone(),
        filter: filter.clone(),
        callback_contract,
        callback_method: callback,
        user_data,
    };
    host.storage_put(ID, &request_key(id), &record.to_bytes())?;

    // Track ids per url for the oracle node set.
    let list_key = id_list_key(&url);
    let mut list = host.storage_get(ID, &list_key)?.unwrap_or_default();
    list.extend_from_slice(&id.to_le_bytes());
    host.storage_put(ID, &list_key, &list)?;

    host.notify(
        hash(),
        "OracleRequest".to_string(),
        vec![
            StackItem::from_int(id as i64),
            StackItem::from_byte_string(callback_contract.to_vec()),
            StackItem::from_byte_string(url.into_bytes()),
            match filter {
                Some(filter) => StackItem::from_byte_string(filter.into_bytes()),
                None => StackItem::Null,
            },
        ],
    )?;
    Ok(None)
}

/// Finishes a request: driven by the oracle response transaction.
fn finish(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let Some(tx) = host.container.as_transaction().cloned() else {
        return Err(VmError::invalid_operation("finish needs a transaction"));
    };
    let Some((id, code, result)) = tx.attributes.iter().find_map(|attribute| match attribute {
        TransactionAttribute::OracleResponse { id, code, result } => {
            Some((*id, *code, result.clone()))
        }
        _ => None,
    }) else {
        return Err(VmError::invalid_operation(
            "finish needs an oracle response attribute",
        ));
    };

    let Some(request) = get_request(host, id)? else {
        return Err(VmError::invalid_operation(format!(
            "unknown oracle request {id}"
        )));
    };
    host.storage_delete(ID, &request_key(id))?;
    let list_key = id_list_key(&request.url);
    if let Some(list) = host.storage_get(ID, &list_key)? {
        let remaining: Vec<u8> = list
            .chunks_exact(8)
            .filter(|chunk| {
                u64::from_le_bytes([
                    chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
                ]) != id
            })
            .flatten()
            .copied()
            .collect();
        if remaining.is_empty() {
            host.storage_delete(ID, &list_key)?;
        } else {
            host.storage_put(ID, &list_key, &remaining)?;
        }
    }

    host.notify(
        hash(),
        "OracleResponse".to_string(),
        vec![
            StackItem::from_int(id as i64),
            StackItem::from_byte_string(request.original_tx.to_vec()),
        ],
    )?;

    let user_data =
        crate::binary_serializer::deserialize(&request.user_data, MAX_USER_DATA_LENGTH)
            .map_err(|e| VmError::invalid_operation(e.to_string()))?;
    contract_syscalls::call_contract(
        host,
        engine,
        &request.callback_contract,
        &request.callback_method,
        CallFlags::ALL,
        vec![
            StackItem::from_byte_string(request.url.into_bytes()),
            user_data,
            StackItem::from_int(i64::from(code as u8)),
            StackItem::from_byte_string(result),
        ],
    )?;
    Ok(None)
}

fn get_price(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    Ok(Some(StackItem::from_int(price(host)?)))
}

fn set_price(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let value = arg_i64(&args, 0)?;
    if value <= 0 {
        return Err(VmError::invalid_argument("price must be positive"));
    }
    require_committee(host)?;
    host.storage_put(
        ID,
        &[PREFIX_PRICE],
        &StorageItem::from_int(&BigInt::from(value)).value,
    )?;
    Ok(None)
}

/// An oracle response transaction verifies by carrying the attribute for a
/// known request.
fn verify(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    _: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let Some(tx) = host.container.as_transaction() else {
        return Ok(Some(StackItem::from_bool(false)));
    };
    let id = tx.attributes.iter().find_map(|attribute| match attribute {
        TransactionAttribute::OracleResponse { id, .. } => Some(*id),
        _ => None,
    });
    match id {
        None => Ok(Some(StackItem::from_bool(false))),
        Some(id) => Ok(Some(StackItem::from_bool(get_request(host, id)?.is_some()))),
    }
}

const NO_PARAMS: &[(&str, &str)] = &[];

/// Builds the OracleContract table.
pub fn contract() -> NativeContract {
    let methods = vec![
        NativeMethod {
            name: "finish",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Void",
            cpu_fee: 0,
            storage_fee: 0,
            required_flags: CallFlags::STATES
                .union(CallFlags::ALLOW_CALL)
                .union(CallFlags::ALLOW_NOTIFY),
            active_in: None,
            deprecated_in: None,
            handler: finish,
        },
        NativeMethod {
            name: "getPrice",
            parameters: 0,
            parameter_defs: NO_PARAMS,
            return_type: "Integer",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_price,
        },
        NativeMethod {
            name: "request",
            parameters: 5,
            parameter_defs: &[
                ("url", "String"),
                ("filter", "String"),
                ("callback", "String"),
                ("userData", "Any"),
                ("gasForResponse", "Integer"),
            ],
            return_type: "Void",
            cpu_fee: 0,
            storage_fee: 0,
            required_flags: CallFlags::STATES.union(CallFlags::ALLOW_NOTIFY),
            active_in: None,
            deprecated_in: None,
            handler: request,
        },
        NativeMethod {
            name: "setPrice",
            parameters: 1,
            parameter_defs: &[("price", "Integer")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES,
            active_in: None,
            deprecated_in: None,
            handler: set_price,
        },
        NativeMethod {
            name: "verify",
            parameters: 0,
            parameter_defs: NO_PARAMS,
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
        name: "OracleContract",
        hash: hash(),
        active_in: None,
        supported_standards: &[],
        methods,
        events: vec![
            NativeEvent {
                name: "OracleRequest",
                parameters: &[
                    ("Id", "Integer"),
                    ("RequestContract", "Hash160"),
                    ("Url", "String"),
                    ("Filter", "String"),
                ],
                active_in: None,
                deprecated_in: None,
            },
            NativeEvent {
                name: "OracleResponse",
                parameters: &[("Id", "Integer"), ("OriginalTx", "Hash256")],
                active_in: None,
                deprecated_in: None,
            },
        ],
        on_persist: None,
        post_persist: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_record_round_trip() {
        let record = OracleRequest {
            original_tx: UInt256::from([7u8; 32]),
            gas_for_response: 10_000_000,
            url: "https://example.org/data".into(),
            filter: Some("$.price".into()),
            callback_contract: UInt160::from([9u8; 20]),
            callback_method: "onOracle".into(),
            user_data: vec![0x00],
        };
        assert_eq!(OracleRequest::from_bytes(&record.to_bytes()).unwrap(), record);
    }
}
