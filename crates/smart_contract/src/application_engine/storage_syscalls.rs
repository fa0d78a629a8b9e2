//! System.Storage.* syscall handlers.

use super::EngineHost;
use crate::storage::{
    FindOptions, StorageContext, StorageIterator, MAX_STORAGE_KEY_SIZE, MAX_STORAGE_VALUE_SIZE,
};
use neo_persistence::SeekDirection;
use neo_vm::{ExecutionEngine, StackItem, VmError, VmResult};
use num_traits::ToPrimitive;

/// The interop name storage contexts travel under.
pub const CONTEXT_INTERFACE: &str = "StorageContext";
/// The interop name iterators travel under.
pub const ITERATOR_INTERFACE: &str = "StorageIterator";

/// Resolves the current contract's storage id.
fn current_contract_id(host: &EngineHost) -> VmResult<i32> {
    let hash = host.current_script_hash()?;
    let contract = host
        .get_contract(&hash)?
        .ok_or_else(|| VmError::ContractNotFound(hash.to_string()))?;
    Ok(contract.id)
}

fn pop_context(engine: &mut ExecutionEngine) -> VmResult<StorageContext> {
    let item = engine.pop()?;
    let StackItem::InteropInterface(handle) = &item else {
        return Err(item.type_mismatch("InteropInterface"));
    };
    handle
        .with_value::<StorageContext, _>(|context| *context)
        .ok_or_else(|| VmError::invalid_argument("not a storage context"))
}

fn push_context(engine: &mut ExecutionEngine, context: StorageContext) -> VmResult<()> {
    engine.push(StackItem::from_interop(CONTEXT_INTERFACE, context))
}

pub fn get_context(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let id = current_contract_id(host)?;
    push_context(engine, StorageContext::new(id))
}

pub fn get_read_only_context(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let id = current_contract_id(host)?;
    push_context(engine, StorageContext::new(id).as_read_only())
}

pub fn as_read_only(_host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let context = pop_context(engine)?;
    push_context(engine, context.as_read_only())
}

pub fn get(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let context = pop_context(engine)?;
    let key = engine.pop()?.as_bytes()?;
    match host.storage_get(context.id, &key)? {
        Some(value) => engine.push(StackItem::from_byte_string(value)),
        None => engine.push(StackItem::Null),
    }
}

pub fn put(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let context = pop_context(engine)?;
    if context.is_read_only {
        return Err(VmError::PermissionDenied(
            "storage context is read-only".into(),
        ));
    }
    let key = engine.pop()?.as_bytes()?;
    let value = engine.pop()?.as_bytes()?;
    if key.len() > MAX_STORAGE_KEY_SIZE {
        return Err(VmError::invalid_argument(format!(
            "storage key exceeds {MAX_STORAGE_KEY_SIZE} bytes"
        )));
    }
    if value.len() > MAX_STORAGE_VALUE_SIZE {
        return Err(VmError::invalid_argument(format!(
            "storage value exceeds {MAX_STORAGE_VALUE_SIZE} bytes"
        )));
    }

    // New bytes are billed at the storage price; shrinking writes pay for
    // one byte.
    let existing = host.storage_get(context.id, &key)?;
    let billable = match &existing {
        None => key.len() + value.len(),
        Some(old) if value.len() > old.len() => value.len() - old.len(),
        Some(_) => 1,
    };
    host.add_gas(billable as i64 * host.storage_price)?;
    host.storage_put(context.id, &key, &value)
}

pub fn delete(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let context = pop_context(engine)?;
    if context.is_read_only {
        return Err(VmError::PermissionDenied(
            "storage context is read-only".into(),
        ));
    }
    let key = engine.pop()?.as_bytes()?;
    host.storage_delete(context.id, &key)
}

pub fn find(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let context = pop_context(engine)?;
    let prefix = engine.pop()?.as_bytes()?;
    let options_bits = engine.pop_int()?;
    let options_bits = options_bits
        .to_u8()
        .ok_or_else(|| VmError::invalid_argument("find options out of range"))?;
    let options = FindOptions::from_bits(options_bits)
        .ok_or_else(|| VmError::invalid_argument("undefined find options"))?;
    if !options.is_valid() {
        return Err(VmError::invalid_argument(
            "inconsistent find options".to_string(),
        ));
    }
    let direction = if options.contains(FindOptions::BACKWARDS) {
        SeekDirection::Backward
    } else {
        SeekDirection::Forward
    };
    let entries = host.storage_find(context.id, &prefix, direction)?;
    let iterator = StorageIterator::new(entries, prefix.len(), options);
    engine.push(StackItem::from_interop(ITERATOR_INTERFACE, iterator))
}

/// Projects one found entry per the iterator's options. Used by
/// `System.Iterator.Value`.
pub fn project_found_entry(
    key: Vec<u8>,
    value: Vec<u8>,
    options: FindOptions,
) -> VmResult<StackItem> {
    if options.contains(FindOptions::KEYS_ONLY) {
        return Ok(StackItem::from_byte_string(key));
    }
    let value_item = if options.contains(FindOptions::DESERIALIZE_VALUES) {
        let item = crate::binary_serializer::deserialize(
            &value,
            crate::binary_serializer::DEFAULT_MAX_SIZE,
        )
        .map_err(|e| VmError::invalid_argument(e.to_string()))?;
        if options.contains(FindOptions::PICK_FIELD0) || options.contains(FindOptions::PICK_FIELD1)
        {
            let index = usize::from(options.contains(FindOptions::PICK_FIELD1));
            match &item {
                StackItem::Array(array) if array.len() > index => array.borrow()[index].clone(),
                StackItem::Struct(structure) if structure.len() > index => {
                    structure.borrow()[index].clone()
                }
                _ => {
                    return Err(VmError::invalid_argument(
                        "picked field is out of range".to_string(),
                    ))
                }
            }
        } else {
            item
        }
    } else {
        StackItem::from_byte_string(value)
    };
    if options.contains(FindOptions::VALUES_ONLY) {
        return Ok(value_item);
    }
    Ok(StackItem::from_struct(vec![
        StackItem::from_byte_string(key),
        value_item,
    ]))
}

