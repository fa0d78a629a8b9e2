//! Compound-type instructions (0xBE–0xD4).
//!
//! Handlers that mutate a compound go through the reference counter so
//! containment edges stay in sync with the object graph. Struct values are
//! deep-copied on APPEND/SETITEM, per struct assignment semantics.

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{ArrayItem, MapItem, StackItem, StackItemType, StructItem};
use num_traits::ToPrimitive;

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::PACKMAP, pack_map);
    table.set(OpCode::PACKSTRUCT, pack_struct);
    table.set(OpCode::PACK, pack);
    table.set(OpCode::UNPACK, unpack);
    table.set(OpCode::NEWARRAY0, |engine, _| {
        engine.push(StackItem::from_array(Vec::new()))
    });
    table.set(OpCode::NEWARRAY, new_array);
    table.set(OpCode::NEWARRAY_T, new_array_t);
    table.set(OpCode::NEWSTRUCT0, |engine, _| {
        engine.push(StackItem::from_struct(Vec::new()))
    });
    table.set(OpCode::NEWSTRUCT, new_struct);
    table.set(OpCode::NEWMAP, |engine, _| engine.push(StackItem::new_map()));
    table.set(OpCode::SIZE, size);
    table.set(OpCode::HASKEY, has_key);
    table.set(OpCode::KEYS, keys);
    table.set(OpCode::VALUES, values);
    table.set(OpCode::PICKITEM, pick_item);
    table.set(OpCode::APPEND, append);
    table.set(OpCode::SETITEM, set_item);
    table.set(OpCode::REVERSEITEMS, reverse_items);
    table.set(OpCode::REMOVE, remove);
    table.set(OpCode::CLEARITEMS, clear_items);
    table.set(OpCode::POPITEM, pop_item);
}

fn pop_count(engine: &mut ExecutionEngine, what: &str) -> VmResult<usize> {
    let value = engine.pop_int()?;
    value
        .to_usize()
        .ok_or_else(|| VmError::invalid_argument(format!("negative {what}: {value}")))
}

fn stack_len(engine: &ExecutionEngine) -> VmResult<usize> {
    Ok(engine
        .current_context()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?
        .evaluation_stack()
        .len())
}

fn pack_map(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let size = pop_count(engine, "map size")?;
    if size * 2 > stack_len(engine)? {
        return Err(VmError::invalid_argument(format!("invalid map size {size}")));
    }
    let map = MapItem::new();
    for _ in 0..size {
        let key = engine.pop()?;
        if !key.item_type().is_primitive() {
            return Err(key.type_mismatch("primitive map key"));
        }
        let value = engine.pop()?;
        map.borrow_mut().insert(key, value)?;
    }
    engine.push(StackItem::Map(map))
}

fn pack_struct(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let size = pop_count(engine, "struct size")?;
    if size > stack_len(engine)? {
        return Err(VmError::invalid_argument(format!(
            "invalid struct size {size}"
        )));
    }
    let mut items = Vec::with_capacity(size);
    for _ in 0..size {
        items.push(engine.pop()?);
    }
    engine.push(StackItem::Struct(StructItem::new(items)))
}

fn pack(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let size = pop_count(engine, "array size")?;
    if size > stack_len(engine)? {
        return Err(VmError::invalid_argument(format!(
            "invalid array size {size}"
        )));
    }
    let mut items = Vec::with_capacity(size);
    for _ in 0..size {
        items.push(engine.pop()?);
    }
    engine.push(StackItem::Array(ArrayItem::new(items)))
}

fn unpack(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let compound = engine.pop()?;
    match &compound {
        StackItem::Map(map) => {
            let entries = map.borrow().entries().to_vec();
            for (key, value) in entries.iter().rev() {
                engine.push(value.clone())?;
                engine.push(key.clone())?;
            }
            engine.push(StackItem::from_int(entries.len() as i64))
        }
        StackItem::Array(array) => {
            let items = array.borrow().clone();
            for item in items.iter().rev() {
                engine.push(item.clone())?;
            }
            engine.push(StackItem::from_int(items.len() as i64))
        }
        StackItem::Struct(structure) => {
            let items = structure.borrow().clone();
            for item in items.iter().rev() {
                engine.push(item.clone())?;
            }
            engine.push(StackItem::from_int(items.len() as i64))
        }
        other => Err(other.type_mismatch("Array, Struct or Map")),
    }
}

fn new_sized(engine: &mut ExecutionEngine, what: &str) -> VmResult<usize> {
    let n = pop_count(engine, what)?;
    if n > engine.limits().max_stack_size {
        return Err(VmError::LimitExceeded {
            what: "array size",
            value: n,
            limit: engine.limits().max_stack_size,
        });
    }
    Ok(n)
}

fn new_array(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let n = new_sized(engine, "array size")?;
    engine.push(StackItem::from_array(vec![StackItem::Null; n]))
}

fn new_struct(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let n = new_sized(engine, "struct size")?;
    engine.push(StackItem::from_struct(vec![StackItem::Null; n]))
}

fn new_array_t(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let n = new_sized(engine, "array size")?;
    let item_type = StackItemType::from_byte(instruction.token_u8())?;
    // Each slot gets a freshly materialized default so aliased defaults
    // can never leak into mutation paths.
    let mut items = Vec::with_capacity(n);
    for _ in 0..n {
        items.push(match item_type {
            StackItemType::Boolean => StackItem::from_bool(false),
            StackItemType::Integer => StackItem::from_int(0),
            StackItemType::ByteString => StackItem::from_byte_string(Vec::new()),
            _ => StackItem::Null,
        });
    }
    engine.push(StackItem::from_array(items))
}

fn size(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    let length = match &item {
        StackItem::Array(array) => array.len(),
        StackItem::Struct(structure) => structure.len(),
        StackItem::Map(map) => map.len(),
        StackItem::Buffer(buffer) => buffer.len(),
        StackItem::ByteString(bytes) => bytes.len(),
        StackItem::Boolean(_) | StackItem::Integer(_) => item.as_bytes()?.len(),
        other => return Err(other.type_mismatch("sized item")),
    };
    engine.push(StackItem::from_int(length as i64))
}

fn has_key(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let key = engine.pop()?;
    let item = engine.pop()?;
    let result = match &item {
        StackItem::Array(array) => index_of(&key)?.map(|i| i < array.len()).unwrap_or(false),
        StackItem::Struct(structure) => {
            index_of(&key)?.map(|i| i < structure.len()).unwrap_or(false)
        }
        StackItem::Buffer(buffer) => index_of(&key)?.map(|i| i < buffer.len()).unwrap_or(false),
        StackItem::ByteString(bytes) => index_of(&key)?.map(|i| i < bytes.len()).unwrap_or(false),
        StackItem::Map(map) => map.borrow().contains_key(&key)?,
        other => return Err(other.type_mismatch("Array, Map or Buffer")),
    };
    engine.push(StackItem::from_bool(result))
}

/// An array/buffer index key: a nonnegative integer. Negative values are
/// an error for HASKEY only when below zero per index semantics; callers
/// treat `None` as out of range.
fn index_of(key: &StackItem) -> VmResult<Option<usize>> {
    let value = key.as_int()?;
    if value.sign() == num_bigint::Sign::Minus {
        return Err(VmError::invalid_argument(format!("negative index {value}")));
    }
    Ok(value.to_usize())
}

fn keys(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    let StackItem::Map(map) = &item else {
        return Err(item.type_mismatch("Map"));
    };
    let keys = map.borrow().keys();
    engine.push(StackItem::from_array(keys))
}

fn values(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    let items = match &item {
        StackItem::Map(map) => map.borrow().values(),
        StackItem::Array(array) => array.borrow().clone(),
        StackItem::Struct(structure) => structure.borrow().clone(),
        other => return Err(other.type_mismatch("Array or Map")),
    };
    engine.push(StackItem::from_array(items))
}

fn pick_item(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let key = engine.pop()?;
    let item = engine.pop()?;
    let picked = match &item {
        StackItem::Array(array) => {
            let index = checked_index(&key, array.len())?;
            array.borrow()[index].clone()
        }
        StackItem::Struct(structure) => {
            let index = checked_index(&key, structure.len())?;
            structure.borrow()[index].clone()
        }
        StackItem::Map(map) => map
            .borrow()
            .get(&key)?
            .ok_or_else(|| VmError::out_of_range("key not found in map".to_string()))?,
        StackItem::Buffer(buffer) => {
            let index = checked_index(&key, buffer.len())?;
            StackItem::from_int(i64::from(buffer.borrow()[index]))
        }
        StackItem::ByteString(bytes) => {
            let index = checked_index(&key, bytes.len())?;
            StackItem::from_int(i64::from(bytes[index]))
        }
        other => return Err(other.type_mismatch("Array, Map or Buffer")),
    };
    engine.push(picked)
}

fn checked_index(key: &StackItem, length: usize) -> VmResult<usize> {
    let value = key.as_int()?;
    let index = value
        .to_usize()
        .ok_or_else(|| VmError::out_of_range(format!("index {value}")))?;
    if index >= length {
        return Err(VmError::out_of_range(format!(
            "index {index} out of range {length}"
        )));
    }
    Ok(index)
}

fn append(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    let target = engine.pop()?;
    // Struct values are copied on assignment into a compound.
    let item = if matches!(item, StackItem::Struct(_)) {
        item.deep_copy(engine.limits())?
    } else {
        item
    };
    match &target {
        StackItem::Array(array) => {
            engine.reference_counter().add_reference(&item, array.id());
            array.borrow_mut().push(item);
        }
        StackItem::Struct(structure) => {
            engine
                .reference_counter()
                .add_reference(&item, structure.id());
            structure.borrow_mut().push(item);
        }
        other => return Err(other.type_mismatch("Array")),
    }
    Ok(())
}

fn set_item(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let value = engine.pop()?;
    let key = engine.pop()?;
    let target = engine.pop()?;
    let value = if matches!(value, StackItem::Struct(_)) {
        value.deep_copy(engine.limits())?
    } else {
        value
    };
    match &target {
        StackItem::Array(array) => {
            let index = checked_index(&key, array.len())?;
            engine.reference_counter().add_reference(&value, array.id());
            let old = std::mem::replace(&mut array.borrow_mut()[index], value);
            engine.reference_counter().remove_reference(&old, array.id());
        }
        StackItem::Struct(structure) => {
            let index = checked_index(&key, structure.len())?;
            engine
                .reference_counter()
                .add_reference(&value, structure.id());
            let old = std::mem::replace(&mut structure.borrow_mut()[index], value);
            engine
                .reference_counter()
                .remove_reference(&old, structure.id());
        }
        StackItem::Map(map) => {
            if !key.item_type().is_primitive() {
                return Err(key.type_mismatch("primitive map key"));
            }
            engine.reference_counter().add_reference(&key, map.id());
            engine.reference_counter().add_reference(&value, map.id());
            let displaced = map.borrow_mut().insert(key.clone(), value)?;
            if let Some(old) = displaced {
                // The key slot was reused: release the old value and the
                // duplicate key reference.
                engine.reference_counter().remove_reference(&old, map.id());
                engine.reference_counter().remove_reference(&key, map.id());
            }
        }
        StackItem::Buffer(buffer) => {
            let index = checked_index(&key, buffer.len())?;
            let byte = value.as_int()?;
            let byte = byte
                .to_u8()
                .ok_or_else(|| VmError::invalid_argument(format!("byte value {byte}")))?;
            buffer.borrow_mut()[index] = byte;
        }
        other => return Err(other.type_mismatch("Array, Map or Buffer")),
    }
    Ok(())
}

fn reverse_items(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    match &item {
        StackItem::Array(array) => array.borrow_mut().reverse(),
        StackItem::Struct(structure) => structure.borrow_mut().reverse(),
        StackItem::Buffer(buffer) => buffer.borrow_mut().reverse(),
        other => return Err(other.type_mismatch("Array or Buffer")),
    }
    Ok(())
}

fn remove(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let key = engine.pop()?;
    let target = engine.pop()?;
    match &target {
        StackItem::Array(array) => {
            let index = checked_index(&key, array.len())?;
            let removed = array.borrow_mut().remove(index);
            engine
                .reference_counter()
                .remove_reference(&removed, array.id());
        }
        StackItem::Struct(structure) => {
            let index = checked_index(&key, structure.len())?;
            let removed = structure.borrow_mut().remove(index);
            engine
                .reference_counter()
                .remove_reference(&removed, structure.id());
        }
        StackItem::Map(map) => {
            let removed = map
                .borrow_mut()
                .remove(&key)?
                .ok_or_else(|| VmError::out_of_range("key not found in map".to_string()))?;
            engine
                .reference_counter()
                .remove_reference(&removed.0, map.id());
            engine
                .reference_counter()
                .remove_reference(&removed.1, map.id());
        }
        other => return Err(other.type_mismatch("Array or Map")),
    }
    Ok(())
}

fn clear_items(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    match &item {
        StackItem::Array(array) => {
            let drained: Vec<StackItem> = array.borrow_mut().drain(..).collect();
            for child in drained {
                engine
                    .reference_counter()
                    .remove_reference(&child, array.id());
            }
        }
        StackItem::Struct(structure) => {
            let drained: Vec<StackItem> = structure.borrow_mut().drain(..).collect();
            for child in drained {
                engine
                    .reference_counter()
                    .remove_reference(&child, structure.id());
            }
        }
        StackItem::Map(map) => {
            let drained = map.borrow_mut().drain();
            for (key, value) in drained {
                engine.reference_counter().remove_reference(&key, map.id());
                engine.reference_counter().remove_reference(&value, map.id());
            }
        }
        other => return Err(other.type_mismatch("Array or Map")),
    }
    Ok(())
}

fn pop_item(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    let popped = match &item {
        StackItem::Array(array) => {
            let popped = array
                .borrow_mut()
                .pop()
                .ok_or_else(|| VmError::out_of_range("POPITEM on empty array".to_string()))?;
            engine
                .reference_counter()
                .remove_reference(&popped, array.id());
            popped
        }
        StackItem::Struct(structure) => {
            let popped = structure
                .borrow_mut()
                .pop()
                .ok_or_else(|| VmError::out_of_range("POPITEM on empty struct".to_string()))?;
            engine
                .reference_counter()
                .remove_reference(&popped, structure.id());
            popped
        }
        other => return Err(other.type_mismatch("Array")),
    };
    engine.push(popped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use crate::script_builder::ScriptBuilder;
    use crate::vm_state::VMState;

    fn run(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new();
        engine.load_script(Script::new(script), -1, 0).unwrap();
        engine.execute();
        engine
    }

    #[test]
    fn packmap_pops_keys_before_values() {
        // Push value 1, key "k", size 1: the key is above the value.
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(1);
        builder.emit_push_bytes(b"k");
        builder.emit_push_int(1);
        builder.emit(OpCode::PACKMAP);
        let engine = run(builder.into_bytes());
        assert_eq!(engine.state(), VMState::HALT);
        let StackItem::Map(map) = engine.result_stack().peek(0).unwrap() else {
            panic!("expected map");
        };
        let value = map
            .borrow()
            .get(&StackItem::from_byte_string(b"k".to_vec()))
            .unwrap()
            .unwrap();
        assert_eq!(value.as_int().unwrap(), 1.into());
    }

    #[test]
    fn pack_unpack_round_trip() {
        // PACK [1,2,3]; UNPACK restores items and count.
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(1);
        builder.emit_push_int(2);
        builder.emit_push_int(3);
        builder.emit_push_int(3);
        builder.emit(OpCode::PACK);
        builder.emit(OpCode::UNPACK);
        let engine = run(builder.into_bytes());
        let results: Vec<i64> = engine
            .result_stack()
            .items()
            .iter()
            .map(|item| i64::try_from(item.as_int().unwrap()).unwrap())
            .collect();
        assert_eq!(results, vec![1, 2, 3, 3]);
    }

    #[test]
    fn newarray_t_defaults_do_not_alias() {
        // Two boolean defaults; setting index 0 must not affect index 1.
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(2);
        builder.emit_with_operand(OpCode::NEWARRAY_T, &[StackItemType::Integer as u8]);
        builder.emit(OpCode::DUP);
        builder.emit_push_int(0);
        builder.emit_push_int(42);
        builder.emit(OpCode::SETITEM);
        builder.emit(OpCode::DUP);
        builder.emit_push_int(1);
        builder.emit(OpCode::PICKITEM);
        let engine = run(builder.into_bytes());
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_int().unwrap(),
            0.into()
        );
    }

    #[test]
    fn append_deep_copies_structs() {
        let mut builder = ScriptBuilder::new();
        // target array and a struct with one zero field
        builder.emit(OpCode::NEWARRAY0);
        builder.emit_push_int(0);
        builder.emit_push_int(1);
        builder.emit(OpCode::PACKSTRUCT);
        // append the struct to the array, keeping both on the stack
        builder.emit(OpCode::OVER);
        builder.emit(OpCode::OVER);
        builder.emit(OpCode::APPEND);
        // mutate the original struct
        builder.emit(OpCode::DUP);
        builder.emit_push_int(0);
        builder.emit_push_int(9);
        builder.emit(OpCode::SETITEM);
        let engine = run(builder.into_bytes());
        assert_eq!(engine.state(), VMState::HALT);
        // Result stack: [array, struct]; the array's copy still holds 0.
        let array = engine.result_stack().peek(1).unwrap().clone();
        let StackItem::Array(array) = array else {
            panic!("expected array");
        };
        let StackItem::Struct(copied) = array.borrow()[0].clone() else {
            panic!("expected struct");
        };
        assert_eq!(copied.borrow()[0].as_int().unwrap(), 0.into());
    }

    #[test]
    fn popitem_returns_last() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(1);
        builder.emit_push_int(2);
        builder.emit_push_int(2);
        builder.emit(OpCode::PACK);
        builder.emit(OpCode::POPITEM);
        let engine = run(builder.into_bytes());
        // PACK builds [2,1] with element 0 = the first popped (2)... the
        // last element is 1.
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_int().unwrap(),
            1.into()
        );
    }

    #[test]
    fn haskey_rejects_negative_index() {
        let mut builder = ScriptBuilder::new();
        builder.emit(OpCode::NEWARRAY0);
        builder.emit_push_int(-1);
        builder.emit(OpCode::HASKEY);
        let engine = run(builder.into_bytes());
        assert_eq!(engine.state(), VMState::FAULT);
    }
}
