//! Binary serialization of stack items (StdLib `serialize`/`deserialize`).
//!
//! Wire form: one type-tag byte per item; primitives carry var-int-prefixed
//! payloads, compounds carry a var-int count followed by their elements.
//! Interop handles and pointers never serialize; cycles are rejected.

use crate::{ContractError, ContractResult};
use neo_io::{BinaryReader, BinaryWriter};
use neo_vm::stack_item::integer;
use neo_vm::{StackItem, StackItemType};
use std::collections::HashSet;

/// Default byte bound for serialized items.
pub const DEFAULT_MAX_SIZE: usize = u16::MAX as usize;

/// Serializes a stack item, bounded by `max_size` output bytes.
pub fn serialize(item: &StackItem, max_size: usize) -> ContractResult<Vec<u8>> {
    let mut writer = BinaryWriter::new();
    let mut seen = HashSet::new();
    serialize_into(item, &mut writer, &mut seen, max_size)?;
    Ok(writer.into_bytes())
}

fn serialize_into(
    item: &StackItem,
    writer: &mut BinaryWriter,
    seen: &mut HashSet<usize>,
    max_size: usize,
) -> ContractResult<()> {
    match item {
        StackItem::Null => writer.write_u8(StackItemType::Any as u8),
        StackItem::Boolean(value) => {
            writer.write_u8(StackItemType::Boolean as u8);
            writer.write_bool(*value);
        }
        StackItem::Integer(value) => {
            writer.write_u8(StackItemType::Integer as u8);
            writer.write_var_bytes(&integer::to_bytes_le(value));
        }
        StackItem::ByteString(bytes) => {
            writer.write_u8(StackItemType::ByteString as u8);
            writer.write_var_bytes(bytes);
        }
        StackItem::Buffer(buffer) => {
            writer.write_u8(StackItemType::Buffer as u8);
            writer.write_var_bytes(&buffer.to_vec());
        }
        StackItem::Array(array) => {
            enter_compound(array.id(), seen)?;
            writer.write_u8(StackItemType::Array as u8);
            let items = array.borrow().clone();
            writer.write_var_int(items.len() as u64);
            for element in &items {
                serialize_into(element, writer, seen, max_size)?;
            }
            seen.remove(&array.id());
        }
        StackItem::Struct(structure) => {
            enter_compound(structure.id(), seen)?;
            writer.write_u8(StackItemType::Struct as u8);
            let items = structure.borrow().clone();
            writer.write_var_int(items.len() as u64);
            for element in &items {
                serialize_into(element, writer, seen, max_size)?;
            }
            seen.remove(&structure.id());
        }
        StackItem::Map(map) => {
            enter_compound(map.id(), seen)?;
            writer.write_u8(StackItemType::Map as u8);
            let entries = map.borrow().entries().to_vec();
            writer.write_var_int(entries.len() as u64);
            for (key, value) in &entries {
                serialize_into(key, writer, seen, max_size)?;
                serialize_into(value, writer, seen, max_size)?;
            }
            seen.remove(&map.id());
        }
        other => {
            return Err(ContractError::InvalidContract(format!(
                "{} is not serializable",
                other.item_type().name()
            )))
        }
    }
    if writer.len() > max_size {
        return Err(ContractError::InvalidContract(format!(
            "serialized item exceeds {max_size} bytes"
        )));
    }
    Ok(())
}

fn enter_compound(id: usize, seen: &mut HashSet<usize>) -> ContractResult<()> {
    if !seen.insert(id) {
        return Err(ContractError::InvalidContract(
            "circular reference in serialized item".into(),
        ));
    }
    Ok(())
}

/// Deserializes bytes back into a stack item.
pub fn deserialize(data: &[u8], max_size: usize) -> ContractResult<StackItem> {
    if data.len() > max_size {
        return Err(ContractError::InvalidContract(format!(
            "serialized item exceeds {max_size} bytes"
        )));
    }
    let mut reader = BinaryReader::new(data);
    let item = deserialize_from(&mut reader, max_size)?;
    Ok(item)
}

fn deserialize_from(reader: &mut BinaryReader<'_>, max_size: usize) -> ContractResult<StackItem> {
    let tag = reader.read_u8()?;
    let item_type = StackItemType::from_byte(tag)
        .map_err(|_| ContractError::InvalidContract(format!("invalid item tag {tag:#04x}")))?;
    let item = match item_type {
        StackItemType::Any => StackItem::Null,
        StackItemType::Boolean => StackItem::from_bool(reader.read_bool()?),
        StackItemType::Integer => {
            let bytes = reader.read_var_bytes(integer::MAX_INTEGER_SIZE)?;
            StackItem::Integer(integer::from_bytes_le(&bytes))
        }
        StackItemType::ByteString => {
            StackItem::from_byte_string(reader.read_var_bytes(max_size)?)
        }
        StackItemType::Buffer => StackItem::from_buffer(reader.read_var_bytes(max_size)?),
        StackItemType::Array | StackItemType::Struct => {
            let count = reader.read_var_int(max_size as u64)? as usize;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(deserialize_from(reader, max_size)?);
            }
            if item_type == StackItemType::Array {
                StackItem::from_array(items)
            } else {
                StackItem::from_struct(items)
            }
        }
        StackItemType::Map => {
            let count = reader.read_var_int(max_size as u64)? as usize;
            let map = neo_vm::stack_item::MapItem::new();
            for _ in 0..count {
                let key = deserialize_from(reader, max_size)?;
                let value = deserialize_from(reader, max_size)?;
                map.borrow_mut()
                    .insert(key, value)
                    .map_err(ContractError::Vm)?;
            }
            StackItem::Map(map)
        }
        other => {
            return Err(ContractError::InvalidContract(format!(
                "{} cannot be deserialized",
                other.name()
            )))
        }
    };
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_vm::ExecutionEngineLimits;

    fn round_trip(item: StackItem) -> StackItem {
        let bytes = serialize(&item, DEFAULT_MAX_SIZE).unwrap();
        deserialize(&bytes, DEFAULT_MAX_SIZE).unwrap()
    }

    #[test]
    fn primitives_round_trip() {
        let limits = ExecutionEngineLimits::default();
        for item in [
            StackItem::Null,
            StackItem::from_bool(true),
            StackItem::from_int(-170141183460469231731687303715884105728i128),
            StackItem::from_byte_string(b"hello".to_vec()),
        ] {
            assert!(round_trip(item.clone()).equals(&item, &limits).unwrap());
        }
    }

    #[test]
    fn nested_compounds_round_trip() {
        let limits = ExecutionEngineLimits::default();
        let map = neo_vm::stack_item::MapItem::new();
        map.borrow_mut()
            .insert(
                StackItem::from_byte_string(b"k".to_vec()),
                StackItem::from_array(vec![StackItem::from_int(1), StackItem::Null]),
            )
            .unwrap();
        let original = StackItem::Map(map);
        let restored = round_trip(original.clone());
        // Maps compare by identity; compare piecewise.
        let StackItem::Map(restored) = restored else {
            panic!("expected map");
        };
        let value = restored
            .borrow()
            .get(&StackItem::from_byte_string(b"k".to_vec()))
            .unwrap()
            .unwrap();
        let StackItem::Array(array) = value else {
            panic!("expected array");
        };
        assert!(array.borrow()[0]
            .equals(&StackItem::from_int(1), &limits)
            .unwrap());
        assert!(array.borrow()[1].is_null());
    }

    #[test]
    fn cycles_are_rejected() {
        let array = neo_vm::stack_item::ArrayItem::new(Vec::new());
        array.borrow_mut().push(StackItem::Array(array.clone()));
        let item = StackItem::Array(array);
        assert!(serialize(&item, DEFAULT_MAX_SIZE).is_err());
    }

    #[test]
    fn interop_handles_never_serialize() {
        let item = StackItem::from_interop("iterator", 1u8);
        assert!(serialize(&item, DEFAULT_MAX_SIZE).is_err());
    }

    #[test]
    fn size_bound_is_enforced() {
        let item = StackItem::from_byte_string(vec![0u8; 100]);
        assert!(serialize(&item, 50).is_err());
    }

    #[test]
    fn random_bytes_round_trip() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let len = rng.gen_range(0..200usize);
            let mut bytes = vec![0u8; len];
            rng.fill(&mut bytes[..]);
            let item = StackItem::from_byte_string(bytes.clone());
            let restored = round_trip(item);
            assert_eq!(restored.as_bytes().unwrap(), bytes);
        }
    }
}
