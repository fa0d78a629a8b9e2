//! JSON projection of stack items (StdLib `jsonSerialize`/`jsonDeserialize`).

use crate::{ContractError, ContractResult};
use neo_vm::stack_item::MapItem;
use neo_vm::StackItem;
use num_traits::ToPrimitive;
use serde_json::{Map as JsonMap, Number, Value};

/// Largest integer JSON can carry without precision loss.
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Projects a stack item into a JSON value.
pub fn serialize(item: &StackItem) -> ContractResult<Value> {
    match item {
        StackItem::Null => Ok(Value::Null),
        StackItem::Boolean(value) => Ok(Value::Bool(*value)),
        StackItem::Integer(value) => {
            let value = value
                .to_i64()
                .filter(|v| (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(v))
                .ok_or_else(|| {
                    ContractError::InvalidContract("integer outside JSON safe range".into())
                })?;
            Ok(Value::Number(Number::from(value)))
        }
        StackItem::ByteString(_) | StackItem::Buffer(_) => {
            let bytes = item.as_bytes().map_err(ContractError::Vm)?;
            match String::from_utf8(bytes.clone()) {
                Ok(text) => Ok(Value::String(text)),
                Err(_) => Ok(Value::String(hex::encode(bytes))),
            }
        }
        StackItem::Array(array) => {
            let items = array.borrow().clone();
            let mut values = Vec::with_capacity(items.len());
            for element in &items {
                values.push(serialize(element)?);
            }
            Ok(Value::Array(values))
        }
        StackItem::Struct(structure) => {
            let items = structure.borrow().clone();
            let mut values = Vec::with_capacity(items.len());
            for element in &items {
                values.push(serialize(element)?);
            }
            Ok(Value::Array(values))
        }
        StackItem::Map(map) => {
            let mut object = JsonMap::new();
            for (key, value) in map.borrow().entries() {
                let key = key
                    .as_string()
                    .map_err(|_| ContractError::InvalidContract("map key must be a string".into()))?;
                object.insert(key, serialize(value)?);
            }
            Ok(Value::Object(object))
        }
        other => Err(ContractError::InvalidContract(format!(
            "{} has no JSON projection",
            other.item_type().name()
        ))),
    }
}

/// Parses a JSON value back into a stack item.
pub fn deserialize(value: &Value) -> ContractResult<StackItem> {
    match value {
        Value::Null => Ok(StackItem::Null),
        Value::Bool(b) => Ok(StackItem::from_bool(*b)),
        Value::Number(number) => {
            let value = number.as_i64().ok_or_else(|| {
                ContractError::InvalidContract("JSON number is not an integer".into())
            })?;
            Ok(StackItem::from_int(value))
        }
        Value::String(text) => Ok(StackItem::from_byte_string(text.as_bytes().to_vec())),
        Value::Array(items) => {
            let mut elements = Vec::with_capacity(items.len());
            for item in items {
                elements.push(deserialize(item)?);
            }
            Ok(StackItem::from_array(elements))
        }
        Value::Object(object) => {
            let map = MapItem::new();
            for (key, value) in object {
                let key = StackItem::from_byte_string(key.as_bytes().to_vec());
                let value = deserialize(value)?;
                map.borrow_mut().insert(key, value).map_err(ContractError::Vm)?;
            }
            Ok(StackItem::Map(map))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_projections() {
        assert_eq!(serialize(&StackItem::Null).unwrap(), Value::Null);
        assert_eq!(
            serialize(&StackItem::from_bool(true)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            serialize(&StackItem::from_int(42)).unwrap(),
            Value::Number(42.into())
        );
        assert_eq!(
            serialize(&StackItem::from_byte_string(b"hi".to_vec())).unwrap(),
            Value::String("hi".into())
        );
    }

    #[test]
    fn unsafe_integers_are_rejected() {
        let item = StackItem::from_int(MAX_SAFE_INTEGER + 1);
        assert!(serialize(&item).is_err());
    }

    #[test]
    fn object_round_trip_preserves_entries() {
        let json: Value = serde_json::from_str(r#"{"a":1,"b":[true,null]}"#).unwrap();
        let item = deserialize(&json).unwrap();
        let StackItem::Map(map) = &item else {
            panic!("expected map");
        };
        assert_eq!(map.len(), 2);
        assert_eq!(serialize(&item).unwrap(), json);
    }

    #[test]
    fn interop_has_no_projection() {
        assert!(serialize(&StackItem::from_interop("x", ())).is_err());
    }
}
