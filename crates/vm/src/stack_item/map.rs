//! Map interior: an insertion-ordered primitive-keyed dictionary.

use super::next_item_id;
use crate::error::{VmError, VmResult};
use crate::stack_item::StackItem;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// Maximum encoded byte length of a map key.
pub const MAX_KEY_SIZE: usize = 64;

/// An insertion-ordered dictionary from primitive keys to arbitrary items.
/// Key equality follows primitive span equality; overwriting a key keeps
/// its original position.
#[derive(Debug, Default)]
pub struct VmOrderedDictionary {
    entries: Vec<(StackItem, StackItem)>,
}

impl VmOrderedDictionary {
    /// Creates an empty dictionary.
    pub fn new() -> VmOrderedDictionary {
        VmOrderedDictionary::default()
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position_of(&self, key: &StackItem) -> VmResult<Option<usize>> {
        let needle = key_bytes(key)?;
        for (index, (existing, _)) in self.entries.iter().enumerate() {
            if key_bytes(existing)? == needle {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Whether the key exists.
    pub fn contains_key(&self, key: &StackItem) -> VmResult<bool> {
        Ok(self.position_of(key)?.is_some())
    }

    /// Looks up a value by key.
    pub fn get(&self, key: &StackItem) -> VmResult<Option<StackItem>> {
        Ok(self.position_of(key)?.map(|i| self.entries[i].1.clone()))
    }

    /// Inserts or overwrites; returns the displaced value when the key was
    /// already present. Overwrite keeps the key's original position.
    pub fn insert(&mut self, key: StackItem, value: StackItem) -> VmResult<Option<StackItem>> {
        if key_bytes(&key)?.len() > MAX_KEY_SIZE {
            return Err(VmError::invalid_argument(format!(
                "map key exceeds {MAX_KEY_SIZE} bytes"
            )));
        }
        match self.position_of(&key)? {
            Some(index) => {
                let old = std::mem::replace(&mut self.entries[index].1, value);
                Ok(Some(old))
            }
            None => {
                self.entries.push((key, value));
                Ok(None)
            }
        }
    }

    /// Removes an entry, preserving the order of the rest.
    pub fn remove(&mut self, key: &StackItem) -> VmResult<Option<(StackItem, StackItem)>> {
        Ok(self.position_of(key)?.map(|i| self.entries.remove(i)))
    }

    /// Removes every entry, returning them.
    pub fn drain(&mut self) -> Vec<(StackItem, StackItem)> {
        std::mem::take(&mut self.entries)
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[(StackItem, StackItem)] {
        &self.entries
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<StackItem> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Values in insertion order.
    pub fn values(&self) -> Vec<StackItem> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }
}

/// The canonical byte form used for key equality; rejects non-primitives.
pub fn key_bytes(key: &StackItem) -> VmResult<Vec<u8>> {
    match key {
        StackItem::Boolean(value) => Ok(vec![u8::from(*value)]),
        StackItem::Integer(value) => Ok(super::integer::to_bytes_le(value)),
        StackItem::ByteString(bytes) => Ok(bytes.clone()),
        other => Err(VmError::invalid_argument(format!(
            "map keys must be primitive, got {}",
            other.item_type().name()
        ))),
    }
}

/// The shared interior of a Map stack item.
#[derive(Debug, Clone)]
pub struct MapItem {
    id: usize,
    entries: Rc<RefCell<VmOrderedDictionary>>,
}

impl MapItem {
    /// Creates an empty map with a fresh identity.
    pub fn new() -> MapItem {
        MapItem {
            id: next_item_id(),
            entries: Rc::new(RefCell::new(VmOrderedDictionary::new())),
        }
    }

    /// The identity of this allocation.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Entry count.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Immutable view of the dictionary.
    pub fn borrow(&self) -> Ref<'_, VmOrderedDictionary> {
        self.entries.borrow()
    }

    /// Mutable view of the dictionary.
    pub fn borrow_mut(&self) -> RefMut<'_, VmOrderedDictionary> {
        self.entries.borrow_mut()
    }

    /// Whether two handles share one allocation.
    pub fn same_identity(&self, other: &MapItem) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }
}

impl Default for MapItem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    #[test]
    fn insertion_order_is_preserved() {
        let mut dict = VmOrderedDictionary::new();
        for i in [3i64, 1, 2] {
            dict.insert(
                StackItem::Integer(BigInt::from(i)),
                StackItem::Integer(BigInt::from(i * 10)),
            )
            .unwrap();
        }
        let keys: Vec<BigInt> = dict
            .keys()
            .iter()
            .map(|k| match k {
                StackItem::Integer(v) => v.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![3.into(), 1.into(), 2.into()]);
    }

    #[test]
    fn overwrite_keeps_position() {
        let mut dict = VmOrderedDictionary::new();
        dict.insert(StackItem::from_byte_string(b"a".to_vec()), StackItem::Null)
            .unwrap();
        dict.insert(StackItem::from_byte_string(b"b".to_vec()), StackItem::Null)
            .unwrap();
        let displaced = dict
            .insert(
                StackItem::from_byte_string(b"a".to_vec()),
                StackItem::Boolean(true),
            )
            .unwrap();
        assert!(displaced.is_some());
        assert_eq!(dict.len(), 2);
        assert_eq!(key_bytes(&dict.keys()[0]).unwrap(), b"a".to_vec());
    }

    #[test]
    fn cross_primitive_key_equality() {
        let mut dict = VmOrderedDictionary::new();
        dict.insert(
            StackItem::Integer(BigInt::from(1)),
            StackItem::Boolean(true),
        )
        .unwrap();
        // ByteString [0x01] has the same span as Integer 1.
        let looked_up = dict
            .get(&StackItem::from_byte_string(vec![0x01]))
            .unwrap()
            .unwrap();
        assert!(matches!(looked_up, StackItem::Boolean(true)));
    }

    #[test]
    fn oversize_keys_are_rejected() {
        let mut dict = VmOrderedDictionary::new();
        let result = dict.insert(
            StackItem::from_byte_string(vec![0u8; MAX_KEY_SIZE + 1]),
            StackItem::Null,
        );
        assert!(result.is_err());
    }

    #[test]
    fn compound_keys_are_rejected() {
        let array = StackItem::from_array(Vec::new());
        assert!(key_bytes(&array).is_err());
    }
}
