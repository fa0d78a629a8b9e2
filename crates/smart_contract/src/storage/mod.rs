//! Contract storage: keys, items, contexts, find options and iterators.

use bitflags::bitflags;

/// Maximum storage key length (user portion).
pub const MAX_STORAGE_KEY_SIZE: usize = 64;
/// Maximum storage value length.
pub const MAX_STORAGE_VALUE_SIZE: usize = u16::MAX as usize;

/// A composite storage key: contract id then user key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageKey {
    pub id: i32,
    pub key: Vec<u8>,
}

impl StorageKey {
    /// Creates a key for a contract's user key bytes.
    pub fn new(id: i32, key: Vec<u8>) -> StorageKey {
        StorageKey { id, key }
    }

    /// A key of prefix byte plus suffix bytes.
    pub fn with_prefix(id: i32, prefix: u8, suffix: &[u8]) -> StorageKey {
        let mut key = Vec::with_capacity(1 + suffix.len());
        key.push(prefix);
        key.extend_from_slice(suffix);
        StorageKey { id, key }
    }

    /// The flat store encoding: `id (i32 LE) ‖ key`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.key.len());
        bytes.extend_from_slice(&self.id.to_le_bytes());
        bytes.extend_from_slice(&self.key);
        bytes
    }

    /// The flat prefix covering every key of a contract.
    pub fn contract_prefix(id: i32) -> Vec<u8> {
        id.to_le_bytes().to_vec()
    }

    /// Splits a flat key back into (id, user key).
    pub fn from_bytes(bytes: &[u8]) -> Option<StorageKey> {
        if bytes.len() < 4 {
            return None;
        }
        let id = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        Some(StorageKey {
            id,
            key: bytes[4..].to_vec(),
        })
    }
}

/// A stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageItem {
    pub value: Vec<u8>,
}

impl StorageItem {
    /// Wraps raw bytes.
    pub fn new(value: Vec<u8>) -> StorageItem {
        StorageItem { value }
    }

    /// Interprets the value as a little-endian signed integer.
    pub fn as_int(&self) -> num_bigint::BigInt {
        if self.value.is_empty() {
            num_bigint::BigInt::from(0)
        } else {
            num_bigint::BigInt::from_signed_bytes_le(&self.value)
        }
    }

    /// Stores an integer as minimal little-endian signed bytes.
    pub fn from_int(value: &num_bigint::BigInt) -> StorageItem {
        use num_traits::Zero;
        if value.is_zero() {
            StorageItem::new(vec![0])
        } else {
            StorageItem::new(value.to_signed_bytes_le())
        }
    }
}

/// A handle a contract holds while touching its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageContext {
    /// The owning contract's id.
    pub id: i32,
    /// Read-only contexts refuse writes.
    pub is_read_only: bool,
}

impl StorageContext {
    /// A writable context for a contract id.
    pub fn new(id: i32) -> StorageContext {
        StorageContext {
            id,
            is_read_only: false,
        }
    }

    /// The same context, demoted to read-only.
    pub fn as_read_only(&self) -> StorageContext {
        StorageContext {
            id: self.id,
            is_read_only: true,
        }
    }
}

bitflags! {
    /// Options for `System.Storage.Find`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FindOptions: u8 {
        const NONE = 0;
        const KEYS_ONLY = 0x01;
        const REMOVE_PREFIX = 0x02;
        const VALUES_ONLY = 0x04;
        const DESERIALIZE_VALUES = 0x08;
        const PICK_FIELD0 = 0x10;
        const PICK_FIELD1 = 0x20;
        const BACKWARDS = 0x80;
    }
}

impl FindOptions {
    /// Validates mutually exclusive combinations.
    pub fn is_valid(&self) -> bool {
        if self.contains(FindOptions::KEYS_ONLY)
            && self.intersects(
                FindOptions::VALUES_ONLY
                    | FindOptions::DESERIALIZE_VALUES
                    | FindOptions::PICK_FIELD0
                    | FindOptions::PICK_FIELD1,
            )
        {
            return false;
        }
        if self.contains(FindOptions::VALUES_ONLY)
            && self.intersects(FindOptions::KEYS_ONLY | FindOptions::REMOVE_PREFIX)
        {
            return false;
        }
        if self.contains(FindOptions::PICK_FIELD0) && self.contains(FindOptions::PICK_FIELD1) {
            return false;
        }
        if self.intersects(FindOptions::PICK_FIELD0 | FindOptions::PICK_FIELD1)
            && !self.contains(FindOptions::DESERIALIZE_VALUES)
        {
            return false;
        }
        true
    }
}

/// The host object behind a storage-find interop handle.
#[derive(Debug)]
pub struct StorageIterator {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    position: Option<usize>,
    prefix_length: usize,
    options: FindOptions,
}

impl StorageIterator {
    /// Wraps found entries; `prefix_length` is stripped under
    /// `REMOVE_PREFIX`.
    pub fn new(
        entries: Vec<(Vec<u8>, Vec<u8>)>,
        prefix_length: usize,
        options: FindOptions,
    ) -> StorageIterator {
        StorageIterator {
            entries,
            position: None,
            prefix_length,
            options,
        }
    }

    /// Advances; returns false past the end.
    pub fn next(&mut self) -> bool {
        let next = match self.position {
            None => 0,
            Some(position) => position + 1,
        };
        if next >= self.entries.len() {
            self.position = Some(self.entries.len());
            return false;
        }
        self.position = Some(next);
        true
    }

    /// The current (key, value) pair, after a successful `next`.
    pub fn current(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        let position = self.position?;
        let (key, value) = self.entries.get(position)?;
        let key = if self.options.contains(FindOptions::REMOVE_PREFIX) {
            key[self.prefix_length.min(key.len())..].to_vec()
        } else {
            key.clone()
        };
        Some((key, value.clone()))
    }

    /// The configured options.
    pub fn options(&self) -> FindOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_key_layout() {
        let key = StorageKey::with_prefix(-7, 0x16, b"abc");
        let bytes = key.to_bytes();
        assert_eq!(&bytes[..4], &(-7i32).to_le_bytes());
        assert_eq!(&bytes[4..], &[0x16, b'a', b'b', b'c']);
        assert_eq!(StorageKey::from_bytes(&bytes).unwrap(), key);
    }

    #[test]
    fn item_integer_round_trip() {
        let value = num_bigint::BigInt::from(-1234567);
        let item = StorageItem::from_int(&value);
        assert_eq!(item.as_int(), value);
        assert_eq!(StorageItem::default().as_int(), 0.into());
    }

    #[test]
    fn find_option_validity() {
        assert!(FindOptions::KEYS_ONLY.is_valid());
        assert!(!(FindOptions::KEYS_ONLY | FindOptions::VALUES_ONLY).is_valid());
        assert!(!(FindOptions::PICK_FIELD0 | FindOptions::PICK_FIELD1
            | FindOptions::DESERIALIZE_VALUES)
            .is_valid());
        assert!(!(FindOptions::PICK_FIELD0).is_valid());
        assert!((FindOptions::PICK_FIELD0 | FindOptions::DESERIALIZE_VALUES).is_valid());
    }

    #[test]
    fn iterator_strips_prefix() {
        let mut iterator = StorageIterator::new(
            vec![(b"ppk1".to_vec(), b"v1".to_vec())],
            2,
            FindOptions::REMOVE_PREFIX,
        );
        assert!(iterator.next());
        assert_eq!(iterator.current().unwrap().0, b"k1".to_vec());
        assert!(!iterator.next());
        assert!(iterator.current().is_none());
    }
}
