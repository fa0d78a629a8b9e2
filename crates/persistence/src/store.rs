//! Store abstraction and the in-memory implementation.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Direction of a prefix seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeekDirection {
    #[default]
    Forward,
    Backward,
}

/// A transactional key-value store. Keys and values are opaque bytes;
/// ordering is lexicographic over keys.
pub trait Store: Send + Sync {
    /// Point lookup.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Whether the key exists.
    fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// All entries whose key starts with `prefix`, ordered by key in the
    /// requested direction.
    fn seek(&self, prefix: &[u8], direction: SeekDirection) -> Vec<(Vec<u8>, Vec<u8>)>;

    /// Writes a key-value pair.
    fn put(&self, key: &[u8], value: &[u8]);

    /// Removes a key if present.
    fn delete(&self, key: &[u8]);
}

/// A `BTreeMap`-backed store. Interior-locked so snapshots can share it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store behind an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().expect("store lock poisoned").len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A sorted copy of every entry, for post-state dumps.
    pub fn dump(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries
            .read()
            .expect("store lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries
            .read()
            .expect("store lock poisoned")
            .get(key)
            .cloned()
    }

    fn seek(&self, prefix: &[u8], direction: SeekDirection) -> Vec<(Vec<u8>, Vec<u8>)> {
        let entries = self.entries.read().expect("store lock poisoned");
        let mut matched: Vec<(Vec<u8>, Vec<u8>)> = entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if direction == SeekDirection::Backward {
            matched.reverse();
        }
        matched
    }

    fn put(&self, key: &[u8], value: &[u8]) {
        self.entries
            .write()
            .expect("store lock poisoned")
            .insert(key.to_vec(), value.to_vec());
    }

    fn delete(&self, key: &[u8]) {
        self.entries
            .write()
            .expect("store lock poisoned")
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let store = MemoryStore::new();
        store.put(b"a", b"1");
        assert_eq!(store.get(b"a"), Some(b"1".to_vec()));
        store.delete(b"a");
        assert_eq!(store.get(b"a"), None);
    }

    #[test]
    fn seek_is_ordered_and_prefix_bounded() {
        let store = MemoryStore::new();
        store.put(b"aa", b"1");
        store.put(b"ab", b"2");
        store.put(b"b", b"3");
        let forward = store.seek(b"a", SeekDirection::Forward);
        assert_eq!(
            forward,
            vec![
                (b"aa".to_vec(), b"1".to_vec()),
                (b"ab".to_vec(), b"2".to_vec())
            ]
        );
        let backward = store.seek(b"a", SeekDirection::Backward);
        assert_eq!(backward[0].0, b"ab".to_vec());
    }
}
