//! Layered snapshot over a store.

use crate::store::{SeekDirection, Store};
use crate::{StoreError, StoreResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

/// An isolated read/write view of the persisted state.
///
/// Reads observe buffered writes first, then the backing store. Writes stay
/// in the buffer until [`DataCache::commit`]. A cross-contract call works on
/// a [`DataCache::clone_cache`] layer: merging it back publishes the callee's
/// effects, dropping it rolls them back.
#[derive(Clone)]
pub struct DataCache {
    store: Arc<dyn Store>,
    /// Buffered mutations; `None` marks a deletion.
    changes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl std::fmt::Debug for DataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCache")
            .field("changes", &self.changes)
            .finish_non_exhaustive()
    }
}

impl DataCache {
    /// Creates a cache over `store` with an empty change buffer.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            changes: BTreeMap::new(),
        }
    }

    /// Point lookup observing buffered writes.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.changes.get(key) {
            Some(change) => change.clone(),
            None => self.store.get(key),
        }
    }

    /// Whether the key exists in this view.
    pub fn contains(&self, key: &[u8]) -> bool {
        match self.changes.get(key) {
            Some(change) => change.is_some(),
            None => self.store.contains(key),
        }
    }

    /// Buffers a write.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.changes.insert(key.to_vec(), Some(value.to_vec()));
    }

    /// Buffers a write, failing when the key already exists.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        if self.contains(key) {
            return Err(StoreError::KeyAlreadyExists);
        }
        self.put(key, value);
        Ok(())
    }

    /// Buffers a deletion.
    pub fn delete(&mut self, key: &[u8]) {
        self.changes.insert(key.to_vec(), None);
    }

    /// All live entries whose key starts with `prefix`, merged across the
    /// buffer and the store, ordered by key in the requested direction.
    pub fn find(&self, prefix: &[u8], direction: SeekDirection) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .store
            .seek(prefix, SeekDirection::Forward)
            .into_iter()
            .collect();
        for (key, change) in self.changes.range(prefix.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            match change {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        let mut results: Vec<(Vec<u8>, Vec<u8>)> = merged.into_iter().collect();
        if direction == SeekDirection::Backward {
            results.reverse();
        }
        results
    }

    /// Creates a copy-on-write layer sharing the same backing store.
    pub fn clone_cache(&self) -> DataCache {
        DataCache {
            store: Arc::clone(&self.store),
            changes: self.changes.clone(),
        }
    }

    /// Publishes a child layer's buffered changes into this cache.
    pub fn merge(&mut self, child: DataCache) {
        self.changes = child.changes;
    }

    /// Flushes buffered changes into the backing store.
    pub fn commit(&mut self) {
        trace!(changes = self.changes.len(), "committing snapshot");
        for (key, change) in std::mem::take(&mut self.changes) {
            match change {
                Some(value) => self.store.put(&key, &value),
                None => self.store.delete(&key),
            }
        }
    }

    /// Number of buffered (uncommitted) changes.
    pub fn pending_changes(&self) -> usize {
        self.changes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn cache() -> DataCache {
        DataCache::new(MemoryStore::shared())
    }

    #[test]
    fn reads_observe_buffered_writes() {
        let mut cache = cache();
        cache.put(b"k", b"v");
        assert_eq!(cache.get(b"k"), Some(b"v".to_vec()));
        cache.delete(b"k");
        assert_eq!(cache.get(b"k"), None);
    }

    #[test]
    fn commit_publishes_to_store() {
        let store = MemoryStore::shared();
        let mut cache = DataCache::new(store.clone() as Arc<dyn Store>);
        cache.put(b"k", b"v");
        assert_eq!(store.get(b"k"), None);
        cache.commit();
        assert_eq!(store.get(b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn dropped_clone_rolls_back() {
        let mut cache = cache();
        cache.put(b"base", b"1");
        {
            let mut child = cache.clone_cache();
            child.put(b"callee", b"2");
            // child dropped without merge
        }
        assert_eq!(cache.get(b"callee"), None);
        assert_eq!(cache.get(b"base"), Some(b"1".to_vec()));
    }

    #[test]
    fn merged_clone_publishes() {
        let mut cache = cache();
        cache.put(b"base", b"1");
        let mut child = cache.clone_cache();
        child.put(b"callee", b"2");
        cache.merge(child);
        assert_eq!(cache.get(b"callee"), Some(b"2".to_vec()));
    }

    #[test]
    fn find_merges_buffer_and_store() {
        let store = MemoryStore::shared();
        store.put(b"p1", b"old");
        store.put(b"p2", b"keep");
        let mut cache = DataCache::new(store as Arc<dyn Store>);
        cache.put(b"p1", b"new");
        cache.put(b"p3", b"add");
        cache.delete(b"p2");
        let found = cache.find(b"p", SeekDirection::Forward);
        assert_eq!(
            found,
            vec![
                (b"p1".to_vec(), b"new".to_vec()),
                (b"p3".to_vec(), b"add".to_vec())
            ]
        );
        let backward = cache.find(b"p", SeekDirection::Backward);
        assert_eq!(backward[0].0, b"p3".to_vec());
    }

    #[test]
    fn add_rejects_existing() {
        let mut cache = cache();
        cache.put(b"k", b"v");
        assert_eq!(cache.add(b"k", b"w"), Err(StoreError::KeyAlreadyExists));
    }
}
