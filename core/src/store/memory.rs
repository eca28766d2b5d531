use super::{stage, KeyValueStore, Value, WriteBatch};
use crate::error::StoreError;
use crate::pattern::KeyPattern;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Process-local store, mostly for tests and throwaway indexes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.data.read().len() }
    pub fn is_empty(&self) -> bool { self.data.read().is_empty() }

    fn load(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.load(key).map(|v| v.into_string(key)).transpose()
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.data.read().contains_key(key))
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(self.hash_get_all(key)?.and_then(|mut h| h.remove(field)))
    }

    fn hash_get_all(&self, key: &str) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        self.load(key).map(|v| v.into_hash(key)).transpose()
    }

    fn set_members(&self, key: &str) -> Result<BTreeSet<String>, StoreError> {
        match self.load(key) {
            Some(v) => v.into_set(key),
            None => Ok(BTreeSet::new()),
        }
    }

    fn keys_matching(&self, pattern: &str) -> Result<BTreeSet<String>, StoreError> {
        let pattern = KeyPattern::parse(pattern)?;
        let data = self.data.read();
        Ok(data.keys().filter(|k| pattern.matches(k)).cloned().collect())
    }

    fn apply_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut data = self.data.write();
        let staged = stage(batch.ops(), |key| Ok(data.get(key).cloned()))?;
        for (key, value) in staged {
            match value {
                Some(v) => { data.insert(key, v); }
                None => { data.remove(&key); }
            }
        }
        Ok(())
    }
}
