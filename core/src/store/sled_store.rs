use super::{stage, KeyValueStore, Value, WriteBatch};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::pattern::KeyPattern;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Store backed by an embedded sled database.
///
/// Each logical key is one sled entry holding a bincode-encoded [`Value`].
/// A batch is staged against current values while holding the writer lock
/// and lands through `sled::Batch`, which sled applies atomically.
pub struct SledStore {
    db: sled::Db,
    writer: Mutex<()>,
    flush_on_commit: bool,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db, writer: Mutex::new(()), flush_on_commit: false })
    }

    /// A database that lives only as long as this value.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db, writer: Mutex::new(()), flush_on_commit: false })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let store = if config.temporary { Self::temporary()? } else { Self::open(&config.path)? };
        Ok(store.with_flush_on_commit(config.flush_on_commit))
    }

    /// Flush to disk after every committed batch instead of relying on
    /// sled's background flusher.
    pub fn with_flush_on_commit(mut self, flush: bool) -> Self {
        self.flush_on_commit = flush;
        self
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self.db.get(key.as_bytes())? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.load(key)?.map(|v| v.into_string(key)).transpose()
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.db.contains_key(key.as_bytes())?)
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(self.hash_get_all(key)?.and_then(|mut h| h.remove(field)))
    }

    fn hash_get_all(&self, key: &str) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        self.load(key)?.map(|v| v.into_hash(key)).transpose()
    }

    fn set_members(&self, key: &str) -> Result<BTreeSet<String>, StoreError> {
        match self.load(key)? {
            Some(v) => v.into_set(key),
            None => Ok(BTreeSet::new()),
        }
    }

    fn keys_matching(&self, pattern: &str) -> Result<BTreeSet<String>, StoreError> {
        let pattern = KeyPattern::parse(pattern)?;
        let mut keys = BTreeSet::new();
        for item in self.db.scan_prefix(pattern.prefix().as_bytes()) {
            let (raw, _) = item?;
            let key = match std::str::from_utf8(&raw) {
                Ok(k) => k,
                Err(_) => {
                    tracing::warn!(key = ?raw, "skipping non-utf8 key");
                    continue;
                }
            };
            if pattern.matches(key) {
                keys.insert(key.to_string());
            }
        }
        Ok(keys)
    }

    fn apply_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let _guard = self.writer.lock();
        let staged = stage(batch.ops(), |key| self.load(key))?;

        let mut writes = sled::Batch::default();
        for (key, value) in &staged {
            match value {
                Some(v) => writes.insert(key.as_bytes(), bincode::serialize(v)?),
                None => writes.remove(key.as_bytes()),
            }
        }
        self.db.apply_batch(writes)?;
        if self.flush_on_commit {
            self.db.flush()?;
        }
        tracing::debug!(ops = batch.len(), keys = staged.len(), "sled batch applied");
        Ok(())
    }
}
