//! Key-value storage substrate for the index.
//!
//! A store holds three kinds of values under string keys: plain strings,
//! string-keyed hashes and string sets. Reads go straight to the store;
//! every write goes through a [`WriteBatch`], which a store applies as one
//! indivisible unit. Readers observe either none or all of a batch.

mod memory;
mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Hash(BTreeMap<String, String>),
    Set(BTreeSet<String>),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Hash(_) => "hash",
            Value::Set(_) => "set",
        }
    }

    pub(crate) fn into_string(self, key: &str) -> Result<String, StoreError> {
        match self {
            Value::String(s) => Ok(s),
            _ => Err(wrong_type(key, "string")),
        }
    }

    pub(crate) fn into_hash(self, key: &str) -> Result<BTreeMap<String, String>, StoreError> {
        match self {
            Value::Hash(h) => Ok(h),
            _ => Err(wrong_type(key, "hash")),
        }
    }

    pub(crate) fn into_set(self, key: &str) -> Result<BTreeSet<String>, StoreError> {
        match self {
            Value::Set(s) => Ok(s),
            _ => Err(wrong_type(key, "set")),
        }
    }
}

fn wrong_type(key: &str, expected: &'static str) -> StoreError {
    StoreError::WrongType { key: key.to_string(), expected }
}

/// A single queued write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Set { key: String, value: String },
    HashSet { key: String, field: String, value: String },
    /// Replace the whole hash. An empty `fields` still leaves the key in place.
    HashReplace { key: String, fields: BTreeMap<String, String> },
    SetAdd { key: String, member: String },
    /// Removing the last member deletes the set.
    SetRemove { key: String, member: String },
    Delete { key: String },
    /// Reject the batch with `Conflict` unless `key` holds exactly this hash
    /// (`None`: the key is absent). Checked under the same lock as the writes.
    ExpectHash { key: String, expected: Option<BTreeMap<String, String>> },
}

impl BatchOp {
    pub fn key(&self) -> &str {
        match self {
            BatchOp::Set { key, .. }
            | BatchOp::HashSet { key, .. }
            | BatchOp::HashReplace { key, .. }
            | BatchOp::SetAdd { key, .. }
            | BatchOp::SetRemove { key, .. }
            | BatchOp::Delete { key }
            | BatchOp::ExpectHash { key, .. } => key,
        }
    }

    /// Compute the value `key` holds after this op, given what it held before.
    fn apply(&self, current: Option<Value>) -> Result<Option<Value>, StoreError> {
        let key = self.key();
        match self {
            BatchOp::Set { value, .. } => Ok(Some(Value::String(value.clone()))),
            BatchOp::HashSet { field, value, .. } => {
                let mut hash = match current {
                    Some(v) => v.into_hash(key)?,
                    None => BTreeMap::new(),
                };
                hash.insert(field.clone(), value.clone());
                Ok(Some(Value::Hash(hash)))
            }
            BatchOp::HashReplace { fields, .. } => Ok(Some(Value::Hash(fields.clone()))),
            BatchOp::SetAdd { member, .. } => {
                let mut set = match current {
                    Some(v) => v.into_set(key)?,
                    None => BTreeSet::new(),
                };
                set.insert(member.clone());
                Ok(Some(Value::Set(set)))
            }
            BatchOp::SetRemove { member, .. } => {
                let Some(v) = current else { return Ok(None) };
                let mut set = v.into_set(key)?;
                set.remove(member);
                Ok(if set.is_empty() { None } else { Some(Value::Set(set)) })
            }
            BatchOp::Delete { .. } => Ok(None),
            BatchOp::ExpectHash { expected, .. } => {
                let matches = match (&current, expected) {
                    (None, None) => true,
                    (Some(Value::Hash(h)), Some(e)) => h == e,
                    _ => false,
                };
                if !matches {
                    return Err(StoreError::Conflict { key: key.to_string() });
                }
                Ok(current)
            }
        }
    }
}

/// An ordered list of writes to be applied atomically.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self { Self::default() }
    pub fn push(&mut self, op: BatchOp) { self.ops.push(op); }
    pub fn ops(&self) -> &[BatchOp] { &self.ops }
    pub fn len(&self) -> usize { self.ops.len() }
    pub fn is_empty(&self) -> bool { self.ops.is_empty() }
}

/// Fold the ops of a batch over the current contents of the keys they touch.
///
/// Returns the final value of every touched key (`None` means delete). No
/// store state changes here; a `WrongType` or `Conflict` anywhere rejects the
/// whole batch.
pub(crate) fn stage<F>(ops: &[BatchOp], mut load: F) -> Result<BTreeMap<String, Option<Value>>, StoreError>
where
    F: FnMut(&str) -> Result<Option<Value>, StoreError>,
{
    let mut staged: BTreeMap<String, Option<Value>> = BTreeMap::new();
    for op in ops {
        let key = op.key();
        let current = match staged.remove(key) {
            Some(v) => v,
            None => load(key)?,
        };
        let next = op.apply(current)?;
        staged.insert(key.to_string(), next);
    }
    Ok(staged)
}

/// Capability set the inverted index needs from its storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// `None` if either the key or the field is absent.
    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    fn hash_get_all(&self, key: &str) -> Result<Option<BTreeMap<String, String>>, StoreError>;

    /// Empty if the key is absent.
    fn set_members(&self, key: &str) -> Result<BTreeSet<String>, StoreError>;

    /// Glob enumeration: `*` matches any run of characters, `?` exactly one,
    /// `\` escapes the next character.
    fn keys_matching(&self, pattern: &str) -> Result<BTreeSet<String>, StoreError>;

    /// Apply every op of `batch` as one unit, or none of them.
    fn apply_batch(&self, batch: WriteBatch) -> Result<(), StoreError>;

    fn begin_batch(&self) -> BatchHandle<'_, Self> {
        BatchHandle { store: self, batch: WriteBatch::new() }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut batch = self.begin_batch();
        batch.set(key, value);
        batch.commit()
    }

    fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut batch = self.begin_batch();
        batch.hash_set(key, field, value);
        batch.commit()
    }

    fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut batch = self.begin_batch();
        batch.set_add(key, member);
        batch.commit()
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut batch = self.begin_batch();
        batch.delete(key);
        batch.commit()
    }
}

/// Builder for a batch bound to the store that will apply it.
///
/// Nothing reaches the store until [`commit`](BatchHandle::commit); dropping
/// the handle discards the queued ops.
#[must_use = "a batch does nothing until committed"]
pub struct BatchHandle<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
    batch: WriteBatch,
}

impl<'a, S: KeyValueStore + ?Sized> BatchHandle<'a, S> {
    pub fn submit(&mut self, op: BatchOp) -> &mut Self {
        self.batch.push(op);
        self
    }

    pub fn set(&mut self, key: &str, value: &str) -> &mut Self {
        self.submit(BatchOp::Set { key: key.to_string(), value: value.to_string() })
    }

    pub fn hash_set(&mut self, key: &str, field: &str, value: &str) -> &mut Self {
        self.submit(BatchOp::HashSet { key: key.to_string(), field: field.to_string(), value: value.to_string() })
    }

    pub fn hash_replace(&mut self, key: &str, fields: BTreeMap<String, String>) -> &mut Self {
        self.submit(BatchOp::HashReplace { key: key.to_string(), fields })
    }

    pub fn set_add(&mut self, key: &str, member: &str) -> &mut Self {
        self.submit(BatchOp::SetAdd { key: key.to_string(), member: member.to_string() })
    }

    pub fn set_remove(&mut self, key: &str, member: &str) -> &mut Self {
        self.submit(BatchOp::SetRemove { key: key.to_string(), member: member.to_string() })
    }

    pub fn delete(&mut self, key: &str) -> &mut Self {
        self.submit(BatchOp::Delete { key: key.to_string() })
    }

    pub fn expect_hash(&mut self, key: &str, expected: Option<BTreeMap<String, String>>) -> &mut Self {
        self.submit(BatchOp::ExpectHash { key: key.to_string(), expected })
    }

    pub fn commit(self) -> Result<(), StoreError> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.store.apply_batch(self.batch)
    }
}
