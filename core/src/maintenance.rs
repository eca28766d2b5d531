//! Whole-keyspace operations: enumeration, bulk deletes and the debug dump.
//!
//! Each of these scans a namespace (or the entire store), so the cost grows
//! with the size of the index. They are for development and tests; nothing
//! on a query path calls them.

use crate::counts::TermCounter;
use crate::error::{IndexError, Result};
use crate::index::InvertedIndex;
use crate::keys::{doc_id_from_key, term_from_key, DOC_COUNTERS_PATTERN, TERM_SET_PATTERN};
use crate::store::KeyValueStore;
use std::collections::BTreeSet;
use std::io::Write;

impl<S: KeyValueStore, C: TermCounter> InvertedIndex<S, C> {
    pub fn term_set_keys(&self) -> Result<BTreeSet<String>> {
        Ok(self.store.keys_matching(TERM_SET_PATTERN)?)
    }

    pub fn doc_counter_keys(&self) -> Result<BTreeSet<String>> {
        Ok(self.store.keys_matching(DOC_COUNTERS_PATTERN)?)
    }

    /// Every term with at least one document. Malformed keys are logged and
    /// skipped.
    pub fn indexed_terms(&self) -> Result<BTreeSet<String>> {
        Ok(recover(self.term_set_keys()?, term_from_key))
    }

    /// Every document with a counters entry.
    pub fn indexed_documents(&self) -> Result<BTreeSet<String>> {
        Ok(recover(self.doc_counter_keys()?, doc_id_from_key))
    }

    /// Delete every term set. Returns the number of keys removed.
    pub fn clear_term_sets(&self) -> Result<usize> {
        self.delete_keys(self.term_set_keys()?)
    }

    /// Delete every document's counters. Returns the number of keys removed.
    pub fn clear_document_counters(&self) -> Result<usize> {
        self.delete_keys(self.doc_counter_keys()?)
    }

    /// Delete every key in the store, index-owned or not.
    pub fn clear_all(&self) -> Result<usize> {
        self.delete_keys(self.store.keys_matching("*")?)
    }

    fn delete_keys(&self, keys: BTreeSet<String>) -> Result<usize> {
        let mut batch = self.store.begin_batch();
        for key in &keys {
            batch.delete(key);
        }
        batch.commit()?;
        tracing::info!(deleted = keys.len(), "cleared keys");
        Ok(keys.len())
    }

    /// Write every term followed by its documents and counts.
    pub fn dump<W: Write>(&self, mut out: W) -> anyhow::Result<()> {
        for term in self.indexed_terms()? {
            writeln!(out, "{term}")?;
            for (doc_id, count) in self.counts_for_term(&term)? {
                writeln!(out, "    {doc_id} {count}")?;
            }
        }
        Ok(())
    }
}

fn recover<F>(keys: BTreeSet<String>, parse: F) -> BTreeSet<String>
where
    F: Fn(&str) -> Result<&str>,
{
    let mut out = BTreeSet::new();
    for key in &keys {
        match parse(key) {
            Ok(value) => { out.insert(value.to_string()); }
            Err(err @ IndexError::CorruptKey(_)) => tracing::warn!(%err, "skipping corrupt key"),
            Err(err) => tracing::warn!(%err, "skipping unreadable key"),
        }
    }
    out
}
