//! The inverted index: term → documents and document → term counts, kept
//! as two families of store keys that are only ever written together.

use crate::counts::{TermCounter, TermCounts};
use crate::error::{IndexError, Result};
use crate::keys::{doc_counters_key, term_set_key, validate_doc_id, validate_term};
use crate::store::KeyValueStore;
use crate::tokenizer::TextTermCounter;
use std::collections::{BTreeMap, BTreeSet};

const MAX_INGEST_ATTEMPTS: usize = 16;

/// What a single ingest changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub doc_id: String,
    /// Distinct terms now recorded for the document.
    pub terms: usize,
    /// Terms the previous version had that this one does not.
    pub stale_terms_removed: usize,
    /// The document was already indexed before this ingest.
    pub replaced: bool,
}

/// Search index persisted in a [`KeyValueStore`].
///
/// The index exclusively owns its store. All methods are synchronous and the
/// index spawns no threads. Ingests of different documents may run
/// concurrently; ingests of the same document are last-commit-wins, so
/// callers that need a particular order per document must serialize them.
pub struct InvertedIndex<S, C = TextTermCounter> {
    pub(crate) store: S,
    counter: C,
}

impl<S: KeyValueStore> InvertedIndex<S> {
    pub fn new(store: S) -> Self {
        Self { store, counter: TextTermCounter::default() }
    }
}

impl<S: KeyValueStore, C: TermCounter> InvertedIndex<S, C> {
    pub fn with_counter(store: S, counter: C) -> Self {
        Self { store, counter }
    }

    pub fn store(&self) -> &S { &self.store }

    /// A document is indexed once it has a counters entry, even an empty one.
    pub fn is_indexed(&self, doc_id: &str) -> Result<bool> {
        Ok(self.store.exists(&doc_counters_key(doc_id))?)
    }

    /// Count the terms of `content` and record them for `doc_id`.
    ///
    /// A counter failure aborts before the store is touched.
    pub fn index_document(&self, doc_id: &str, content: &C::Content) -> Result<IngestReport> {
        let counts = self.counter.count(doc_id, content).map_err(IndexError::Counter)?;
        self.ingest(&counts)
    }

    /// Record `counts` for the document they are labelled with, replacing
    /// whatever that document had before.
    ///
    /// Everything lands in one batch: the document is dropped from the sets of
    /// terms it no longer contains, its counters are replaced wholesale and
    /// it is added to the set of every current term. The batch only commits
    /// if the counters still hold what the diff was computed from; a
    /// concurrent ingest of the same document forces a fresh read and retry.
    pub fn ingest(&self, counts: &TermCounts) -> Result<IngestReport> {
        let doc_id = counts.label();
        validate_doc_id(doc_id)?;
        for term in counts.terms() {
            validate_term(term)?;
        }

        let mut attempt = 1;
        loop {
            match self.try_ingest(counts) {
                Err(IndexError::Storage(e)) if e.is_conflict() && attempt < MAX_INGEST_ATTEMPTS => {
                    tracing::debug!(doc_id, attempt, "counters changed under ingest, retrying");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn try_ingest(&self, counts: &TermCounts) -> Result<IngestReport> {
        let doc_id = counts.label();
        let counters_key = doc_counters_key(doc_id);
        let prior = self.store.hash_get_all(&counters_key)?;
        let replaced = prior.is_some();

        let mut batch = self.store.begin_batch();
        let mut stale_terms_removed = 0;
        for term in prior.iter().flat_map(|p| p.keys()) {
            if counts.get(term).is_none() {
                batch.set_remove(&term_set_key(term), doc_id);
                stale_terms_removed += 1;
            }
        }

        let fields: BTreeMap<String, String> = counts.iter().map(|(t, c)| (t.to_string(), c.to_string())).collect();
        batch.expect_hash(&counters_key, prior);
        batch.hash_replace(&counters_key, fields);
        for term in counts.terms() {
            batch.set_add(&term_set_key(term), doc_id);
        }
        batch.commit()?;

        let report = IngestReport { doc_id: doc_id.to_string(), terms: counts.len(), stale_terms_removed, replaced };
        tracing::debug!(doc_id, terms = report.terms, stale = stale_terms_removed, replaced, "document ingested");
        Ok(report)
    }

    /// Documents containing `term`; empty if the term was never seen.
    pub fn documents_containing(&self, term: &str) -> Result<BTreeSet<String>> {
        Ok(self.store.set_members(&term_set_key(term))?)
    }

    /// Occurrences of `term` in `doc_id`.
    pub fn count_in(&self, doc_id: &str, term: &str) -> Result<u32> {
        let key = doc_counters_key(doc_id);
        match self.store.hash_get(&key, term)? {
            Some(raw) => parse_count(&key, term, raw),
            None => Err(IndexError::NotFound { doc_id: doc_id.to_string(), term: term.to_string() }),
        }
    }

    /// Count of `term` in every document containing it.
    ///
    /// One read per document; the reads are not taken as a snapshot.
    pub fn counts_for_term(&self, term: &str) -> Result<BTreeMap<String, u32>> {
        let mut result = BTreeMap::new();
        for doc_id in self.documents_containing(term)? {
            let count = self.count_in(&doc_id, term)?;
            result.insert(doc_id, count);
        }
        Ok(result)
    }

    /// Everything recorded for one document.
    pub fn term_counts(&self, doc_id: &str) -> Result<TermCounts> {
        let key = doc_counters_key(doc_id);
        let Some(fields) = self.store.hash_get_all(&key)? else {
            return Err(IndexError::NotIndexed(doc_id.to_string()));
        };
        let mut counts = TermCounts::new(doc_id);
        for (term, raw) in fields {
            let count = parse_count(&key, &term, raw)?;
            counts.set(term, count);
        }
        Ok(counts)
    }
}

fn parse_count(key: &str, field: &str, raw: String) -> Result<u32> {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(IndexError::CorruptValue { key: key.to_string(), field: field.to_string(), value: raw }),
    }
}
