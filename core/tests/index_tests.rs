use kvindex::{
    IndexError, InvertedIndex, KeyValueStore, MemoryStore, SledStore, StoreError, TermCounts, WriteBatch,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn counts(doc: &str, pairs: &[(&str, u32)]) -> TermCounts {
    TermCounts::from_counts(doc, pairs.iter().copied())
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Wraps a memory store and rejects commits while `down` is set.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    down: AtomicBool,
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> { self.inner.get(key) }
    fn exists(&self, key: &str) -> Result<bool, StoreError> { self.inner.exists(key) }
    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> { self.inner.hash_get(key, field) }
    fn hash_get_all(&self, key: &str) -> Result<Option<BTreeMap<String, String>>, StoreError> { self.inner.hash_get_all(key) }
    fn set_members(&self, key: &str) -> Result<BTreeSet<String>, StoreError> { self.inner.set_members(key) }
    fn keys_matching(&self, pattern: &str) -> Result<BTreeSet<String>, StoreError> { self.inner.keys_matching(pattern) }

    fn apply_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        self.inner.apply_batch(batch)
    }
}

/// Holds the first `parties` counter reads after `arm` at a barrier, so that
/// concurrent ingests all diff against the same prior state.
struct GatedStore {
    inner: MemoryStore,
    armed: AtomicBool,
    reads: AtomicUsize,
    parties: usize,
    gate: Barrier,
}

impl GatedStore {
    fn new(parties: usize) -> Self {
        Self { inner: MemoryStore::new(), armed: AtomicBool::new(false), reads: AtomicUsize::new(0), parties, gate: Barrier::new(parties) }
    }

    fn arm(&self) { self.armed.store(true, Ordering::SeqCst); }
}

impl KeyValueStore for GatedStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> { self.inner.get(key) }
    fn exists(&self, key: &str) -> Result<bool, StoreError> { self.inner.exists(key) }
    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> { self.inner.hash_get(key, field) }
    fn set_members(&self, key: &str) -> Result<BTreeSet<String>, StoreError> { self.inner.set_members(key) }
    fn keys_matching(&self, pattern: &str) -> Result<BTreeSet<String>, StoreError> { self.inner.keys_matching(pattern) }
    fn apply_batch(&self, batch: WriteBatch) -> Result<(), StoreError> { self.inner.apply_batch(batch) }

    fn hash_get_all(&self, key: &str) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        let prior = self.inner.hash_get_all(key);
        if self.armed.load(Ordering::SeqCst) && self.reads.fetch_add(1, Ordering::SeqCst) < self.parties {
            self.gate.wait();
        }
        prior
    }
}

/// Every (doc, term) pair visible from the term side must be visible from
/// the document side with a positive count, and the other way round.
fn assert_dual<S: KeyValueStore>(index: &InvertedIndex<S>) {
    for term in index.indexed_terms().unwrap() {
        for doc in index.documents_containing(&term).unwrap() {
            assert!(index.count_in(&doc, &term).unwrap() > 0, "{doc} missing count for {term}");
        }
    }
    for doc in index.indexed_documents().unwrap() {
        for (term, _) in index.term_counts(&doc).unwrap().iter() {
            assert!(index.documents_containing(term).unwrap().contains(&doc), "{term} set missing {doc}");
        }
    }
}

#[test]
fn scenario_single_document() {
    let index = InvertedIndex::new(MemoryStore::new());
    index.ingest(&counts("doc1", &[("the", 5), ("language", 2)])).unwrap();

    assert_eq!(index.documents_containing("the").unwrap(), set(&["doc1"]));
    assert_eq!(index.count_in("doc1", "language").unwrap(), 2);
    let expected: BTreeMap<String, u32> = [("doc1".to_string(), 5)].into_iter().collect();
    assert_eq!(index.counts_for_term("the").unwrap(), expected);
}

#[test]
fn missing_term_is_not_found() {
    let index = InvertedIndex::new(MemoryStore::new());
    index.ingest(&counts("doc1", &[("the", 5)])).unwrap();

    let err = index.count_in("doc1", "nonexistent-term").unwrap_err();
    assert!(matches!(err, IndexError::NotFound { .. }));
    assert!(index.count_in("nobody", "the").unwrap_err().is_not_found());
    assert!(index.documents_containing("nonexistent-term").unwrap().is_empty());
    assert!(index.counts_for_term("nonexistent-term").unwrap().is_empty());
}

#[test]
fn duality_holds_across_documents() {
    let index = InvertedIndex::new(MemoryStore::new());
    index.ingest(&counts("doc1", &[("java", 3), ("language", 1)])).unwrap();
    index.ingest(&counts("doc2", &[("language", 4), ("rust", 2)])).unwrap();
    index.ingest(&counts("doc1", &[("java", 1), ("jvm", 1)])).unwrap();
    assert_dual(&index);

    for doc in ["doc1", "doc2"] {
        for term in ["java", "language", "rust", "jvm"] {
            let listed = index.documents_containing(term).unwrap().contains(doc);
            let counted = index.count_in(doc, term).is_ok();
            assert_eq!(listed, counted, "{doc}/{term}");
        }
    }
}

#[test]
fn reingest_is_idempotent() {
    let index = InvertedIndex::new(MemoryStore::new());
    let doc = counts("doc1", &[("a", 2), ("b", 7)]);
    index.ingest(&doc).unwrap();
    let once = (index.counts_for_term("a").unwrap(), index.documents_containing("b").unwrap());

    let report = index.ingest(&doc).unwrap();
    assert!(report.replaced);
    assert_eq!(report.stale_terms_removed, 0);
    let twice = (index.counts_for_term("a").unwrap(), index.documents_containing("b").unwrap());
    assert_eq!(once, twice);
}

#[test]
fn reingest_replaces_prior_terms() {
    let index = InvertedIndex::new(MemoryStore::new());
    index.ingest(&counts("doc1", &[("a", 1), ("b", 1)])).unwrap();
    index.ingest(&counts("doc2", &[("a", 1)])).unwrap();

    let report = index.ingest(&counts("doc1", &[("b", 9), ("c", 2)])).unwrap();
    assert_eq!(report.stale_terms_removed, 1);

    assert!(!index.documents_containing("a").unwrap().contains("doc1"));
    assert!(index.documents_containing("a").unwrap().contains("doc2"));
    assert!(index.documents_containing("c").unwrap().contains("doc1"));
    assert_eq!(index.count_in("doc1", "b").unwrap(), 9);
    assert!(index.count_in("doc1", "a").unwrap_err().is_not_found());
    assert_dual(&index);
}

#[test]
fn term_without_documents_disappears() {
    let index = InvertedIndex::new(MemoryStore::new());
    index.ingest(&counts("doc1", &[("gone", 1), ("kept", 1)])).unwrap();
    index.ingest(&counts("doc1", &[("kept", 1)])).unwrap();
    assert_eq!(index.indexed_terms().unwrap(), set(&["kept"]));
}

#[test]
fn existence_follows_ingest() {
    let index = InvertedIndex::new(MemoryStore::new());
    assert!(!index.is_indexed("doc1").unwrap());
    index.ingest(&counts("doc1", &[("x", 1)])).unwrap();
    assert!(index.is_indexed("doc1").unwrap());
}

#[test]
fn empty_document_is_still_indexed() {
    let index = InvertedIndex::new(MemoryStore::new());
    let report = index.index_document("blank", "  ... 123 ").unwrap();
    assert_eq!(report.terms, 0);
    assert!(index.is_indexed("blank").unwrap());
    assert!(index.term_counts("blank").unwrap().is_empty());
    assert_eq!(index.indexed_documents().unwrap(), set(&["blank"]));
}

#[test]
fn clear_all_empties_the_index() {
    let index = InvertedIndex::new(MemoryStore::new());
    index.ingest(&counts("doc1", &[("a", 1)])).unwrap();
    index.ingest(&counts("doc2", &[("b", 1)])).unwrap();

    index.clear_all().unwrap();
    assert!(index.indexed_terms().unwrap().is_empty());
    assert!(!index.is_indexed("doc1").unwrap());
    assert!(!index.is_indexed("doc2").unwrap());
}

#[test]
fn clears_are_scoped_to_their_namespace() {
    let index = InvertedIndex::new(MemoryStore::new());
    index.ingest(&counts("doc1", &[("a", 1), ("b", 2)])).unwrap();

    assert_eq!(index.clear_term_sets().unwrap(), 2);
    assert!(index.is_indexed("doc1").unwrap());
    assert!(index.indexed_terms().unwrap().is_empty());

    assert_eq!(index.clear_document_counters().unwrap(), 1);
    assert!(!index.is_indexed("doc1").unwrap());
}

#[test]
fn failed_commit_leaves_previous_state() {
    let index = InvertedIndex::new(FlakyStore::default());
    index.ingest(&counts("doc1", &[("a", 1), ("b", 1)])).unwrap();

    index.store().down.store(true, Ordering::SeqCst);
    let err = index.ingest(&counts("doc1", &[("b", 5), ("c", 1)])).unwrap_err();
    assert!(err.is_storage());

    assert!(index.documents_containing("a").unwrap().contains("doc1"));
    assert!(index.documents_containing("c").unwrap().is_empty());
    assert_eq!(index.count_in("doc1", "b").unwrap(), 1);

    // the same ingest succeeds once the store is back
    index.store().down.store(false, Ordering::SeqCst);
    index.ingest(&counts("doc1", &[("b", 5), ("c", 1)])).unwrap();
    assert_eq!(index.count_in("doc1", "b").unwrap(), 5);
    assert_dual(&index);
}

#[test]
fn invalid_input_is_rejected_before_writing() {
    let index = InvertedIndex::new(MemoryStore::new());
    let err = index.ingest(&counts("doc1", &[("ok", 1), ("bad:term", 1)])).unwrap_err();
    assert!(matches!(err, IndexError::InvalidTerm(t) if t == "bad:term"));
    assert!(index.store().is_empty());

    let err = index.ingest(&counts("", &[("ok", 1)])).unwrap_err();
    assert!(matches!(err, IndexError::InvalidDocumentId));
}

#[test]
fn url_document_ids_round_trip() {
    let index = InvertedIndex::new(MemoryStore::new());
    let url = "https://en.wikipedia.org/wiki/Programming_language";
    index.index_document(url, "A programming language is a system of notation.").unwrap();

    assert_eq!(index.indexed_documents().unwrap(), set(&[url]));
    assert_eq!(index.count_in(url, "language").unwrap(), 1);
}

#[test]
fn sled_index_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let index = InvertedIndex::new(SledStore::open(dir.path()).unwrap());
        index.ingest(&counts("doc1", &[("the", 5), ("language", 2)])).unwrap();
        index.store().flush().unwrap();
    }
    let index = InvertedIndex::new(SledStore::open(dir.path()).unwrap());
    assert!(index.is_indexed("doc1").unwrap());
    assert_eq!(index.count_in("doc1", "the").unwrap(), 5);
    assert_eq!(index.indexed_terms().unwrap(), set(&["language", "the"]));
    assert_dual(&index);
}

#[test]
fn sled_reingest_replaces_prior_terms() {
    let index = InvertedIndex::new(SledStore::temporary().unwrap());
    index.ingest(&counts("doc1", &[("a", 1), ("b", 1)])).unwrap();
    index.ingest(&counts("doc1", &[("b", 3), ("c", 1)])).unwrap();

    assert!(index.documents_containing("a").unwrap().is_empty());
    assert_eq!(index.count_in("doc1", "b").unwrap(), 3);
    assert_eq!(index.indexed_terms().unwrap(), set(&["b", "c"]));
}

#[test]
fn concurrent_reingest_of_one_document_keeps_duality() {
    let index = Arc::new(InvertedIndex::new(GatedStore::new(2)));
    index.ingest(&counts("doc1", &[("a", 1)])).unwrap();
    index.store().arm();

    let writers: Vec<_> = [("b", 2), ("c", 3)]
        .into_iter()
        .map(|(term, n)| {
            let index = Arc::clone(&index);
            thread::spawn(move || index.ingest(&counts("doc1", &[(term, n)])).unwrap())
        })
        .collect();
    for w in writers {
        let report = w.join().unwrap();
        assert_eq!(report.stale_terms_removed, 1);
    }

    assert_dual(&index);
    assert!(index.documents_containing("a").unwrap().is_empty());
    let terms = index.indexed_terms().unwrap();
    assert_eq!(terms.len(), 1, "one writer wins outright: {terms:?}");

    index.ingest(&counts("doc1", &[("z", 1)])).unwrap();
    assert_dual(&index);
    assert_eq!(index.indexed_terms().unwrap(), set(&["z"]));
}

#[test]
fn stale_counters_snapshot_is_rejected() {
    let store = MemoryStore::new();
    store.hash_set("TermCounter:doc1", "a", "1").unwrap();

    let mut batch = store.begin_batch();
    batch.expect_hash("TermCounter:doc1", None).set_add("URLSet:b", "doc1");
    assert!(batch.commit().unwrap_err().is_conflict());
    assert!(store.set_members("URLSet:b").unwrap().is_empty());
}
