use std::collections::btree_map::{self, BTreeMap};
use std::error::Error;

/// Per-document term frequencies, labelled with the document they came from.
///
/// Counts are always positive: setting a term to zero drops it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermCounts {
    label: String,
    counts: BTreeMap<String, u32>,
}

impl TermCounts {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), counts: BTreeMap::new() }
    }

    pub fn from_counts<I, T>(label: impl Into<String>, counts: I) -> Self
    where
        I: IntoIterator<Item = (T, u32)>,
        T: Into<String>,
    {
        let mut tc = Self::new(label);
        for (term, count) in counts {
            tc.set(term, count);
        }
        tc
    }

    pub fn label(&self) -> &str { &self.label }

    pub fn get(&self, term: &str) -> Option<u32> { self.counts.get(term).copied() }

    pub fn increment(&mut self, term: impl Into<String>) {
        *self.counts.entry(term.into()).or_insert(0) += 1;
    }

    pub fn set(&mut self, term: impl Into<String>, count: u32) {
        let term = term.into();
        if count == 0 {
            self.counts.remove(&term);
        } else {
            self.counts.insert(term, count);
        }
    }

    pub fn len(&self) -> usize { self.counts.len() }
    pub fn is_empty(&self) -> bool { self.counts.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(t, c)| (t.as_str(), *c))
    }

    pub fn terms(&self) -> btree_map::Keys<'_, String, u32> { self.counts.keys() }

    /// Sum of all counts, i.e. the number of tokens that were counted.
    pub fn total(&self) -> u64 {
        self.counts.values().map(|&c| u64::from(c)).sum()
    }
}

/// Turns a document's content into term counts.
pub trait TermCounter {
    type Content: ?Sized;

    fn count(&self, doc_id: &str, content: &Self::Content) -> Result<TermCounts, Box<dyn Error + Send + Sync>>;
}
