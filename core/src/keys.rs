//! Key layout of the index inside the store.
//!
//! Two disjoint namespaces: `URLSet:<term>` holds the set of documents
//! containing a term, `TermCounter:<doc id>` holds a document's term counts.
//! Values are recovered by stripping the exact prefix, never by splitting,
//! so document ids such as URLs may contain the delimiter freely. Terms may
//! not (see [`validate_term`]).

use crate::error::{IndexError, Result};

pub const DELIMITER: char = ':';
pub const TERM_SET_PREFIX: &str = "URLSet:";
pub const DOC_COUNTERS_PREFIX: &str = "TermCounter:";

pub const TERM_SET_PATTERN: &str = "URLSet:*";
pub const DOC_COUNTERS_PATTERN: &str = "TermCounter:*";

pub fn term_set_key(term: &str) -> String {
    format!("{TERM_SET_PREFIX}{term}")
}

pub fn doc_counters_key(doc_id: &str) -> String {
    format!("{DOC_COUNTERS_PREFIX}{doc_id}")
}

/// Recover the term from a term-set key.
pub fn term_from_key(key: &str) -> Result<&str> {
    split_key(key, TERM_SET_PREFIX)
}

/// Recover the document id from a counters key.
pub fn doc_id_from_key(key: &str) -> Result<&str> {
    split_key(key, DOC_COUNTERS_PREFIX)
}

fn split_key<'a>(key: &'a str, prefix: &str) -> Result<&'a str> {
    match key.strip_prefix(prefix) {
        Some(rest) if !rest.is_empty() => Ok(rest),
        _ => Err(IndexError::CorruptKey(key.to_string())),
    }
}

/// Documents are keyed by URL when they carry a non-empty one, else by id.
pub fn document_id<'a>(id: &'a str, url: Option<&'a str>) -> &'a str {
    url.filter(|u| !u.is_empty()).unwrap_or(id)
}

pub fn validate_term(term: &str) -> Result<()> {
    if term.is_empty() || term.contains(DELIMITER) {
        return Err(IndexError::InvalidTerm(term.to_string()));
    }
    Ok(())
}

pub fn validate_doc_id(doc_id: &str) -> Result<()> {
    if doc_id.is_empty() {
        return Err(IndexError::InvalidDocumentId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_survive_the_round_trip() {
        let url = "https://en.wikipedia.org/wiki/Java_(programming_language)";
        let key = doc_counters_key(url);
        assert_eq!(key, format!("TermCounter:{url}"));
        assert_eq!(doc_id_from_key(&key).unwrap(), url);
    }

    #[test]
    fn namespaces_do_not_overlap() {
        assert!(term_from_key(&doc_counters_key("doc")).is_err());
        assert!(doc_id_from_key(&term_set_key("java")).is_err());
        assert_eq!(term_from_key("URLSet:java").unwrap(), "java");
    }

    #[test]
    fn url_takes_precedence_over_id() {
        assert_eq!(document_id("doc1", Some("https://example.com/a")), "https://example.com/a");
        assert_eq!(document_id("doc1", Some("")), "doc1");
        assert_eq!(document_id("doc1", None), "doc1");
    }

    #[test]
    fn empty_suffix_is_corrupt() {
        assert!(matches!(term_from_key("URLSet:"), Err(IndexError::CorruptKey(_))));
    }

    #[test]
    fn delimiter_in_term_is_rejected() {
        assert!(validate_term("a:b").is_err());
        assert!(validate_term("").is_err());
        assert!(validate_term("java").is_ok());
        assert!(validate_doc_id("").is_err());
    }
}
