use thiserror::Error;

/// Failures raised by a [`KeyValueStore`](crate::store::KeyValueStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("value codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("key {key:?} does not hold a {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("invalid key pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("key {key:?} changed since it was read")]
    Conflict { key: String },
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Errors surfaced by the inverted index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("no count for term {term:?} in document {doc_id:?}")]
    NotFound { doc_id: String, term: String },

    #[error("document {0:?} is not indexed")]
    NotIndexed(String),

    #[error("malformed key in index namespace: {0:?}")]
    CorruptKey(String),

    #[error("field {field:?} of {key:?} holds non-count value {value:?}")]
    CorruptValue { key: String, field: String, value: String },

    #[error("invalid term {0:?}")]
    InvalidTerm(String),

    #[error("document id must not be empty")]
    InvalidDocumentId,

    #[error("term counter failed: {0}")]
    Counter(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl IndexError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, IndexError::NotFound { .. } | IndexError::NotIndexed(_))
    }

    /// True when the failure came from the store rather than the request.
    pub fn is_storage(&self) -> bool {
        matches!(self, IndexError::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
