pub mod config;
pub mod counts;
pub mod error;
pub mod index;
pub mod keys;
pub mod maintenance;
pub mod pattern;
pub mod store;
pub mod tokenizer;

pub use config::{IndexConfig, StoreConfig, TokenizerConfig};
pub use counts::{TermCounter, TermCounts};
pub use error::{IndexError, Result, StoreError};
pub use index::{IngestReport, InvertedIndex};
pub use store::{BatchHandle, BatchOp, KeyValueStore, MemoryStore, SledStore, Value, WriteBatch};
pub use tokenizer::{TextTermCounter, Tokenizer};
