use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Top-level configuration shared by the indexer and the server.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub store: StoreConfig,
    pub tokenizer: TokenizerConfig,
}

impl IndexConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// sled database directory
    pub path: PathBuf,
    /// Use a throwaway database; `path` is ignored.
    pub temporary: bool,
    pub flush_on_commit: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("./index.sled"), temporary: false, flush_on_commit: false }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub remove_stopwords: bool,
    pub stem: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self { remove_stopwords: false, stem: false, min_token_length: 1, max_token_length: 64 }
    }
}
