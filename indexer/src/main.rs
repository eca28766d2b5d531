use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use kvindex::{keys, IndexConfig, InvertedIndex, SledStore, TextTermCounter};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

type Index = InvertedIndex<SledStore, TextTermCounter>;

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    body: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl InputDoc {
    fn doc_id(&self) -> &str {
        keys::document_id(&self.id, self.url.as_deref())
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a term-count inverted index stored in sled", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// sled database directory (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// JSON config file with `store` and `tokenizer` sections
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Flush to disk after every committed document
    #[arg(long, global = true, default_value_t = false)]
    flush: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index JSON/JSONL documents from a file or directory
    Index {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Leave documents that are already indexed untouched
        #[arg(long, default_value_t = false)]
        skip_indexed: bool,
        /// Apply English stemming
        #[arg(long, default_value_t = false)]
        stem: bool,
        /// Drop English stop words
        #[arg(long, default_value_t = false)]
        stopwords: bool,
    },
    /// Show every document containing a term, with counts
    Lookup {
        #[arg(long)]
        term: String,
    },
    /// Show how often a term occurs in one document
    Count {
        #[arg(long)]
        doc: String,
        #[arg(long)]
        term: String,
    },
    /// List indexed terms
    Terms,
    /// List indexed documents
    Docs,
    /// Print every term with its documents and counts
    Dump,
    /// Delete index keys
    Clear {
        #[arg(long, value_enum, default_value_t = ClearTarget::All)]
        what: ClearTarget,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ClearTarget {
    Terms,
    Counters,
    All,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let mut config = match &cli.store.config {
        Some(path) => IndexConfig::from_json_file(path).with_context(|| format!("reading config {}", path.display()))?,
        None => IndexConfig::default(),
    };
    if let Some(db) = cli.store.db {
        config.store.path = db;
    }
    config.store.flush_on_commit |= cli.store.flush;
    if let Commands::Index { stem, stopwords, .. } = &cli.command {
        config.tokenizer.stem |= *stem;
        config.tokenizer.remove_stopwords |= *stopwords;
    }

    let store = SledStore::from_config(&config.store)
        .with_context(|| format!("opening store at {}", config.store.path.display()))?;
    let index = InvertedIndex::with_counter(store, TextTermCounter::new(config.tokenizer.clone()));

    match cli.command {
        Commands::Index { input, skip_indexed, .. } => index_path(&index, &input, skip_indexed)?,
        Commands::Lookup { term } => {
            for (doc, count) in index.counts_for_term(&term)? {
                println!("{doc}\t{count}");
            }
        }
        Commands::Count { doc, term } => println!("{}", index.count_in(&doc, &term)?),
        Commands::Terms => {
            for term in index.indexed_terms()? {
                println!("{term}");
            }
        }
        Commands::Docs => {
            for doc in index.indexed_documents()? {
                println!("{doc}");
            }
        }
        Commands::Dump => index.dump(io::stdout().lock())?,
        Commands::Clear { what } => {
            let removed = match what {
                ClearTarget::Terms => index.clear_term_sets()?,
                ClearTarget::Counters => index.clear_document_counters()?,
                ClearTarget::All => index.clear_all()?,
            };
            tracing::info!(removed, "clear complete");
        }
    }
    index.store().flush()?;
    Ok(())
}

#[derive(Default)]
struct Tally {
    indexed: usize,
    skipped: usize,
    stale_terms: usize,
}

fn index_path(index: &Index, input: &Path, skip_indexed: bool) -> Result<()> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        anyhow::bail!("input {} does not exist", input.display());
    }
    files.sort();

    let mut tally = Tally::default();
    for file in files {
        let docs = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") { read_jsonl(&file)? } else { read_json(&file)? };
        tracing::debug!(file = %file.display(), docs = docs.len(), "read input file");
        for doc in docs {
            ingest_doc(index, &doc, skip_indexed, &mut tally)?;
        }
    }

    tracing::info!(indexed = tally.indexed, skipped = tally.skipped, stale_terms = tally.stale_terms, "indexing complete");
    Ok(())
}

fn read_jsonl(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let mut docs = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc = serde_json::from_str(&line).with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        docs.push(doc);
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs = match json {
        serde_json::Value::Array(arr) => arr.into_iter().map(serde_json::from_value).collect::<Result<Vec<_>, _>>()?,
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => Vec::new(),
    };
    Ok(docs)
}

fn ingest_doc(index: &Index, doc: &InputDoc, skip_indexed: bool, tally: &mut Tally) -> Result<()> {
    let doc_id = doc.doc_id();
    if skip_indexed && index.is_indexed(doc_id)? {
        tracing::debug!(doc_id, "already indexed, skipping");
        tally.skipped += 1;
        return Ok(());
    }
    let report = index
        .index_document(doc_id, &doc.body)
        .with_context(|| format!("indexing {doc_id}"))?;
    tracing::debug!(doc_id, title = doc.title.as_deref().unwrap_or(""), terms = report.terms, "indexed");
    tally.indexed += 1;
    tally.stale_terms += report.stale_terms_removed;
    Ok(())
}
