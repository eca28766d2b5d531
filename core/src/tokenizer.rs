use crate::config::TokenizerConfig;
use crate::counts::{TermCounter, TermCounts};
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::error::Error;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Splits text into normalized terms: NFKC, lowercase, Unicode words, then
/// optional stop-word removal and English stemming.
pub struct Tokenizer {
    config: TokenizerConfig,
    stemmer: Option<Stemmer>,
}

impl Tokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        let stemmer = config.stem.then(|| Stemmer::create(Algorithm::English));
        Self { config, stemmer }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        let mut tokens = Vec::new();
        for mat in WORD.find_iter(&normalized) {
            let token = mat.as_str();
            if self.config.remove_stopwords && STOPWORDS.contains(token) { continue; }
            let term = match &self.stemmer {
                Some(s) => s.stem(token).into_owned(),
                None => token.to_string(),
            };
            let len = term.chars().count();
            if len < self.config.min_token_length || len > self.config.max_token_length { continue; }
            tokens.push(term);
        }
        tokens
    }
}

impl Default for Tokenizer {
    fn default() -> Self { Self::new(TokenizerConfig::default()) }
}

/// Counts the terms of plain-text documents.
#[derive(Default)]
pub struct TextTermCounter {
    tokenizer: Tokenizer,
}

impl TextTermCounter {
    pub fn new(config: TokenizerConfig) -> Self {
        Self { tokenizer: Tokenizer::new(config) }
    }
}

impl TermCounter for TextTermCounter {
    type Content = str;

    fn count(&self, doc_id: &str, content: &str) -> Result<TermCounts, Box<dyn Error + Send + Sync>> {
        let mut counts = TermCounts::new(doc_id);
        for term in self.tokenizer.tokenize(content) {
            counts.increment(term);
        }
        Ok(counts)
    }
}
