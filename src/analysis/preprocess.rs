//! Tokenization and stopword removal ahead of topic modeling.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use stop_words::LANGUAGE;

/// Tokens shorter than this are dropped.
pub const MIN_TOKEN_CHARS: usize = 2;
/// Tokens longer than this are dropped.
pub const MAX_TOKEN_CHARS: usize = 15;

fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Runs of letters only: digits, underscores and punctuation all split tokens.
    RE.get_or_init(|| Regex::new(r"[^\W\d_]+").expect("token pattern is valid"))
}

/// Turns raw comment texts into lowercase token lists.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    stopwords: HashSet<String>,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    /// Create a preprocessor with the English stopword list.
    pub fn new() -> Self {
        let stopwords = stop_words::get(LANGUAGE::English)
            .iter()
            .map(|w| w.to_string().to_lowercase())
            .collect();
        Self { stopwords }
    }

    /// Add extra stopwords, e.g. the channel's own name.
    pub fn with_extra_stopwords<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stopwords
            .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
        self
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    /// Tokenize a single text.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        token_regex()
            .find_iter(&lower)
            .map(|m| m.as_str())
            .filter(|token| {
                let len = token.chars().count();
                (MIN_TOKEN_CHARS..=MAX_TOKEN_CHARS).contains(&len)
            })
            .filter(|token| !self.stopwords.contains(*token))
            .map(str::to_string)
            .collect()
    }

    /// Tokenize every text, keeping input order and length.
    pub fn process<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Vec<String>> {
        texts.iter().map(|t| self.tokenize(t.as_ref())).collect()
    }
}
