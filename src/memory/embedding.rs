use serde::{ Serialize, Deserialize };
use std::collections::HashMap;

/// Sparse term-frequency vector: lowercase token -> occurrence count.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseVector(HashMap<String, u32>);

impl SparseVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for `term`, zero when absent.
    pub fn get(&self, term: &str) -> u32 {
        self.0.get(term).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    fn increment(&mut self, term: &str) {
        *self.0.entry(term.to_string()).or_insert(0) += 1;
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Lowercases `text`, drops everything that is neither a word character
/// (`[A-Za-z0-9_]`) nor whitespace, and counts the whitespace-separated tokens.
pub fn embed(text: &str) -> SparseVector {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| is_word_char(*c) || c.is_whitespace())
        .collect();

    let mut vector = SparseVector::new();
    for token in cleaned.split_whitespace() {
        vector.increment(token);
    }
    vector
}
