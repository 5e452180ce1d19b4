//! Deterministic normalization and tokenization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tokenization strategy for a blind index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tokenization {
    /// The whole normalized value is a single token. Matches only full
    /// values.
    Exact,
    /// Every word plus its n-grams of the given size. Matches substrings
    /// of at least `size` characters.
    NGram {
        /// Gram size, typically 3.
        size: usize,
    },
}

impl Default for Tokenization {
    fn default() -> Self {
        Tokenization::Exact
    }
}

/// Lowercase and collapse runs of whitespace to single spaces.
pub fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Tokenization {
    /// Tokenize a normalized value into the set of strings to be hashed.
    pub fn tokenize(&self, value: &str) -> BTreeSet<String> {
        let normalized = normalize(value);
        if normalized.is_empty() {
            return BTreeSet::new();
        }

        match self {
            Tokenization::Exact => [normalized].into_iter().collect(),
            Tokenization::NGram { size } => {
                let size = (*size).max(1);
                let mut tokens = BTreeSet::new();
                for word in normalized.split(' ') {
                    let chars: Vec<char> = word.chars().collect();
                    if chars.len() <= size {
                        tokens.insert(word.to_string());
                        continue;
                    }
                    for window in chars.windows(size) {
                        tokens.insert(window.iter().collect());
                    }
                }
                tokens
            }
        }
    }
}
