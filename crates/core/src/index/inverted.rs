//! Lexical inverted index: token → set of chunk ids.
//!
//! Tokens are case-folded alphanumeric runs; single characters and common
//! English stop words are skipped. The index is a pre-filter for
//! keyword-constrained vector search, not a ranking mechanism.

use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
        "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there",
        "these", "they", "this", "to", "was", "will", "with",
    ]
    .into_iter()
    .collect()
});

/// Split `text` into case-folded tokens, dropping stop words and one-character runs.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Token postings over chunk ids.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, IndexSet<String>>,
    /// id → distinct tokens it was indexed under, for removal.
    terms_of: HashMap<String, Vec<String>>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `text` under `id`, replacing any earlier text for the same id.
    pub fn add(&mut self, id: &str, text: &str) {
        self.remove(id);
        let mut terms: Vec<String> = Vec::new();
        for token in tokenize(text) {
            let posting = self.postings.entry(token.clone()).or_default();
            if posting.insert(id.to_string()) {
                terms.push(token);
            }
        }
        self.terms_of.insert(id.to_string(), terms);
    }

    /// Remove `id` from every posting. Returns `true` if it was indexed.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(terms) = self.terms_of.remove(id) else {
            return false;
        };
        for term in terms {
            if let Some(posting) = self.postings.get_mut(&term) {
                posting.shift_remove(id);
                if posting.is_empty() {
                    self.postings.remove(&term);
                }
            }
        }
        true
    }

    /// Ids indexed under a single (already case-folded) token.
    pub fn postings(&self, token: &str) -> Option<&IndexSet<String>> {
        self.postings.get(token)
    }

    /// Ids containing every token of `query`.
    ///
    /// Returns `None` when `query` yields no tokens, meaning "no constraint".
    pub fn matching_all(&self, query: &str) -> Option<HashSet<String>> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return None;
        }
        let mut lists: Vec<&IndexSet<String>> = Vec::with_capacity(tokens.len());
        for t in &tokens {
            match self.postings.get(t) {
                Some(p) => lists.push(p),
                None => return Some(HashSet::new()),
            }
        }
        // Intersect starting from the shortest posting list
        lists.sort_by_key(|p| p.len());
        let (first, rest) = lists.split_first()?;
        Some(
            first
                .iter()
                .filter(|id| rest.iter().all(|p| p.contains(*id)))
                .cloned()
                .collect(),
        )
    }

    /// Number of distinct tokens.
    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Number of indexed ids.
    pub fn len(&self) -> usize {
        self.terms_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms_of.is_empty()
    }

    pub fn clear(&mut self) {
        self.postings.clear();
        self.terms_of.clear();
    }
}
