//! Search request and result types.

use crate::config::{CandidateSource, DEFAULT_K};
use crate::model::Chunk;
use serde::Serialize;

/// Options for a library-scoped vector search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of hits.
    pub k: usize,
    /// Every token must appear in a hit's content (case-folded). `None` or a
    /// stop-word-only string means no keyword constraint.
    pub keywords: Option<String>,
    /// Overrides the store's configured candidate source for this query.
    pub candidates: Option<CandidateSource>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            keywords: None,
            candidates: None,
        }
    }
}

impl SearchOptions {
    pub fn with_k(k: usize) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }

    pub fn keywords(mut self, keywords: impl Into<String>) -> Self {
        self.keywords = Some(keywords.into());
        self
    }

    pub fn candidates(mut self, source: CandidateSource) -> Self {
        self.candidates = Some(source);
        self
    }
}

/// A chunk with its cosine similarity to the query (higher = more similar).
///
/// The chunk is a copy; mutating it never affects the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}
