//! Hybrid search: cheap candidates, exhaustive widening, exact cosine re-rank.
//!
//! 1. Candidates come from the query's grid cell or from the library's
//!    index strategy.
//! 2. Optional keywords intersect them with the inverted index postings.
//! 3. If fewer than `k` survive, every remaining chunk of the library is added
//!    (same keyword constraint), in insertion order.
//! 4. Every candidate is scored by cosine similarity; the top `k` are returned,
//!    ties broken by chunk insertion order.

use crate::config::CandidateSource;
use crate::error::{EntityKind, Error, Result};
use crate::index::distance::cosine_similarity;
use crate::index::validate_vector;
use crate::model::Chunk;
use crate::search::types::{SearchHit, SearchOptions};
use crate::storage::store::StoreState;
use std::collections::HashSet;

/// Read-only search over a locked store state.
pub(crate) struct HybridSearchOrchestrator<'a> {
    state: &'a StoreState,
    source: CandidateSource,
}

impl<'a> HybridSearchOrchestrator<'a> {
    pub(crate) fn new(state: &'a StoreState, source: CandidateSource) -> Self {
        Self { state, source }
    }

    pub(crate) fn search(
        &self,
        library_id: &str,
        query: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        let state = self.state;
        if !state.libraries.contains_key(library_id) {
            return Err(Error::not_found(EntityKind::Library, library_id));
        }
        validate_vector(query)?;
        let Some(dimension) = state.library_dimension(library_id, None) else {
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }
        let k = options.k;
        if k == 0 {
            return Ok(Vec::new());
        }

        let (Some(order), Some(indexes)) = (
            state.library_chunks.get(library_id),
            state.indexes.get(library_id),
        ) else {
            return Ok(Vec::new());
        };

        let candidates: Vec<String> = match self.source {
            CandidateSource::Grid => indexes.grid.candidates(query),
            CandidateSource::Index => match indexes.strategy.search(query, k) {
                Ok(neighbors) => neighbors.into_iter().map(|n| n.id).collect(),
                Err(Error::IndexNotTrained) => {
                    tracing::debug!(
                        "{} index of {} not trained, falling back to a full scan",
                        indexes.strategy.name(),
                        library_id
                    );
                    Vec::new()
                }
                Err(e) => return Err(e),
            },
        };

        let allowed = options
            .keywords
            .as_deref()
            .and_then(|kw| indexes.inverted.matching_all(kw));
        let admits = |id: &str| allowed.as_ref().map_or(true, |set| set.contains(id));

        let mut seen: HashSet<&str> = HashSet::with_capacity(candidates.len());
        let mut pool: Vec<&Chunk> = Vec::with_capacity(k);
        for id in &candidates {
            if !admits(id.as_str()) || !seen.insert(id.as_str()) {
                continue;
            }
            if let Some(chunk) = state.chunks.get(id) {
                pool.push(chunk);
            }
        }

        if pool.len() < k {
            let narrowed = pool.len();
            for id in order {
                if seen.contains(id.as_str()) || !admits(id.as_str()) {
                    continue;
                }
                if let Some(chunk) = state.chunks.get(id) {
                    pool.push(chunk);
                }
            }
            tracing::debug!(
                "Widened search in {}: {} candidates → {}",
                library_id,
                narrowed,
                pool.len()
            );
        }

        let mut scored: Vec<(f32, usize, &Chunk)> = pool
            .into_iter()
            .map(|c| {
                let seq = order.get_index_of(&c.id).unwrap_or(usize::MAX);
                (cosine_similarity(query, &c.embedding), seq, c)
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, _, chunk)| SearchHit {
                chunk: chunk.clone(),
                score,
            })
            .collect())
    }
}
