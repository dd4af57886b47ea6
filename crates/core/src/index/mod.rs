//! Vector indices and auxiliary candidate filters.
//!
//! Every strategy implements [`VectorIndex`]: it ingests `(vector, id)` pairs
//! and answers k-nearest-neighbor queries. Indices only cache copies of
//! embeddings; the [`Store`](crate::storage::Store) remains the source of truth
//! and can rebuild any index from its chunk set.

/// Exact O(n·d) scan.
pub mod brute_force;
/// Distance metrics: cosine and euclidean.
pub mod distance;
/// Coarse quantization buckets for cheap candidate narrowing.
pub mod grid;
/// HNSW multi-layer proximity graph.
pub mod hnsw;
/// Token → chunk-id postings for keyword-constrained search.
pub mod inverted;
/// Single-probe k-means clustering index.
pub mod ivf;

pub use brute_force::BruteForceIndex;
pub use grid::GridIndex;
pub use hnsw::HnswIndex;
pub use inverted::InvertedIndex;
pub use ivf::{IvfIndex, TrainReport};

use crate::config::IndexKind;
use crate::error::Result;
use std::collections::HashSet;
use std::fmt;

/// A single index hit: external id plus cosine distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: String,
    pub distance: f32,
}

/// Outcome of asking an index to forget a set of ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retraction {
    /// The ids were removed or tombstoned in place.
    Applied,
    /// The index has no removal primitive; the caller must rebuild it.
    NeedsRebuild,
}

/// Common interface over BruteForce, IVF, and HNSW.
pub trait VectorIndex: fmt::Debug + Send + Sync {
    /// Short strategy name for logs and stats.
    fn name(&self) -> &'static str;

    /// Ingest one vector under `id`.
    fn add_vector(&mut self, vector: &[f32], id: &str) -> Result<()>;

    /// Up to `k` nearest neighbors of `query`, ascending by distance.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Forget every id in `ids`.
    fn retract(&mut self, ids: &HashSet<String>) -> Retraction;

    /// Drop all vectors, keeping configuration.
    fn clear(&mut self);

    /// Number of live (searchable or pending) vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Soft-deleted entries still held for connectivity.
    fn tombstoned(&self) -> usize {
        0
    }

    /// Re-run any offline training step over the vectors held.
    fn train(&mut self) -> Result<Option<TrainReport>> {
        Ok(None)
    }

    /// Physically drop tombstoned entries. Returns how many were removed.
    fn compact(&mut self) -> usize {
        0
    }
}

/// Build an empty index for the configured strategy.
pub fn build_index(kind: &IndexKind) -> Box<dyn VectorIndex> {
    match kind {
        IndexKind::BruteForce => Box::new(BruteForceIndex::new()),
        IndexKind::Ivf(cfg) => Box::new(IvfIndex::new(cfg.clone())),
        IndexKind::Hnsw(cfg) => Box::new(HnswIndex::new(cfg.clone())),
    }
}

/// Check that `vector` is non-empty and finite.
pub(crate) fn validate_vector(vector: &[f32]) -> Result<()> {
    if vector.is_empty() {
        return Err(crate::Error::InvalidVector("empty embedding".into()));
    }
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(crate::Error::InvalidVector(
            "embedding contains NaN or infinity".into(),
        ));
    }
    Ok(())
}
