//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor index.
//!
//! Nodes live in flat arrays addressed by `u32` node ids; neighbor lists are
//! id lists per layer. Deletion is a tombstone: a deleted node is never
//! returned but still routes traversals until [`HnswIndex::compact_graph`]
//! rebuilds the graph without it.

/// HNSW graph structure, configuration, and the `VectorIndex` impl.
pub mod graph;
/// Insertion with bidirectional links and heuristic neighbor pruning.
pub mod insert;
/// Single-layer beam search and multi-layer KNN.
pub mod search;
/// Generation-based visited set for graph traversal.
pub mod visited;

pub use graph::{HnswConfig, HnswIndex};
pub use search::knn_search;
