//! # chunkdb-core
//!
//! Embeddable vector search over a library → document → chunk store.
//!
//! The [`Store`] owns every record and keeps, per library, one vector index
//! (exact brute force, single-probe IVF, or HNSW) plus a coarse grid and a
//! keyword inverted index. Searches narrow candidates through those indices,
//! widen with an exhaustive scan when fewer than `k` remain, and re-rank by
//! cosine similarity. State is snapshotted to JSON after every mutation and
//! indices are rebuilt from the records on load.
//!
//! The crate is synchronous and never installs a `tracing` subscriber.

/// Compile-time defaults and runtime `StoreConfig`.
pub mod config;
/// Embedding provider contract for the text entry points.
pub mod embedding;
/// Error taxonomy.
pub mod error;
/// Vector indices and auxiliary candidate filters.
pub mod index;
/// Library, Document, and Chunk records.
pub mod model;
/// Hybrid search orchestration and result types.
pub mod search;
/// The store and its JSON snapshot.
pub mod storage;

pub use config::{CandidateSource, IndexKind, StoreConfig};
pub use embedding::EmbeddingProvider;
pub use error::{EntityKind, Error, Result};
pub use index::hnsw::HnswConfig;
pub use index::ivf::IvfConfig;
pub use index::{TrainReport, VectorIndex};
pub use model::{
    Chunk, ChunkUpdate, Document, DocumentUpdate, DocumentWithChunks, Library, LibraryUpdate,
    LibraryWithDocuments, Metadata, MetadataValue,
};
pub use search::{SearchHit, SearchOptions};
pub use storage::{Store, StoreStats};
