//! Library-scoped vector search with keyword constraints.

/// Candidate narrowing, exhaustive widening, and cosine re-ranking.
pub mod orchestrator;
/// `SearchOptions` and `SearchHit`.
pub mod types;

pub use types::{SearchHit, SearchOptions};
