//! Error taxonomy for the store, the indices, and the collaborators they consume.

use std::fmt;
use std::path::PathBuf;

/// Kind of entity named in a lookup or reference failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Library,
    Document,
    Chunk,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Library => "library",
            EntityKind::Document => "document",
            EntityKind::Chunk => "chunk",
        })
    }
}

/// Errors returned by chunkdb operations.
///
/// Lookup and validation errors go straight back to the caller and are never
/// retried internally. `StorageIo` on a write means the in-memory mutation was
/// applied but the snapshot was not; callers may retry with `Store::save_to_disk`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("IVF index queried before train()")]
    IndexNotTrained,

    /// Non-fatal: reported inside a `TrainReport`, never returned as `Err`.
    #[error("corpus too small for {requested} clusters, trained {actual}")]
    ClusterCountAdjusted { requested: usize, actual: usize },

    #[error("embedding provider failed: {0}")]
    EmbeddingProvider(String),

    #[error("snapshot I/O failed for {path:?}: {source}")]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot {path:?} is not valid: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{entity} references missing parent {id}")]
    InvalidParentReference { entity: EntityKind, id: String },

    #[error("id collision: {id} already exists")]
    IdCollision { id: String },

    #[error("invalid vector: {0}")]
    InvalidVector(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub(crate) fn storage_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::StorageIo {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for failures that left the in-memory state intact but
    /// the on-disk snapshot behind.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(self, Error::StorageIo { .. })
    }
}
