//! Global configuration for chunkdb.
//!
//! Tuning parameters and limits are compile-time constants. Runtime choices
//! (persistence directory, index strategy, grid resolution) live in
//! [`StoreConfig`], which the CLI builds from arguments and environment variables.

use crate::index::hnsw::HnswConfig;
use crate::index::ivf::IvfConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of bidirectional links per HNSW node.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–64. Default: 16.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default ef parameter during HNSW index construction.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default ef parameter during HNSW search.
///
/// Controls the size of the dynamic candidate list during query.
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Maximum number of layers in the HNSW graph.
pub const HNSW_DEFAULT_MAX_LAYERS: usize = 16;

/// Seed for HNSW level sampling when none is configured.
pub const HNSW_DEFAULT_SEED: u64 = 0x5eed_1e7e1;

/// Default number of IVF clusters requested at training time.
pub const IVF_DEFAULT_CLUSTERS: usize = 100;

/// Lloyd iterations run after k-means++ seeding.
pub const IVF_KMEANS_ITERATIONS: usize = 20;

/// Seed for k-means++ centroid selection.
pub const IVF_DEFAULT_SEED: u64 = 0x1cf_c1a5;

/// Width of one grid cell along every dimension.
pub const GRID_DEFAULT_BIN_SIZE: f32 = 0.5;

/// File name of the JSON snapshot inside the data directory.
pub const SNAPSHOT_FILE_NAME: &str = "db.json";

/// Default directory for snapshot files.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Maximum page size accepted by the list operations.
pub const MAX_PAGE_LIMIT: usize = 1_000;

/// Default number of results (`k`) for a search.
pub const DEFAULT_K: usize = 5;

/// Which approximate (or exact) strategy backs each library's vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexKind {
    /// Exact O(n·d) scan.
    BruteForce,
    /// Single-probe clustering index; needs an explicit `train_index`.
    Ivf(IvfConfig),
    /// Multi-layer proximity graph.
    Hnsw(HnswConfig),
}

impl Default for IndexKind {
    fn default() -> Self {
        IndexKind::Hnsw(HnswConfig::default())
    }
}

impl IndexKind {
    /// Strategy name, matching `VectorIndex::name`.
    pub fn name(&self) -> &'static str {
        match self {
            IndexKind::BruteForce => "brute_force",
            IndexKind::Ivf(_) => "ivf",
            IndexKind::Hnsw(_) => "hnsw",
        }
    }
}

/// Where the orchestrator draws its first round of candidates from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    /// The query's grid bucket.
    #[default]
    Grid,
    /// The configured [`IndexKind`] strategy.
    Index,
}

/// Runtime configuration for a [`Store`](crate::storage::Store).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the snapshot. `None` keeps the store purely in memory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub index: IndexKind,
    #[serde(default = "default_bin_size")]
    pub grid_bin_size: f32,
    #[serde(default)]
    pub candidate_source: CandidateSource,
}

fn default_bin_size() -> f32 {
    GRID_DEFAULT_BIN_SIZE
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            index: IndexKind::default(),
            grid_bin_size: GRID_DEFAULT_BIN_SIZE,
            candidate_source: CandidateSource::default(),
        }
    }
}

impl StoreConfig {
    /// In-memory store with the given index strategy.
    pub fn in_memory(index: IndexKind) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// Persistent store rooted at `data_dir`.
    pub fn persistent(data_dir: impl Into<PathBuf>, index: IndexKind) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            index,
            ..Self::default()
        }
    }

    /// Full path of the snapshot file, if persistence is enabled.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join(SNAPSHOT_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_path() {
        let cfg = StoreConfig::persistent("/tmp/chunkdb", IndexKind::BruteForce);
        assert_eq!(
            cfg.snapshot_path(),
            Some(PathBuf::from("/tmp/chunkdb").join(SNAPSHOT_FILE_NAME))
        );
        assert_eq!(StoreConfig::default().snapshot_path(), None);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let cfg: StoreConfig = serde_json::from_str(r#"{"index": {"kind": "brute_force"}}"#)
            .expect("valid config");
        assert!(matches!(cfg.index, IndexKind::BruteForce));
        assert_eq!(cfg.grid_bin_size, GRID_DEFAULT_BIN_SIZE);
        assert_eq!(cfg.candidate_source, CandidateSource::Grid);
    }
}
