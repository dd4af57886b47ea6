//! HNSW graph structure and configuration.
//!
//! [`HnswConfig`] defines tuning parameters (m, m0, ef_construction, ef_search, seed).
//! [`HnswIndex`] stores nodes in flat arrays indexed by a `u32` node id:
//! one contiguous vector arena, per-node neighbor lists per layer, layer
//! assignments, and tombstone flags. Neighbor lists hold node ids, never
//! references, so the bidirectional graph has no ownership cycles.

use crate::config;
use crate::error::{Error, Result};
use crate::index::distance::cosine_distance;
use crate::index::hnsw::search::knn_search;
use crate::index::{validate_vector, Neighbor, Retraction, VectorIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Configuration parameters for an HNSW index.
///
/// Controls the trade-off between build speed, search speed, recall, and memory usage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswConfig {
    /// Max links per node on layers above 0.
    pub m: usize,
    /// Max links per node at layer 0 (typically `2 * m`).
    pub m0: usize,
    /// Candidate list size during insertion.
    pub ef_construction: usize,
    /// Candidate list size during search (higher = better recall, slower).
    pub ef_search: usize,
    /// Maximum number of layers in the graph.
    pub max_layers: usize,
    /// Seed for level sampling.
    pub seed: u64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: config::HNSW_DEFAULT_M,
            m0: config::HNSW_DEFAULT_M * 2,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: config::HNSW_DEFAULT_EF_SEARCH,
            max_layers: config::HNSW_DEFAULT_MAX_LAYERS,
            seed: config::HNSW_DEFAULT_SEED,
        }
    }
}

impl HnswConfig {
    /// Config with the given `m` and `m0 = 2m`, defaults elsewhere.
    pub fn with_m(m: usize) -> Self {
        let m = m.max(1);
        Self {
            m,
            m0: m * 2,
            ..Self::default()
        }
    }
}

/// HNSW index over cosine distance.
#[derive(Debug)]
pub struct HnswIndex {
    pub(crate) config: HnswConfig,
    pub(crate) vectors: Vec<f32>,
    pub(crate) neighbors: Vec<Vec<Vec<u32>>>, // [node][layer][neighbor ids]
    pub(crate) levels: Vec<usize>,
    pub(crate) deleted: Vec<bool>,
    pub(crate) ids: Vec<String>,
    /// External id → live node. Tombstoned nodes are not in this map.
    pub(crate) id_to_node: HashMap<String, u32>,
    pub(crate) entry_point: Option<u32>,
    pub(crate) max_layer: usize,
    pub(crate) dimension: usize,
    rng: StdRng,
}

impl HnswIndex {
    /// Creates a new empty index.
    pub fn new(config: HnswConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            vectors: Vec::new(),
            neighbors: Vec::new(),
            levels: Vec::new(),
            deleted: Vec::new(),
            ids: Vec::new(),
            id_to_node: HashMap::new(),
            entry_point: None,
            max_layer: 0,
            dimension: 0,
            rng,
        }
    }

    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Total nodes in the graph, tombstoned ones included.
    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub fn entry_point(&self) -> Option<u32> {
        self.entry_point
    }

    pub fn max_layer(&self) -> usize {
        self.max_layer
    }

    /// Top layer the node was sampled into.
    pub fn level(&self, node: u32) -> usize {
        self.levels[node as usize]
    }

    #[inline]
    pub fn is_deleted(&self, node: u32) -> bool {
        self.deleted[node as usize]
    }

    /// Neighbor list of `node` on `layer` (empty above the node's level).
    pub fn neighbors(&self, node: u32, layer: usize) -> &[u32] {
        self.neighbors[node as usize]
            .get(layer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[inline]
    pub(crate) fn vector(&self, node: u32) -> &[f32] {
        let start = node as usize * self.dimension;
        &self.vectors[start..start + self.dimension]
    }

    #[inline]
    pub(crate) fn distance_to(&self, query: &[f32], node: u32) -> f32 {
        cosine_distance(query, self.vector(node))
    }

    #[inline]
    pub(crate) fn max_neighbors(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m0.max(1)
        } else {
            self.config.m.max(1)
        }
    }

    /// Sample a level with `floor(-ln(U) * mL)`, `mL = 1 / ln(m)`.
    pub(crate) fn random_level(&mut self) -> usize {
        // ln(1) = 0, so m = 1 borrows the m = 2 multiplier
        let ml = 1.0 / (self.config.m.max(2) as f64).ln();
        // U on (0, 1]: never feed 0 into ln
        let u: f64 = 1.0 - self.rng.random::<f64>();
        let level = (-u.ln() * ml).floor() as usize;
        level.min(self.config.max_layers.max(1) - 1)
    }

    /// Nodes reachable from the entry point over layer-0 links, tombstones included.
    pub fn reachable_count(&self) -> usize {
        let Some(ep) = self.entry_point else {
            return 0;
        };
        let mut seen = vec![false; self.node_count()];
        let mut queue = VecDeque::from([ep]);
        seen[ep as usize] = true;
        let mut count = 0;
        while let Some(node) = queue.pop_front() {
            count += 1;
            for &nb in self.neighbors(node, 0) {
                if !seen[nb as usize] {
                    seen[nb as usize] = true;
                    queue.push_back(nb);
                }
            }
        }
        count
    }

    /// Rebuild the graph from live nodes only, dropping tombstones and their edges.
    ///
    /// Takes `&mut self`, so no search can be traversing the old graph meanwhile.
    pub fn compact_graph(&mut self) -> usize {
        let removed = self.tombstone_count();
        if removed == 0 {
            return 0;
        }
        let live: Vec<(String, Vec<f32>)> = (0..self.node_count() as u32)
            .filter(|&n| !self.is_deleted(n))
            .map(|n| (self.ids[n as usize].clone(), self.vector(n).to_vec()))
            .collect();

        *self = HnswIndex::new(self.config.clone());
        for (id, v) in &live {
            self.insert(v, id);
        }
        tracing::debug!(
            "HNSW compacted: dropped {} tombstones, {} live nodes",
            removed,
            live.len()
        );
        removed
    }

    fn tombstone_count(&self) -> usize {
        self.deleted.iter().filter(|&&d| d).count()
    }
}

impl VectorIndex for HnswIndex {
    fn name(&self) -> &'static str {
        "hnsw"
    }

    fn add_vector(&mut self, vector: &[f32], id: &str) -> Result<()> {
        validate_vector(vector)?;
        if self.dimension != 0 && vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        // Re-adding an id replaces it: the old node becomes a tombstone
        if let Some(old) = self.id_to_node.remove(id) {
            self.deleted[old as usize] = true;
        }
        self.insert(vector, id);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.entry_point.is_none() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        Ok(knn_search(self, query, k)
            .into_iter()
            .map(|(distance, node)| Neighbor {
                id: self.ids[node as usize].clone(),
                distance,
            })
            .collect())
    }

    fn retract(&mut self, ids: &HashSet<String>) -> Retraction {
        for id in ids {
            if let Some(node) = self.id_to_node.remove(id) {
                self.deleted[node as usize] = true;
            }
        }
        Retraction::Applied
    }

    fn clear(&mut self) {
        *self = HnswIndex::new(self.config.clone());
    }

    fn len(&self) -> usize {
        self.id_to_node.len()
    }

    fn tombstoned(&self) -> usize {
        self.tombstone_count()
    }

    fn compact(&mut self) -> usize {
        self.compact_graph()
    }
}
