//! Inverted-file (IVF) clustering index.
//!
//! `train` partitions the corpus into centroids with k-means (k-means++
//! seeding, then Lloyd iterations) and files every vector under its nearest
//! centroid. A query probes only the single nearest centroid's bucket, so true
//! neighbors that landed in an adjacent cluster can be missed, and a sparse
//! bucket can yield fewer than `k` hits. Widening is the orchestrator's job.
//!
//! Vectors added after training sit in a pending list and are invisible to
//! search until the next `train`. Staleness between retrains is accepted.

use crate::config;
use crate::error::{Error, Result};
use crate::index::distance::{cosine_distance, euclidean_sq};
use crate::index::{validate_vector, Neighbor, Retraction, VectorIndex};
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Configuration for an IVF index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IvfConfig {
    /// Requested number of clusters. Reduced at training time when the corpus is too small.
    pub n_clusters: usize,
    /// Lloyd iterations after seeding.
    pub iterations: usize,
    /// Seed for centroid selection.
    pub seed: u64,
}

impl Default for IvfConfig {
    fn default() -> Self {
        Self {
            n_clusters: config::IVF_DEFAULT_CLUSTERS,
            iterations: config::IVF_KMEANS_ITERATIONS,
            seed: config::IVF_DEFAULT_SEED,
        }
    }
}

/// Summary of one training run.
#[derive(Debug)]
pub struct TrainReport {
    /// Clusters requested by configuration.
    pub requested: usize,
    /// Clusters actually trained.
    pub n_clusters: usize,
    /// Vectors assigned to clusters.
    pub vectors: usize,
    /// Set to [`Error::ClusterCountAdjusted`] when the corpus forced fewer clusters.
    pub warning: Option<Error>,
}

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    id: String,
    vector: Vec<f32>,
}

/// Single-probe IVF index. Clusters by Euclidean k-means, ranks a bucket by
/// cosine distance.
#[derive(Debug)]
pub struct IvfIndex {
    config: IvfConfig,
    centroids: Vec<Vec<f32>>,
    buckets: Vec<Vec<Entry>>,
    pending: Vec<Entry>,
    dimension: Option<usize>,
    next_seq: u64,
}

impl IvfIndex {
    pub fn new(config: IvfConfig) -> Self {
        Self {
            config,
            centroids: Vec::new(),
            buckets: Vec::new(),
            pending: Vec::new(),
            dimension: None,
            next_seq: 0,
        }
    }

    /// Returns `true` once centroids exist.
    pub fn is_trained(&self) -> bool {
        !self.centroids.is_empty()
    }

    /// Number of trained clusters (0 before training).
    pub fn cluster_count(&self) -> usize {
        self.centroids.len()
    }

    /// Vectors added since the last training run.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Replace the index contents with `vectors` and cluster them.
    pub fn train(&mut self, vectors: &[(String, Vec<f32>)]) -> Result<TrainReport> {
        self.clear();
        for (id, v) in vectors {
            self.add_vector(v, id)?;
        }
        self.retrain()
    }

    /// Re-cluster everything currently held (assigned and pending).
    pub fn retrain(&mut self) -> Result<TrainReport> {
        let mut entries: Vec<Entry> = self
            .buckets
            .drain(..)
            .flatten()
            .chain(self.pending.drain(..))
            .collect();
        entries.sort_unstable_by_key(|e| e.seq);
        self.centroids.clear();

        let requested = self.config.n_clusters.max(1);
        let n = entries.len();
        if n == 0 {
            self.pending = entries;
            return Ok(TrainReport {
                requested,
                n_clusters: 0,
                vectors: 0,
                warning: None,
            });
        }

        let mut warning = None;
        let mut k = requested;
        if n < k {
            k = (n / 2).max(1);
            let adjusted = Error::ClusterCountAdjusted {
                requested,
                actual: k,
            };
            tracing::warn!("{}", adjusted);
            warning = Some(adjusted);
        }

        let points: Vec<&[f32]> = entries.iter().map(|e| e.vector.as_slice()).collect();
        self.centroids = kmeans(&points, k, self.config.iterations, self.config.seed);
        self.buckets = vec![Vec::new(); self.centroids.len()];
        for entry in entries {
            let c = nearest_centroid(&self.centroids, &entry.vector);
            self.buckets[c].push(entry);
        }

        tracing::debug!(
            "IVF trained: {} vectors into {} clusters (requested {})",
            n,
            self.centroids.len(),
            requested
        );

        Ok(TrainReport {
            requested,
            n_clusters: self.centroids.len(),
            vectors: n,
            warning,
        })
    }
}

impl VectorIndex for IvfIndex {
    fn name(&self) -> &'static str {
        "ivf"
    }

    fn add_vector(&mut self, vector: &[f32], id: &str) -> Result<()> {
        validate_vector(vector)?;
        match self.dimension {
            Some(expected) if expected != vector.len() => {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            Some(_) => {}
            None => self.dimension = Some(vector.len()),
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Entry {
            seq,
            id: id.to_string(),
            vector: vector.to_vec(),
        });
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        if !self.is_trained() {
            return Err(Error::IndexNotTrained);
        }
        if let Some(dim) = self.dimension {
            if query.len() != dim {
                return Err(Error::DimensionMismatch {
                    expected: dim,
                    actual: query.len(),
                });
            }
        }

        let bucket = &self.buckets[nearest_centroid(&self.centroids, query)];
        let mut scored: Vec<(OrderedFloat<f32>, u64, usize)> = bucket
            .iter()
            .enumerate()
            .map(|(i, e)| (OrderedFloat(cosine_distance(query, &e.vector)), e.seq, i))
            .collect();
        if k < scored.len() {
            scored.select_nth_unstable(k - 1);
            scored.truncate(k);
        }
        scored.sort_unstable();

        Ok(scored
            .into_iter()
            .map(|(d, _, i)| Neighbor {
                id: bucket[i].id.clone(),
                distance: d.0,
            })
            .collect())
    }

    fn retract(&mut self, ids: &HashSet<String>) -> Retraction {
        for bucket in &mut self.buckets {
            bucket.retain(|e| !ids.contains(&e.id));
        }
        self.pending.retain(|e| !ids.contains(&e.id));
        Retraction::Applied
    }

    fn clear(&mut self) {
        self.centroids.clear();
        self.buckets.clear();
        self.pending.clear();
        self.dimension = None;
        self.next_seq = 0;
    }

    fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum::<usize>() + self.pending.len()
    }

    fn train(&mut self) -> Result<Option<TrainReport>> {
        self.retrain().map(Some)
    }
}

/// Index of the centroid closest to `v`.
fn nearest_centroid(centroids: &[Vec<f32>], v: &[f32]) -> usize {
    let mut best = 0;
    let mut best_dist = f32::MAX;
    for (ci, c) in centroids.iter().enumerate() {
        let d = euclidean_sq(v, c);
        if d < best_dist {
            best_dist = d;
            best = ci;
        }
    }
    best
}

/// K-means with k-means++ seeding. Returns `k` centroids (`k <= points.len()`).
fn kmeans(points: &[&[f32]], k: usize, iterations: usize, seed: u64) -> Vec<Vec<f32>> {
    let n = points.len();
    let k = k.min(n);
    let mut rng = StdRng::seed_from_u64(seed);

    // K-means++ initialization
    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);
    centroids.push(points[rng.random_range(0..n)].to_vec());
    let mut min_dists = vec![f32::MAX; n];

    while centroids.len() < k {
        let last = &centroids[centroids.len() - 1];
        let mut total = 0.0f64;
        for (i, p) in points.iter().enumerate() {
            let d = euclidean_sq(p, last);
            if d < min_dists[i] {
                min_dists[i] = d;
            }
            total += min_dists[i] as f64;
        }

        // All points coincide with existing centroids
        if total < 1e-30 {
            centroids.push(points[rng.random_range(0..n)].to_vec());
            continue;
        }

        // Weighted selection proportional to distance²
        let threshold = rng.random::<f64>() * total;
        let mut cumulative = 0.0f64;
        let mut chosen = n - 1;
        for (i, &d) in min_dists.iter().enumerate() {
            cumulative += d as f64;
            if cumulative >= threshold {
                chosen = i;
                break;
            }
        }
        centroids.push(points[chosen].to_vec());
    }

    // Lloyd iterations
    let dim = points[0].len();
    let mut assignments = vec![usize::MAX; n];
    for _ in 0..iterations {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let c = nearest_centroid(&centroids, p);
            if assignments[i] != c {
                assignments[i] = c;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![vec![0.0f32; dim]; k];
        let mut counts = vec![0usize; k];
        for (i, p) in points.iter().enumerate() {
            let c = assignments[i];
            counts[c] += 1;
            for (s, x) in sums[c].iter_mut().zip(p.iter()) {
                *s += x;
            }
        }
        // Empty clusters keep their previous centroid
        for (ci, sum) in sums.into_iter().enumerate() {
            if counts[ci] > 0 {
                let inv = 1.0 / counts[ci] as f32;
                centroids[ci] = sum.into_iter().map(|s| s * inv).collect();
            }
        }
    }

    centroids
}
