//! HNSW insertion.
//!
//! Inserts a vector with bidirectional connections and heuristic neighbor
//! selection (Algorithm 4 of the HNSW paper), used both to choose the new
//! node's links and to prune a neighbor whose list overflowed.

use crate::index::hnsw::graph::HnswIndex;
use crate::index::hnsw::search::search_layer;
use crate::index::hnsw::visited::VisitedSet;
use std::collections::HashSet;

impl HnswIndex {
    /// Insert `vector` under `id` and return its node id.
    pub(crate) fn insert(&mut self, vector: &[f32], id: &str) -> u32 {
        let level = self.random_level();
        let node = self.ids.len() as u32;

        if self.dimension == 0 {
            self.dimension = vector.len();
        }
        self.vectors.extend_from_slice(vector);
        self.neighbors.push(vec![Vec::new(); level + 1]);
        self.levels.push(level);
        self.deleted.push(false);
        self.ids.push(id.to_string());
        self.id_to_node.insert(id.to_string(), node);

        // First node: sole member of every layer up to its level, no search
        let Some(entry_point) = self.entry_point else {
            self.entry_point = Some(node);
            self.max_layer = level;
            return node;
        };

        let mut visited = VisitedSet::new(self.node_count());
        let mut current = entry_point;

        // Phase 1: greedy descent from the top layer down to level + 1
        for layer in (level + 1..=self.max_layer).rev() {
            let nearest = search_layer(
                self,
                vector,
                std::slice::from_ref(&current),
                1,
                layer,
                &mut visited,
                true,
            );
            if let Some(&(_, n)) = nearest.first() {
                current = n;
            }
        }

        // Phase 2: beam search each shared layer and pick diverse neighbors.
        // The new node has no links yet, so no traversal can reach it.
        let top = level.min(self.max_layer);
        let mut layer_eps = vec![current];
        for layer in (0..=top).rev() {
            let candidates = search_layer(
                self,
                vector,
                &layer_eps,
                self.config.ef_construction,
                layer,
                &mut visited,
                true,
            );
            let selected = select_neighbors_heuristic(self, &candidates, self.max_neighbors(layer));
            self.neighbors[node as usize][layer] = selected.iter().map(|&(_, n)| n).collect();

            layer_eps.clear();
            layer_eps.extend(candidates.iter().map(|&(_, n)| n));
            if layer_eps.is_empty() {
                layer_eps.push(entry_point);
            }
        }

        // Phase 3: back-links, pruning any neighbor that went over capacity
        for layer in 0..=top {
            let cap = self.max_neighbors(layer);
            let mine = self.neighbors[node as usize][layer].clone();
            for nb in mine {
                let nid = nb as usize;
                while self.neighbors[nid].len() <= layer {
                    self.neighbors[nid].push(Vec::new());
                }
                self.neighbors[nid][layer].push(node);

                if self.neighbors[nid][layer].len() > cap {
                    let base = self.vector(nb).to_vec();
                    let candidates: Vec<(f32, u32)> = self.neighbors[nid][layer]
                        .iter()
                        .map(|&c| (self.distance_to(&base, c), c))
                        .collect();
                    let pruned = select_neighbors_heuristic(self, &candidates, cap);
                    self.neighbors[nid][layer] = pruned.iter().map(|&(_, n)| n).collect();
                }
            }
        }

        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(node);
        }
        node
    }
}

/// Heuristic neighbor selection.
///
/// Walks candidates nearest-first and keeps one only if it is closer to the
/// base than to every neighbor already kept, so the list spreads across
/// directions instead of bunching in one cluster. Remaining slots are filled
/// with the closest unused candidates.
pub(crate) fn select_neighbors_heuristic(
    index: &HnswIndex,
    candidates: &[(f32, u32)],
    m: usize,
) -> Vec<(f32, u32)> {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    sorted.dedup_by_key(|c| c.1);

    let mut selected: Vec<(f32, u32)> = Vec::with_capacity(m);
    for &(dist_to_base, cid) in &sorted {
        if selected.len() >= m {
            break;
        }
        let candidate = index.vector(cid);
        let is_diverse = selected
            .iter()
            .all(|&(_, sid)| dist_to_base <= index.distance_to(candidate, sid));
        if is_diverse {
            selected.push((dist_to_base, cid));
        }
    }

    if selected.len() < m {
        let chosen: HashSet<u32> = selected.iter().map(|&(_, n)| n).collect();
        for &(dist, cid) in &sorted {
            if selected.len() >= m {
                break;
            }
            if !chosen.contains(&cid) {
                selected.push((dist, cid));
            }
        }
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::hnsw::HnswConfig;
    use crate::index::VectorIndex;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| (0..dim).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect())
            .collect()
    }

    #[test]
    fn test_links_are_bidirectional_after_small_build() {
        let mut idx = HnswIndex::new(HnswConfig::with_m(8));
        for (i, v) in random_vectors(10, 4, 1).iter().enumerate() {
            idx.add_vector(v, &format!("v{i}")).unwrap();
        }
        // Ten nodes never overflow m0 = 16, so nothing was pruned
        for node in 0..idx.node_count() as u32 {
            for &nb in idx.neighbors(node, 0) {
                assert!(
                    idx.neighbors(nb, 0).contains(&node),
                    "edge {node}->{nb} has no back-link"
                );
            }
        }
    }

    #[test]
    fn test_neighbor_lists_respect_caps() {
        let cfg = HnswConfig::with_m(4);
        let mut idx = HnswIndex::new(cfg.clone());
        for (i, v) in random_vectors(300, 8, 2).iter().enumerate() {
            idx.add_vector(v, &format!("v{i}")).unwrap();
        }
        for node in 0..idx.node_count() as u32 {
            assert!(idx.neighbors(node, 0).len() <= cfg.m0);
            for layer in 1..=idx.max_layer() {
                assert!(idx.neighbors(node, layer).len() <= cfg.m);
            }
        }
    }

    #[test]
    fn test_heuristic_prefers_diverse_neighbors() {
        let mut idx = HnswIndex::new(HnswConfig::default());
        // Two near-duplicates along +x and one along +y
        idx.add_vector(&[1.0, 0.0], "x1").unwrap();
        idx.add_vector(&[1.0, 0.01], "x2").unwrap();
        idx.add_vector(&[0.0, 1.0], "y").unwrap();

        let base = [1.0f32, 1.0];
        let candidates: Vec<(f32, u32)> = (0..3u32)
            .map(|n| (idx.distance_to(&base, n), n))
            .collect();
        let picked = select_neighbors_heuristic(&idx, &candidates, 2);
        let ids: Vec<u32> = picked.iter().map(|&(_, n)| n).collect();
        assert!(ids.contains(&2), "the +y direction must be kept: {ids:?}");
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_self_recall_on_thousand_vectors() {
        let cfg = HnswConfig {
            ef_search: 64,
            ..HnswConfig::with_m(16)
        };
        let mut idx = HnswIndex::new(cfg);
        let vectors = random_vectors(1000, 16, 42);
        for (i, v) in vectors.iter().enumerate() {
            idx.add_vector(v, &format!("v{i}")).unwrap();
        }
        for (i, v) in vectors.iter().enumerate() {
            let hits = idx.search(v, 1).unwrap();
            assert_eq!(hits[0].id, format!("v{i}"), "self-recall failed for v{i}");
        }
    }

    #[test]
    fn test_tombstones_keep_graph_connected() {
        let mut idx = HnswIndex::new(HnswConfig::with_m(8));
        let vectors = random_vectors(200, 8, 7);
        for (i, v) in vectors.iter().enumerate() {
            idx.add_vector(v, &format!("v{i}")).unwrap();
        }
        let before = idx.reachable_count();

        let doomed: HashSet<String> = (0..200).step_by(3).map(|i| format!("v{i}")).collect();
        idx.retract(&doomed);
        assert_eq!(idx.reachable_count(), before);

        for v in vectors.iter().take(20) {
            for hit in idx.search(v, 10).unwrap() {
                assert!(!doomed.contains(&hit.id), "tombstone {} returned", hit.id);
            }
        }
        let entry = idx.entry_point().unwrap();
        assert_eq!(idx.reachable_count(), before, "entry {entry} lost reach");
    }

    #[test]
    fn test_compaction_drops_tombstones() {
        let mut idx = HnswIndex::new(HnswConfig::default());
        for (i, v) in random_vectors(50, 4, 9).iter().enumerate() {
            idx.add_vector(v, &format!("v{i}")).unwrap();
        }
        let doomed: HashSet<String> = (0..10).map(|i| format!("v{i}")).collect();
        idx.retract(&doomed);
        assert_eq!(idx.tombstoned(), 10);

        assert_eq!(idx.compact(), 10);
        assert_eq!(idx.node_count(), 40);
        assert_eq!(idx.tombstoned(), 0);
        assert_eq!(idx.reachable_count(), 40);
        assert_eq!(idx.len(), 40);
    }
}
