//! HNSW search: single-layer beam search and multi-layer KNN.
//!
//! Tombstoned nodes still route traversals; whether they may appear in a
//! layer's result set is chosen per call. Construction and upper-layer
//! descent keep them, the final layer-0 pass drops them.

use crate::index::hnsw::graph::HnswIndex;
use crate::index::hnsw::visited::VisitedSet;
use ordered_float::OrderedFloat;
use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

thread_local! {
    /// Per-thread visited set reused across queries.
    static SEARCH_VISITED: RefCell<VisitedSet> = RefCell::new(VisitedSet::new(0));
}

/// (distance, node) with a total order; ties fall back to node id (insertion order).
type Scored = (OrderedFloat<f32>, u32);

/// Beam search on one layer.
///
/// Keeps a bounded result set of size `ef` and expands the closest unvisited
/// candidate until the closest candidate is farther than the worst result.
/// Returns up to `ef` `(distance, node)` pairs ascending by distance.
/// `visited` is cleared on entry.
pub fn search_layer(
    index: &HnswIndex,
    query: &[f32],
    entry_points: &[u32],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
    include_deleted: bool,
) -> Vec<(f32, u32)> {
    visited.clear();
    let ef = ef.max(1);
    let mut candidates: BinaryHeap<Reverse<Scored>> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<Scored> = BinaryHeap::with_capacity(ef + 1);
    let admit = |node: u32| include_deleted || !index.is_deleted(node);

    for &ep in entry_points {
        if visited.insert(ep) {
            let d = OrderedFloat(index.distance_to(query, ep));
            candidates.push(Reverse((d, ep)));
            if admit(ep) {
                results.push((d, ep));
                if results.len() > ef {
                    results.pop();
                }
            }
        }
    }

    while let Some(Reverse((c_dist, node))) = candidates.pop() {
        if results.len() >= ef {
            if let Some(&(worst, _)) = results.peek() {
                if c_dist > worst {
                    break;
                }
            }
        }

        for &nb in index.neighbors(node, layer) {
            if !visited.insert(nb) {
                continue;
            }
            let d = OrderedFloat(index.distance_to(query, nb));
            let improves = results.len() < ef || results.peek().is_some_and(|&(w, _)| d < w);
            if improves {
                candidates.push(Reverse((d, nb)));
                if admit(nb) {
                    results.push((d, nb));
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|(d, n)| (d.0, n))
        .collect()
}

/// Multi-layer KNN: greedy descent (beam width 1) to layer 1, then a beam of
/// `max(ef_search, k)` at layer 0. Returns up to `k` live nodes ascending by distance.
///
/// If tombstones starve the beam, retries with doubled ef up to 4× the base.
pub fn knn_search(index: &HnswIndex, query: &[f32], k: usize) -> Vec<(f32, u32)> {
    let Some(entry_point) = index.entry_point else {
        return Vec::new();
    };

    SEARCH_VISITED.with(|cell| {
        let mut visited = cell.borrow_mut();
        visited.ensure_capacity(index.node_count());

        let mut current = entry_point;
        for layer in (1..=index.max_layer).rev() {
            let nearest = search_layer(
                index,
                query,
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

        let base_ef = index.config.ef_search.max(k);
        let max_ef = (base_ef * 4).min(index.node_count()).max(base_ef);
        let mut ef = base_ef;
        let mut results;
        loop {
            results = search_layer(
                index,
                query,
                std::slice::from_ref(&current),
                ef,
                0,
                &mut visited,
                false,
            );
            if results.len() >= k || ef >= max_ef {
                break;
            }
            ef = (ef * 2).min(max_ef);
        }

        results.truncate(k);
        results
    })
}
