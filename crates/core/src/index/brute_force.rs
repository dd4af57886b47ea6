//! Exact nearest-neighbor scan.
//!
//! Vectors live in one contiguous arena. A query computes the cosine
//! distance to every stored vector and partition-selects the `k` smallest,
//! so the average cost is O(n·d) plus O(k log k) to order the winners.
//! Equal distances are ordered by insertion position.

use crate::error::{Error, Result};
use crate::index::distance::cosine_distance;
use crate::index::{validate_vector, Neighbor, Retraction, VectorIndex};
use ordered_float::OrderedFloat;
use std::collections::HashSet;

/// Append-only exact index. Has no removal primitive: deletions are handled by
/// rebuilding from the store.
#[derive(Debug, Default)]
pub struct BruteForceIndex {
    ids: Vec<String>,
    vectors: Vec<f32>,
    dimension: Option<usize>,
}

impl BruteForceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn vector(&self, pos: usize) -> &[f32] {
        let dim = self.dimension.unwrap_or(0);
        &self.vectors[pos * dim..(pos + 1) * dim]
    }
}

impl VectorIndex for BruteForceIndex {
    fn name(&self) -> &'static str {
        "brute_force"
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
        self.vectors.extend_from_slice(vector);
        self.ids.push(id.to_string());
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let dim = match self.dimension {
            Some(d) if !self.ids.is_empty() && k > 0 => d,
            _ => return Ok(Vec::new()),
        };
        if query.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: query.len(),
            });
        }

        // (distance, insertion position): the position breaks ties deterministically
        let mut scored: Vec<(OrderedFloat<f32>, usize)> = (0..self.ids.len())
            .map(|pos| (OrderedFloat(cosine_distance(query, self.vector(pos))), pos))
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable(k - 1);
            scored.truncate(k);
        }
        scored.sort_unstable();

        Ok(scored
            .into_iter()
            .map(|(d, pos)| Neighbor {
                id: self.ids[pos].clone(),
                distance: d.0,
            })
            .collect())
    }

    fn retract(&mut self, _ids: &HashSet<String>) -> Retraction {
        Retraction::NeedsRebuild
    }

    fn clear(&mut self) {
        self.ids.clear();
        self.vectors.clear();
        self.dimension = None;
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}
