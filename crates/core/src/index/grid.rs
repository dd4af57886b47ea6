//! Coarse spatial grid for cheap candidate narrowing.
//!
//! Each vector is quantized per dimension to `floor(x / bin_size)`; vectors
//! sharing the resulting tuple share a cell. A query's candidates are the
//! members of its own cell, nothing more.

use indexmap::IndexSet;
use std::collections::HashMap;

/// Cell coordinates, one bin index per dimension.
pub type GridKey = Vec<i64>;

/// Chunk ids bucketed by grid cell. Cell members keep insertion order.
#[derive(Debug)]
pub struct GridIndex {
    bin_size: f32,
    cells: HashMap<GridKey, IndexSet<String>>,
    cell_of: HashMap<String, GridKey>,
}

impl GridIndex {
    /// `bin_size` must be positive; non-positive values fall back to the default.
    pub fn new(bin_size: f32) -> Self {
        let bin_size = if bin_size > 0.0 && bin_size.is_finite() {
            bin_size
        } else {
            crate::config::GRID_DEFAULT_BIN_SIZE
        };
        Self {
            bin_size,
            cells: HashMap::new(),
            cell_of: HashMap::new(),
        }
    }

    pub fn bin_size(&self) -> f32 {
        self.bin_size
    }

    /// Quantize `vector` into its cell key.
    pub fn key(&self, vector: &[f32]) -> GridKey {
        vector
            .iter()
            .map(|&x| (x / self.bin_size).floor() as i64)
            .collect()
    }

    /// File `id` under the cell of `vector`, moving it if it was already present.
    pub fn add(&mut self, id: &str, vector: &[f32]) {
        self.remove(id);
        let key = self.key(vector);
        self.cells
            .entry(key.clone())
            .or_default()
            .insert(id.to_string());
        self.cell_of.insert(id.to_string(), key);
    }

    /// Drop `id`. Returns `true` if it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(key) = self.cell_of.remove(id) else {
            return false;
        };
        if let Some(members) = self.cells.get_mut(&key) {
            members.shift_remove(id);
            if members.is_empty() {
                self.cells.remove(&key);
            }
        }
        true
    }

    /// Ids sharing the query's cell, in insertion order.
    pub fn candidates(&self, query: &[f32]) -> Vec<String> {
        self.cells
            .get(&self.key(query))
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn len(&self) -> usize {
        self.cell_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_of.is_empty()
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.cell_of.clear();
    }
}
