//! Generation-stamped visited set for HNSW traversal.
//!
//! Clearing bumps a generation counter instead of zeroing the array, so a
//! traversal pays O(1) to reset instead of O(node_count).

/// Visited set over node ids `0..capacity`.
#[derive(Debug)]
pub struct VisitedSet {
    marks: Vec<u16>,
    generation: u16,
}

impl VisitedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            marks: vec![0u16; capacity],
            generation: 1,
        }
    }

    /// Forget every mark. Zeroes the array only when the generation wraps.
    pub fn clear(&mut self) {
        if self.generation == u16::MAX {
            self.marks.fill(0);
            self.generation = 1;
        } else {
            self.generation += 1;
        }
    }

    /// Grow to cover node ids below `cap`.
    pub fn ensure_capacity(&mut self, cap: usize) {
        if cap > self.marks.len() {
            self.marks.resize(cap, 0);
        }
    }

    /// Mark `node`. Returns `true` if it had not been visited yet.
    #[inline]
    pub fn insert(&mut self, node: u32) -> bool {
        let slot = &mut self.marks[node as usize];
        if *slot == self.generation {
            false
        } else {
            *slot = self.generation;
            true
        }
    }
}

impl Default for VisitedSet {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_then_clear() {
        let mut vs = VisitedSet::new(8);
        assert!(vs.insert(3));
        assert!(!vs.insert(3));
        vs.clear();
        assert!(vs.insert(3));
    }

    #[test]
    fn test_generation_wraparound_resets_marks() {
        let mut vs = VisitedSet::new(4);
        for _ in 0..(u16::MAX - 1) {
            vs.clear();
        }
        assert_eq!(vs.generation, u16::MAX);
        vs.insert(2);
        vs.clear();
        assert_eq!(vs.generation, 1);
        assert!(vs.insert(2));
    }

    #[test]
    fn test_ensure_capacity_grows() {
        let mut vs = VisitedSet::default();
        vs.ensure_capacity(10);
        assert!(vs.insert(9));
    }
}
