//! Distance metrics shared by every index.
//!
//! Every index ranks neighbors by [`cosine_distance`] (lower is better), the
//! same order the orchestrator ranks by with [`cosine_similarity`]. Squared
//! Euclidean distance is only used to cluster vectors around IVF centroids.

/// Cosine distance: `1 - cosine_similarity`. Range: \[0, 2\].
#[inline]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Dot product over the common prefix of `a` and `b`.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm.
#[inline]
pub fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

/// Cosine similarity in \[-1, 1\]. A zero vector has similarity 0 to everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denom = norm(a) * norm(b);
    if denom <= f32::EPSILON {
        return 0.0;
    }
    (dot(a, b) / denom).clamp(-1.0, 1.0)
}

/// Squared Euclidean distance.
#[inline]
pub fn euclidean_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
