//! Distance and similarity functions.
//!
//! The scalar loops below auto-vectorize in release builds; no unsafe or
//! explicit SIMD is required for the dimensions packs use in practice.
//!
//! Two views of the same metric exist side by side: [`distance`] returns a
//! value where smaller is closer (what graph traversal minimizes) and
//! [`score`] returns a similarity where larger is better (what query results
//! rank by). The two orderings always agree.

use vpack_core::DistanceMetric;

/// Cosine similarity between two vectors.
///
/// Defined as `0.0` when either vector has zero norm — a zero vector is not
/// comparable to anything, which is a scoring fact, not an error.
#[inline]
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same dimension");

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Cosine distance: `1 - cosine_similarity`.
#[inline]
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Euclidean (L2) distance.
#[inline]
#[must_use]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same dimension");
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

/// Dot product.
#[inline]
#[must_use]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same dimension");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Distance under `metric`: smaller is closer. Used by graph traversal.
#[inline]
#[must_use]
pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine_distance(a, b),
        DistanceMetric::Euclidean => euclidean_distance(a, b),
        // Negated so that larger dot products sort as closer.
        DistanceMetric::Dot => -dot_product(a, b),
    }
}

/// Similarity score under `metric`: larger is better. Used for ranking.
#[inline]
#[must_use]
pub fn score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine_similarity(a, b),
        DistanceMetric::Euclidean => 1.0 / (1.0 + euclidean_distance(a, b)),
        DistanceMetric::Dot => dot_product(a, b),
    }
}

/// Convert a traversal distance back to a ranking score.
///
/// Must agree with computing [`score`] directly on the same vectors.
#[inline]
#[must_use]
pub fn score_from_distance(metric: DistanceMetric, dist: f32) -> f32 {
    match metric {
        DistanceMetric::Cosine => 1.0 - dist,
        DistanceMetric::Euclidean => 1.0 / (1.0 + dist),
        DistanceMetric::Dot => -dist,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn assert_near(a: f32, b: f32) {
        assert!((a - b).abs() < EPSILON, "assertion failed: {a} !~ {b}");
    }

    #[test]
    fn test_cosine_identical() {
        let v = [1.0, 0.0, 0.0];
        assert_near(cosine_similarity(&v, &v), 1.0);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = [1.0, 0.0, 0.0];
        let b = [0.0, 1.0, 0.0];
        assert_near(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = [1.0, 0.0];
        let b = [-1.0, 0.0];
        assert_near(cosine_similarity(&a, &b), -1.0);
    }

    #[test]
    fn test_cosine_zero_norm_is_zero_not_error() {
        let zero = [0.0, 0.0];
        let unit = [1.0, 0.0];
        assert_near(cosine_similarity(&zero, &unit), 0.0);
        assert_near(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_euclidean_three_four_five() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert_near(euclidean_distance(&a, &b), 5.0);
    }

    #[test]
    fn test_dot_product() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        assert_near(dot_product(&a, &b), 32.0);
    }

    #[test]
    fn test_distance_and_score_orderings_agree() {
        let query = [1.0, 0.2, 0.0];
        let near = [0.9, 0.1, 0.1];
        let far = [-0.5, 0.8, 0.3];

        for metric in [DistanceMetric::Cosine, DistanceMetric::Euclidean, DistanceMetric::Dot] {
            assert!(distance(metric, &query, &near) < distance(metric, &query, &far));
            assert!(score(metric, &query, &near) > score(metric, &query, &far));
        }
    }

    #[test]
    fn test_score_from_distance_agrees_with_score() {
        let a = [0.3, -0.7, 1.2];
        let b = [0.1, 0.4, -0.2];
        for metric in [DistanceMetric::Cosine, DistanceMetric::Euclidean, DistanceMetric::Dot] {
            assert_near(score_from_distance(metric, distance(metric, &a, &b)), score(metric, &a, &b));
        }
    }
}
