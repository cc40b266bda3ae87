use super::embedding::SparseVector;
use std::collections::HashSet;

/// Cosine similarity over the union of the two key sets.
///
/// Zero magnitude on either side yields `0.0`. Counts are non-negative, so the
/// result lies in `[0, 1]`.
pub fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    let terms: HashSet<&str> = a.terms().chain(b.terms()).collect();

    let mut dot_product = 0.0_f64;
    let mut magnitude_a = 0.0_f64;
    let mut magnitude_b = 0.0_f64;
    for term in terms {
        let va = f64::from(a.get(term));
        let vb = f64::from(b.get(term));
        dot_product += va * vb;
        magnitude_a += va * va;
        magnitude_b += vb * vb;
    }

    let magnitude_a = magnitude_a.sqrt();
    let magnitude_b = magnitude_b.sqrt();
    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    (dot_product / (magnitude_a * magnitude_b)).clamp(0.0, 1.0)
}
