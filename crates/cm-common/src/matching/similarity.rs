/// Weighted cosine similarity (-1.0..=1.0), i.e. `1 - weighted_cosine_distance`.
pub fn weighted_cosine_similarity(a: &[f64], b: &[f64], weights: &[f64]) -> f64 {
    if a.len() != b.len() || a.len() != weights.len() {
        tracing::warn!(
            a_len = a.len(),
            b_len = b.len(),
            weights_len = weights.len(),
            "vector dimension mismatch; returning zero similarity"
        );
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for ((x, y), w) in a.iter().zip(b).zip(weights) {
        dot += w * x * y;
        norm_a += w * x * x;
        norm_b += w * y * y;
    }

    let denominator = (norm_a * norm_b).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }

    (dot / denominator).clamp(-1.0, 1.0)
}
