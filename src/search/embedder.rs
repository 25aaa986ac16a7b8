//! Deterministic hashed bag-of-words embeddings.
//!
//! Good enough to rank a small curated knowledge base by lexical overlap
//! without pulling a model runtime into the deployment. Token features are
//! hashed into a fixed-dimension vector and L2-normalized, so cosine
//! similarity reduces to shared-token overlap weighted by frequency.

use std::hash::{DefaultHasher, Hash, Hasher};

pub const EMBEDDING_DIMENSION: usize = 384;

/// Embed free text into a normalized feature vector.
pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIMENSION];

    for token in tokens(text) {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let bucket = (hasher.finish() as usize) % EMBEDDING_DIMENSION;
        vector[bucket] += 1.0;
    }

    normalize(&mut vector);
    vector
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_unit_similarity() {
        let a = embed("temperature profiles in the Indian Ocean");
        let b = embed("temperature profiles in the Indian Ocean");
        let sim = cosine_similarity(&a, &b);
        assert!((sim - 1.0).abs() < 1e-5, "similarity was {}", sim);
    }

    #[test]
    fn overlapping_text_scores_higher_than_disjoint() {
        let query = embed("salinity measurements indian ocean");
        let related = embed("indian ocean salinity values around 35 PSU");
        let unrelated = embed("quarterly revenue spreadsheet totals");
        assert!(
            cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated)
        );
    }

    #[test]
    fn empty_text_yields_zero_similarity() {
        let empty = embed("");
        let other = embed("argo float");
        assert_eq!(cosine_similarity(&empty, &other), 0.0);
    }

    #[test]
    fn embedding_is_deterministic() {
        assert_eq!(embed("ocean data"), embed("ocean data"));
    }

    #[test]
    fn mismatched_dimensions_score_zero() {
        let a = embed("abc");
        assert_eq!(cosine_similarity(&a, &a[..10]), 0.0);
    }
}
