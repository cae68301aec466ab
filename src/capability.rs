//! External capabilities the resolver leans on: a text embedder and a local
//! generative model. Both cross the process boundary, so both are async and
//! both may be unreachable at any time.

use anyhow::Result;
use async_trait::async_trait;

/// Sampling knobs for one generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub system: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            system: None,
            temperature: 0.3,
            max_tokens: Some(200),
        }
    }
}

/// Turns text into a vector comparable with the preset phrase vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Cheap reachability probe consulted before the embedding tier runs.
    async fn is_available(&self) -> bool;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// A local text-generation engine. Output is arbitrary text that may or may
/// not contain the JSON object that was asked for.
#[async_trait]
pub trait LocalModel: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String>;
}

/// Cosine similarity of two vectors.
///
/// Returns 0.0 if the vectors have different lengths, are empty, or have zero
/// magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical_vectors() {
        let a = [0.3, 0.4, 0.5];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_opposite_vectors() {
        let sim = cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
