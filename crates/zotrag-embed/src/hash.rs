//! Offline embedder for tests and dry runs.
//!
//! [`HashEmbedder`] maps each lowercase word to a signed position through
//! blake3 and sums them into a unit vector. Texts sharing words land close
//! together, so search results are meaningful without any network access.

use async_trait::async_trait;
use zotrag_core::{EmbedError, Embedder, EmbeddingConfig, EmbeddingOutput};

/// Deterministic bag-of-words embedder.
///
/// # Example
///
/// ```rust
/// use zotrag_embed::HashEmbedder;
/// use zotrag_core::{Embedder, EmbeddingConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let embedder = HashEmbedder::new();
/// let config = EmbeddingConfig::default();
/// let outputs = embedder.embed_text(&["Hello", "World"], &config).await?;
///
/// assert_eq!(outputs.len(), 2);
/// assert_eq!(outputs[0].embedding.len(), 384);
/// # Ok(())
/// # }
/// ```
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create a hash embedder with the default dimension (384).
    #[must_use]
    pub fn new() -> Self {
        Self { dimension: 384 }
    }

    /// Create a hash embedder with a custom dimension.
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> EmbeddingOutput {
        let mut embedding = vec![0.0f32; self.dimension];
        let mut token_count = 0;

        for word in text.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() {
                continue;
            }
            token_count += 1;

            let hash = blake3::hash(word.as_bytes());
            let bytes = hash.as_bytes();
            let index = u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]) as usize
                % self.dimension;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            embedding[index] += sign;
        }

        normalize(&mut embedding);
        EmbeddingOutput {
            embedding,
            token_count,
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        8191
    }

    async fn embed_text(
        &self,
        texts: &[&str],
        _config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

/// Scale `v` to unit length; zero vectors are left unchanged.
pub(crate) fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_hash_new() {
        let embedder = HashEmbedder::new();
        assert_eq!(embedder.dimension(), 384);
        assert_eq!(embedder.model_name(), "hash");
    }

    #[test]
    fn test_with_dimension() {
        assert_eq!(HashEmbedder::with_dimension(64).dimension(), 64);
        assert_eq!(HashEmbedder::with_dimension(0).dimension(), 1);
    }

    #[tokio::test]
    async fn test_embeddings_are_deterministic_unit_vectors() {
        let embedder = HashEmbedder::new();
        let config = EmbeddingConfig::default();

        let a = embedder.embed_text(&["Protein folding"], &config).await.unwrap();
        let b = embedder.embed_text(&["protein folding!"], &config).await.unwrap();

        assert_eq!(a[0].embedding, b[0].embedding);
        assert_eq!(a[0].token_count, 2);
        assert!((dot(&a[0].embedding, &a[0].embedding) - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_words_are_closer() {
        let embedder = HashEmbedder::new();
        let config = EmbeddingConfig::default();
        let out = embedder
            .embed_text(
                &[
                    "neural networks for protein structure",
                    "protein structure prediction",
                    "medieval trade routes in europe",
                ],
                &config,
            )
            .await
            .unwrap();

        let related = dot(&out[0].embedding, &out[1].embedding);
        let unrelated = dot(&out[0].embedding, &out[2].embedding);
        assert!(related > unrelated);
    }

    #[tokio::test]
    async fn test_empty_text_is_zero_vector() {
        let embedder = HashEmbedder::with_dimension(8);
        let out = embedder
            .embed_text(&[""], &EmbeddingConfig::default())
            .await
            .unwrap();
        assert!(out[0].embedding.iter().all(|&v| v == 0.0));
        assert_eq!(out[0].token_count, 0);
    }

    #[tokio::test]
    async fn test_embed_empty_batch() {
        let embedder = HashEmbedder::new();
        let texts: Vec<&str> = vec![];
        let outputs = embedder
            .embed_text(&texts, &EmbeddingConfig::default())
            .await
            .unwrap();
        assert!(outputs.is_empty());
    }
}
