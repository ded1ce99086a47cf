//! OpenAI embeddings API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zotrag_core::{EmbedError, Embedder, EmbeddingConfig, EmbeddingOutput};

use crate::hash::normalize;

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "text-embedding-3-large";

/// Embedder backed by `POST /v1/embeddings`.
pub struct OpenAiEmbedder {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
    max_tokens: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: usize,
}

impl OpenAiEmbedder {
    /// `text-embedding-3-large` (3072 dimensions, 8191 input tokens).
    pub fn new(api_key: impl Into<String>) -> Result<Self, EmbedError> {
        Self::with_model(api_key, DEFAULT_MODEL, 3072)
    }

    pub fn with_model(
        api_key: impl Into<String>,
        model: &str,
        dimension: usize,
    ) -> Result<Self, EmbedError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EmbedError::MissingApiKey(format!("{ENV_API_KEY} is not set")));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| EmbedError::Request(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
            dimension,
            max_tokens: 8191,
        })
    }

    /// Read the key from `OPENAI_API_KEY`.
    pub fn from_env(model: &str, dimension: usize) -> Result<Self, EmbedError> {
        let key = std::env::var(ENV_API_KEY).unwrap_or_default();
        Self::with_model(key, model, dimension)
    }

    /// Point at an OpenAI-compatible server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        let response = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| EmbedError::Request(format!("failed to call embeddings API: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Request(format!(
                "embeddings API returned {status}: {body}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Inference(format!("failed to parse response: {e}")))?;

        let total_tokens = parsed.usage.map_or(0, |u| u.total_tokens);
        into_outputs(parsed.data, texts.len(), total_tokens)
    }
}

/// Order data by index and check the count matches the input.
fn into_outputs(
    mut data: Vec<EmbeddingDatum>,
    expected: usize,
    total_tokens: usize,
) -> Result<Vec<EmbeddingOutput>, EmbedError> {
    if data.len() != expected {
        return Err(EmbedError::Inference(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    let per_input = total_tokens / expected.max(1);
    Ok(data
        .into_iter()
        .map(|d| EmbeddingOutput {
            embedding: d.embedding,
            token_count: per_input,
        })
        .collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError> {
        let mut outputs = Vec::with_capacity(texts.len());
        for batch in texts.chunks(config.batch_size.max(1)) {
            debug!("Embedding batch of {} texts with {}", batch.len(), self.model);
            outputs.extend(self.request(batch).await?);
        }
        if config.normalize {
            for output in &mut outputs {
                normalize(&mut output.embedding);
            }
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_rejected() {
        assert!(matches!(
            OpenAiEmbedder::new("  "),
            Err(EmbedError::MissingApiKey(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let embedder = OpenAiEmbedder::new("sk-test").unwrap();
        assert_eq!(embedder.model_name(), "text-embedding-3-large");
        assert_eq!(embedder.dimension(), 3072);
        assert_eq!(embedder.max_tokens(), 8191);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let embedder = OpenAiEmbedder::new("sk-test")
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(embedder.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_outputs_are_ordered_by_index() {
        let data = vec![
            EmbeddingDatum {
                index: 1,
                embedding: vec![0.0, 1.0],
            },
            EmbeddingDatum {
                index: 0,
                embedding: vec![1.0, 0.0],
            },
        ];
        let outputs = into_outputs(data, 2, 10).unwrap();
        assert_eq!(outputs[0].embedding, vec![1.0, 0.0]);
        assert_eq!(outputs[1].token_count, 5);
    }

    #[test]
    fn test_count_mismatch_is_an_error() {
        let data = vec![EmbeddingDatum {
            index: 0,
            embedding: vec![1.0],
        }];
        assert!(into_outputs(data, 2, 0).is_err());
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "object": "list",
            "data": [{"object": "embedding", "index": 0, "embedding": [0.5, 0.5]}],
            "model": "text-embedding-3-large",
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }"#;
        let parsed: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.usage.unwrap().total_tokens, 4);
    }
}
