//! Query execution.

use std::sync::Arc;
use tracing::debug;
use zotrag_core::{
    DistanceMetric, Embedder, EmbeddingConfig, Error, SearchQuery, SearchResult, VectorStore,
};

/// Default number of results.
pub const DEFAULT_LIMIT: usize = 5;

/// Query executor.
pub struct QueryExecutor {
    /// Vector store
    store: Arc<dyn VectorStore>,
    /// Embedder for query embedding
    embedder: Arc<dyn Embedder>,
    /// Embedding configuration used for queries
    config: EmbeddingConfig,
}

impl QueryExecutor {
    /// Create a new query executor.
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            store,
            embedder,
            config: EmbeddingConfig::default(),
        }
    }

    /// Passages closest to `query`, best first.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, Error> {
        debug!("Executing query: {}", query);

        let embedding = self.embedder.embed_query(query, &self.config).await?;

        let search_query = SearchQuery {
            embedding: embedding.embedding,
            text: Some(query.to_string()),
            limit,
            metric: DistanceMetric::Cosine,
        };

        let results = self.store.search(search_query).await?;
        debug!("Found {} results", results.len());
        Ok(results)
    }

    /// Passages written by `author`.
    ///
    /// Searches for `2 * limit` passages near the author's name, keeps those
    /// whose creators contain it (ignoring case) and returns at most `limit`.
    pub async fn search_by_author(
        &self,
        author: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, Error> {
        let needle = author.to_lowercase();
        let mut results = self.search(author, limit.saturating_mul(2)).await?;

        results.retain(|r| {
            r.metadata
                .creators
                .as_deref()
                .is_some_and(|c| c.to_lowercase().contains(&needle))
        });
        results.truncate(limit);
        Ok(results)
    }

    /// Number of stored passages.
    pub async fn count(&self) -> Result<u64, Error> {
        Ok(self.store.count().await?)
    }
}
