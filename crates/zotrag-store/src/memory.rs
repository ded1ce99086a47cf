//! In-memory store with an optional JSON snapshot.
//!
//! [`MemoryStore`] keeps every [`PassageRecord`] in memory and answers
//! queries by brute-force similarity. When opened with a snapshot path,
//! every mutation is written back so the index survives between CLI runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};
use zotrag_cache::{read_artifact, write_artifact};
use zotrag_core::{
    DistanceMetric, PassageRecord, SearchQuery, SearchResult, StoreError, VectorStore,
};

/// File name of the snapshot inside the vector directory.
pub const SNAPSHOT_FILE: &str = "passages.json";

/// In-memory vector store.
///
/// # Example
///
/// ```rust
/// use zotrag_store::MemoryStore;
/// use zotrag_core::VectorStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new(384);
/// store.init().await?;
///
/// assert_eq!(store.count().await?, 0);
/// # Ok(())
/// # }
/// ```
pub struct MemoryStore {
    dimension: usize,
    records: Arc<RwLock<Vec<PassageRecord>>>,
    snapshot: Option<PathBuf>,
}

impl MemoryStore {
    /// Create an empty store that is never written to disk.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: Arc::new(RwLock::new(Vec::new())),
            snapshot: None,
        }
    }

    /// Open a store backed by the snapshot at `path`, loading it if present.
    pub async fn open(path: impl Into<PathBuf>, dimension: usize) -> Result<Self, StoreError> {
        let path = path.into();
        let records: Vec<PassageRecord> = read_artifact(&path)
            .await
            .map_err(|e| StoreError::Init(format!("failed to load {}: {e}", path.display())))?
            .unwrap_or_default();

        if let Some(first) = records.first() {
            if first.vector.len() != dimension {
                return Err(StoreError::Schema(format!(
                    "snapshot has dimension {}, embedder has {dimension}",
                    first.vector.len()
                )));
            }
        }

        debug!("Loaded {} records from {}", records.len(), path.display());
        Ok(Self {
            dimension,
            records: Arc::new(RwLock::new(records)),
            snapshot: Some(path),
        })
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot.as_deref()
    }

    async fn persist(&self, records: &[PassageRecord]) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot else {
            return Ok(());
        };
        write_artifact(path, &records)
            .await
            .map_err(|e| StoreError::Insert(format!("failed to write {}: {e}", path.display())))
    }

    /// Score of `candidate` against `query`; higher is closer for every metric.
    fn score(metric: DistanceMetric, query: &[f32], candidate: &[f32]) -> f32 {
        match metric {
            DistanceMetric::Cosine => Self::cosine_similarity(query, candidate),
            DistanceMetric::Dot => query.iter().zip(candidate).map(|(a, b)| a * b).sum(),
            DistanceMetric::L2 => {
                let distance: f32 = query
                    .iter()
                    .zip(candidate)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + distance)
            }
        }
    }

    /// Compute cosine similarity between two vectors.
    fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
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
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn init(&self) -> Result<(), StoreError> {
        debug!("MemoryStore initialized (dimension: {})", self.dimension);
        Ok(())
    }

    async fn reset(&self) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records.clear();
        if let Some(path) = &self.snapshot {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(StoreError::Delete(format!(
                        "failed to remove {}: {e}",
                        path.display()
                    )))
                }
            }
        }
        info!("Cleared vector store");
        Ok(())
    }

    async fn insert(&self, new_records: &[PassageRecord]) -> Result<(), StoreError> {
        if new_records.is_empty() {
            return Ok(());
        }
        if let Some(bad) = new_records.iter().find(|r| r.vector.len() != self.dimension) {
            return Err(StoreError::Schema(format!(
                "record {} has dimension {}, expected {}",
                bad.id,
                bad.vector.len(),
                self.dimension
            )));
        }

        let mut records = self.records.write().await;
        records.extend_from_slice(new_records);
        self.persist(&records).await?;
        debug!("Inserted {} records", new_records.len());
        Ok(())
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>, StoreError> {
        let records = self.records.read().await;
        let mut scored: Vec<(f32, &PassageRecord)> = records
            .iter()
            .map(|r| (Self::score(query.metric, &query.embedding, &r.vector), r))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(query.limit)
            .map(|(score, r)| SearchResult {
                id: r.id,
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                score,
            })
            .collect())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.records.read().await.len() as u64)
    }
}
