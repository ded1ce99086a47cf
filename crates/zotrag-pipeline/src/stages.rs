//! The extraction, chunking and embedding stages.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use zotrag_cache::DiskCache;
use zotrag_chunker::chunk_document;
use zotrag_core::{
    CacheKey, ChunkConfig, Chunker, DocumentConverter, EmbeddingConfig, Passage, PassageRecord,
    ProcessedDocument, RecordMetadata, TaskError, WorkItem,
};
use zotrag_embed::EmbedderPool;
use zotrag_extract::AttachmentFetcher;

use crate::coordinator::Stage;

/// Download, validate and convert one PDF attachment.
pub struct ExtractionStage {
    fetcher: AttachmentFetcher,
    converter: Arc<dyn DocumentConverter>,
    cache: DiskCache,
}

impl ExtractionStage {
    pub fn new(
        fetcher: AttachmentFetcher,
        converter: Arc<dyn DocumentConverter>,
        cache: DiskCache,
    ) -> Self {
        Self {
            fetcher,
            converter,
            cache,
        }
    }
}

#[async_trait]
impl Stage for ExtractionStage {
    type Input = WorkItem;
    type Output = ProcessedDocument;

    fn name(&self) -> &'static str {
        "extract"
    }

    fn cache(&self) -> Option<&DiskCache> {
        Some(&self.cache)
    }

    fn cache_key(&self, item: &WorkItem) -> Option<CacheKey> {
        Some(CacheKey::derive(&item.parent_key, &item.attachment_key))
    }

    fn title(&self, item: &WorkItem) -> String {
        item.title.clone()
    }

    async fn compute(&self, item: &WorkItem) -> Result<ProcessedDocument, TaskError> {
        // The temp file lives exactly as long as `pdf`
        let pdf = self.fetcher.fetch_and_validate(&item.attachment_key).await?;
        let document = self.converter.convert(pdf.path()).await?;
        debug!(
            "Converted {} ({} bytes, {} pages) with {}",
            item.title,
            pdf.size(),
            document.page_count,
            self.converter.name()
        );

        Ok(ProcessedDocument {
            document,
            zotero_key: item.parent_key.clone(),
            attachment_key: item.attachment_key.clone(),
            title: item.title.clone(),
            creators: item.creators.clone(),
            date: item.date.clone(),
            item_type: item.item_type.clone(),
            pdf_size: pdf.size(),
            processed_at: chrono::Utc::now(),
        })
    }
}

/// Split one processed document into passages.
pub struct ChunkingStage {
    chunker: Arc<dyn Chunker>,
    config: ChunkConfig,
    cache: DiskCache,
}

impl ChunkingStage {
    pub fn new(chunker: Arc<dyn Chunker>, config: ChunkConfig, cache: DiskCache) -> Self {
        Self {
            chunker,
            config,
            cache,
        }
    }
}

#[async_trait]
impl Stage for ChunkingStage {
    type Input = ProcessedDocument;
    type Output = Vec<Passage>;

    fn name(&self) -> &'static str {
        "chunk"
    }

    fn cache(&self) -> Option<&DiskCache> {
        Some(&self.cache)
    }

    fn cache_key(&self, document: &ProcessedDocument) -> Option<CacheKey> {
        Some(CacheKey::derive(&document.zotero_key, &document.attachment_key))
    }

    fn title(&self, document: &ProcessedDocument) -> String {
        document.title.clone()
    }

    async fn compute(&self, document: &ProcessedDocument) -> Result<Vec<Passage>, TaskError> {
        Ok(chunk_document(self.chunker.as_ref(), document, &self.config).await?)
    }
}

/// Embed one batch of passages. Not cached.
pub struct EmbeddingStage {
    pool: Arc<EmbedderPool>,
    config: EmbeddingConfig,
}

impl EmbeddingStage {
    pub fn new(pool: Arc<EmbedderPool>, config: EmbeddingConfig) -> Self {
        Self { pool, config }
    }

    /// Group passages into batches of the configured size.
    #[must_use]
    pub fn batches(&self, passages: Vec<Passage>) -> Vec<Vec<Passage>> {
        let size = self.config.batch_size.max(1);
        let mut batches = Vec::with_capacity(passages.len().div_ceil(size));
        let mut current = Vec::with_capacity(size);
        for passage in passages {
            current.push(passage);
            if current.len() == size {
                batches.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
            }
        }
        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }
}

#[async_trait]
impl Stage for EmbeddingStage {
    type Input = Vec<Passage>;
    type Output = Vec<PassageRecord>;

    fn name(&self) -> &'static str {
        "embed"
    }

    fn cache(&self) -> Option<&DiskCache> {
        None
    }

    fn cache_key(&self, _batch: &Vec<Passage>) -> Option<CacheKey> {
        None
    }

    fn title(&self, batch: &Vec<Passage>) -> String {
        match batch.first() {
            Some(first) => format!("{} passages from {}", batch.len(), first.title),
            None => "empty batch".to_string(),
        }
    }

    async fn compute(&self, batch: &Vec<Passage>) -> Result<Vec<PassageRecord>, TaskError> {
        let texts: Vec<&str> = batch.iter().map(|p| p.text.as_str()).collect();
        let outputs = self.pool.embed_batch(&texts, &self.config).await?;
        if outputs.len() != batch.len() {
            return Err(TaskError::Unexpected(format!(
                "embedder returned {} vectors for {} passages",
                outputs.len(),
                batch.len()
            )));
        }

        Ok(batch
            .iter()
            .zip(outputs)
            .map(|(passage, output)| PassageRecord {
                id: passage.id,
                text: passage.text.clone(),
                vector: output.embedding,
                metadata: RecordMetadata::from_passage(passage),
            })
            .collect())
    }
}
