//! Whole-stage runs that read and write the data directory artifacts.

use std::sync::Arc;

use tracing::info;
use zotrag_cache::{read_artifact, write_artifact, DataLayout};
use zotrag_core::{
    AggregateResult, Passage, PassageRecord, ProcessedDocument, Result, VectorStore, WorkItem,
};

use crate::coordinator::Coordinator;
use crate::stages::{ChunkingStage, EmbeddingStage, ExtractionStage};

/// Runs each stage through the coordinator and persists its artifact.
pub struct Pipeline {
    layout: DataLayout,
    coordinator: Coordinator,
}

impl Pipeline {
    pub fn new(layout: DataLayout, coordinator: Coordinator) -> Self {
        Self {
            layout,
            coordinator,
        }
    }

    #[must_use]
    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    #[must_use]
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Extract every work item and write `zotero_docs.json`.
    pub async fn extract(
        &self,
        stage: Arc<ExtractionStage>,
        items: Vec<WorkItem>,
    ) -> Result<AggregateResult<ProcessedDocument>> {
        let result = self.coordinator.run(stage, items).await?;
        let path = self.layout.documents_file();
        write_artifact(&path, &result.items).await?;
        info!("Saved {} documents to {}", result.items.len(), path.display());
        Ok(result)
    }

    /// Chunk every document and write `zotero_chunks.json`.
    ///
    /// Returns the run result and the flattened passages.
    pub async fn chunk(
        &self,
        stage: Arc<ChunkingStage>,
        documents: Vec<ProcessedDocument>,
    ) -> Result<(AggregateResult<Vec<Passage>>, Vec<Passage>)> {
        let result = self.coordinator.run(stage, documents).await?;
        let passages: Vec<Passage> = result.items.iter().flatten().cloned().collect();
        let path = self.layout.chunks_file();
        write_artifact(&path, &passages).await?;
        info!("Saved {} passages to {}", passages.len(), path.display());
        Ok((result, passages))
    }

    /// Embed every passage and replace the contents of `store`.
    pub async fn embed(
        &self,
        stage: Arc<EmbeddingStage>,
        passages: Vec<Passage>,
        store: &dyn VectorStore,
    ) -> Result<AggregateResult<Vec<PassageRecord>>> {
        store.init().await?;
        store.reset().await?;

        let batches = stage.batches(passages);
        let result = self.coordinator.run(stage, batches).await?;

        let records: Vec<PassageRecord> = result.items.iter().flatten().cloned().collect();
        store.insert(&records).await?;
        info!("Stored {} vectors", records.len());
        Ok(result)
    }

    /// Documents saved by a previous extraction, if any.
    pub async fn load_documents(&self) -> Result<Option<Vec<ProcessedDocument>>> {
        read_artifact(&self.layout.documents_file()).await
    }

    /// Passages saved by a previous chunking run, if any.
    pub async fn load_passages(&self) -> Result<Option<Vec<Passage>>> {
        read_artifact(&self.layout.chunks_file()).await
    }
}
