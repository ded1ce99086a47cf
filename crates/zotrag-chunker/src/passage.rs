//! Attaching document metadata to chunker output.

use uuid::Uuid;
use zotrag_core::{ChunkConfig, ChunkError, ChunkOutput, Chunker, Passage, ProcessedDocument};

/// Wrap chunker outputs as [`Passage`]s carrying the document's metadata.
#[must_use]
pub fn to_passages(document: &ProcessedDocument, outputs: Vec<ChunkOutput>) -> Vec<Passage> {
    outputs
        .into_iter()
        .map(|output| Passage {
            id: Uuid::new_v4(),
            text: output.content,
            headings: output.headings,
            page_numbers: output.page_numbers,
            zotero_key: document.zotero_key.clone(),
            title: document.title.clone(),
            creators: document.creators.clone(),
            date: document.date.clone(),
            item_type: document.item_type.clone(),
            pdf_size: document.pdf_size,
        })
        .collect()
}

/// Chunk one processed document into passages.
pub async fn chunk_document(
    chunker: &dyn Chunker,
    document: &ProcessedDocument,
    config: &ChunkConfig,
) -> Result<Vec<Passage>, ChunkError> {
    let outputs = chunker.chunk(&document.document, config).await?;
    Ok(to_passages(document, outputs))
}
