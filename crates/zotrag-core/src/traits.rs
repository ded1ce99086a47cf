//! Core traits for zotrag components.
//!
//! - [`LibrarySource`]: List library items and fetch attachment bytes
//! - [`DocumentConverter`]: Convert a local PDF into a [`Document`]
//! - [`DocumentExport`]: Render document-like values as text
//! - [`Chunker`]: Split documents into passages
//! - [`Embedder`]: Generate vector embeddings
//! - [`VectorStore`]: Store and search passage vectors
//! - [`ChatModel`]: Answer from a conversation
//!
//! Components are passed around as `Arc<dyn Trait>` so implementations can be
//! swapped for fakes in tests.

use async_trait::async_trait;
use std::path::Path;

use crate::error::{ChatError, ChunkError, ConvertError, EmbedError, LibraryError, StoreError};
use crate::types::{
    BlockKind, ChatMessage, ChunkConfig, ChunkOutput, Document, EmbeddingConfig, EmbeddingOutput,
    LibraryItem, PassageRecord, ProcessedDocument, SearchQuery, SearchResult,
};

// ============================================================================
// Library Access
// ============================================================================

/// Remote reference library.
#[async_trait]
pub trait LibrarySource: Send + Sync {
    /// Every item of the library, attachments included.
    async fn list_items(&self) -> Result<Vec<LibraryItem>, LibraryError>;

    /// Raw bytes of an attachment file.
    async fn fetch_attachment(&self, attachment_key: &str) -> Result<Vec<u8>, LibraryError>;
}

// ============================================================================
// Conversion
// ============================================================================

/// Converts a local file into a structured [`Document`].
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Name of the converter, for logs.
    fn name(&self) -> &str;

    /// Convert the file at `path`. An empty result is an error.
    async fn convert(&self, path: &Path) -> Result<Document, ConvertError>;
}

/// Export capability shared by all document-like values.
pub trait DocumentExport {
    /// Plain text, blocks separated by blank lines.
    fn to_text(&self) -> String;

    /// Markdown with headings rendered as `##`.
    fn to_markdown(&self) -> String;
}

impl DocumentExport for Document {
    fn to_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn to_markdown(&self) -> String {
        self.blocks
            .iter()
            .map(|b| match b.kind {
                BlockKind::Heading => format!("## {}", b.text),
                BlockKind::Paragraph => b.text.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl DocumentExport for ProcessedDocument {
    fn to_text(&self) -> String {
        self.document.to_text()
    }

    fn to_markdown(&self) -> String {
        format!("# {}\n\n{}", self.title, self.document.to_markdown())
    }
}

// ============================================================================
// Chunking
// ============================================================================

/// Trait for splitting documents into passages.
#[async_trait]
pub trait Chunker: Send + Sync {
    /// Name of this chunking strategy.
    fn name(&self) -> &str;

    /// Chunk a converted document.
    async fn chunk(
        &self,
        document: &Document,
        config: &ChunkConfig,
    ) -> Result<Vec<ChunkOutput>, ChunkError>;
}

// ============================================================================
// Embedding
// ============================================================================

/// Trait for generating embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Maximum tokens per input.
    fn max_tokens(&self) -> usize;

    /// Embed text content.
    async fn embed_text(
        &self,
        texts: &[&str],
        config: &EmbeddingConfig,
    ) -> Result<Vec<EmbeddingOutput>, EmbedError>;

    /// Embed a query.
    async fn embed_query(
        &self,
        query: &str,
        config: &EmbeddingConfig,
    ) -> Result<EmbeddingOutput, EmbedError> {
        let results = self.embed_text(&[query], config).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Inference("empty embedding result".to_string()))
    }
}

// ============================================================================
// Vector Storage
// ============================================================================

/// Trait for vector storage and search.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Initialize the store, creating the table if needed.
    async fn init(&self) -> Result<(), StoreError>;

    /// Drop every record.
    async fn reset(&self) -> Result<(), StoreError>;

    /// Append records.
    async fn insert(&self, records: &[PassageRecord]) -> Result<(), StoreError>;

    /// Nearest records to the query embedding, best first.
    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>, StoreError>;

    /// Number of stored records.
    async fn count(&self) -> Result<u64, StoreError>;
}

// ============================================================================
// Chat
// ============================================================================

/// Language model used to answer questions.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Reply to the conversation.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextBlock;

    fn sample() -> Document {
        Document {
            blocks: vec![
                TextBlock {
                    kind: BlockKind::Heading,
                    text: "Introduction".to_string(),
                    page_no: 1,
                },
                TextBlock {
                    kind: BlockKind::Paragraph,
                    text: "Body text.".to_string(),
                    page_no: 1,
                },
            ],
            page_count: 1,
        }
    }

    #[test]
    fn test_document_to_text() {
        assert_eq!(sample().to_text(), "Introduction\n\nBody text.");
    }

    #[test]
    fn test_document_to_markdown() {
        assert_eq!(sample().to_markdown(), "## Introduction\n\nBody text.");
    }
}
