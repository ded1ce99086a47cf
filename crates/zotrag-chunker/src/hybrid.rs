//! Structure-aware chunking.
//!
//! Consecutive blocks of one section are merged into a passage until the
//! token budget is reached. Headings open a new passage. Blocks larger than
//! the budget are split on their own.

use async_trait::async_trait;
use zotrag_core::{BlockKind, ChunkConfig, ChunkError, ChunkOutput, Chunker, Document};

use crate::split::{estimate_tokens, split_text, CHARS_PER_TOKEN};

/// Chunker that follows the block structure of a [`Document`].
pub struct HybridChunker;

impl HybridChunker {
    /// Create a new hybrid chunker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for HybridChunker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Chunker for HybridChunker {
    fn name(&self) -> &str {
        "hybrid"
    }

    async fn chunk(
        &self,
        document: &Document,
        config: &ChunkConfig,
    ) -> Result<Vec<ChunkOutput>, ChunkError> {
        if config.max_tokens == 0 {
            return Err(ChunkError::InvalidConfig(
                "max_tokens must be at least 1".to_string(),
            ));
        }

        let mut builder = PassageBuilder::new(config.max_tokens);
        for block in &document.blocks {
            let text = block.text.trim();
            if text.is_empty() {
                continue;
            }

            if block.kind == BlockKind::Heading {
                builder.flush();
                builder.headings = vec![text.to_string()];
            }

            let tokens = estimate_tokens(text);
            if tokens > config.max_tokens {
                builder.flush();
                for piece in split_text(text, config.max_tokens * CHARS_PER_TOKEN) {
                    builder.push(&piece, block.page_no);
                    builder.flush();
                }
                continue;
            }

            if !config.merge_peers || !builder.fits(text) {
                builder.flush();
            }
            builder.push(text, block.page_no);
        }
        builder.flush();

        Ok(builder.outputs)
    }
}

struct PassageBuilder {
    max_tokens: usize,
    headings: Vec<String>,
    parts: Vec<String>,
    pages: Vec<u32>,
    outputs: Vec<ChunkOutput>,
}

impl PassageBuilder {
    fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            headings: Vec::new(),
            parts: Vec::new(),
            pages: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Whether `text` can join the current passage without exceeding the budget.
    fn fits(&self, text: &str) -> bool {
        if self.parts.is_empty() {
            return true;
        }
        let current: usize = self.parts.iter().map(|p| p.chars().count() + 2).sum();
        (current + text.chars().count()).div_ceil(CHARS_PER_TOKEN) <= self.max_tokens
    }

    fn push(&mut self, text: &str, page_no: u32) {
        self.parts.push(text.to_string());
        self.pages.push(page_no);
    }

    fn flush(&mut self) {
        if self.parts.is_empty() {
            return;
        }
        let mut page_numbers = std::mem::take(&mut self.pages);
        page_numbers.sort_unstable();
        page_numbers.dedup();

        self.outputs.push(ChunkOutput {
            content: std::mem::take(&mut self.parts).join("\n\n"),
            headings: self.headings.clone(),
            page_numbers,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zotrag_core::TextBlock;

    fn block(kind: BlockKind, text: &str, page_no: u32) -> TextBlock {
        TextBlock {
            kind,
            text: text.to_string(),
            page_no,
        }
    }

    fn para(text: &str, page_no: u32) -> TextBlock {
        block(BlockKind::Paragraph, text, page_no)
    }

    fn doc(blocks: Vec<TextBlock>) -> Document {
        let page_count = blocks.iter().map(|b| b.page_no).max().unwrap_or(0);
        Document { blocks, page_count }
    }

    fn config(max_tokens: usize) -> ChunkConfig {
        ChunkConfig {
            max_tokens,
            merge_peers: true,
        }
    }

    #[tokio::test]
    async fn test_empty_document_has_no_passages() {
        let chunks = HybridChunker::new()
            .chunk(&Document::default(), &ChunkConfig::default())
            .await
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_small_blocks_merge_into_one_passage() {
        let document = doc(vec![para("First point.", 1), para("Second point.", 2)]);

        let chunks = HybridChunker::new()
            .chunk(&document, &ChunkConfig::default())
            .await
            .unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "First point.\n\nSecond point.");
        assert_eq!(chunks[0].page_numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_heading_starts_new_passage() {
        let document = doc(vec![
            para("Abstract text.", 1),
            block(BlockKind::Heading, "Methods", 2),
            para("We measured things.", 2),
        ]);

        let chunks = HybridChunker::new()
            .chunk(&document, &ChunkConfig::default())
            .await
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].headings.is_empty());
        assert_eq!(chunks[1].headings, vec!["Methods".to_string()]);
        assert_eq!(chunks[1].content, "Methods\n\nWe measured things.");
    }

    #[tokio::test]
    async fn test_budget_forces_new_passage() {
        let text = "a".repeat(30);
        let document = doc(vec![para(&text, 1), para(&text, 1), para(&text, 2)]);

        // 16 tokens = 64 chars: two 30-char blocks plus separator fit, three do not
        let chunks = HybridChunker::new()
            .chunk(&document, &config(16))
            .await
            .unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page_numbers, vec![1]);
        assert_eq!(chunks[1].page_numbers, vec![2]);
    }

    #[tokio::test]
    async fn test_oversize_block_is_split() {
        let long = "Sentence number one is here. ".repeat(40);
        let document = doc(vec![para("Intro.", 1), para(&long, 3)]);

        let chunks = HybridChunker::new()
            .chunk(&document, &config(50))
            .await
            .unwrap();

        assert!(chunks.len() > 2);
        assert_eq!(chunks[0].content, "Intro.");
        for chunk in &chunks[1..] {
            assert!(estimate_tokens(&chunk.content) <= 50);
            assert_eq!(chunk.page_numbers, vec![3]);
        }
    }

    #[tokio::test]
    async fn test_merge_peers_disabled() {
        let document = doc(vec![para("One.", 1), para("Two.", 1)]);
        let config = ChunkConfig {
            max_tokens: 100,
            merge_peers: false,
        };

        let chunks = HybridChunker::new().chunk(&document, &config).await.unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[tokio::test]
    async fn test_zero_budget_is_invalid() {
        let result = HybridChunker::new()
            .chunk(&doc(vec![para("x", 1)]), &config(0))
            .await;
        assert!(matches!(result, Err(ChunkError::InvalidConfig(_))));
    }
}
