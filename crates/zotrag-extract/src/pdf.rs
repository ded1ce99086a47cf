//! PDF converter.
//!
//! Uses pdf-extract for the text and lopdf to recover page boundaries when
//! pdf-extract emits none.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};
use zotrag_core::{BlockKind, ConvertError, Document, DocumentConverter, TextBlock};

/// Converter for PDF files.
pub struct PdfConverter;

impl PdfConverter {
    /// Create a new PDF converter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentConverter for PdfConverter {
    fn name(&self) -> &str {
        "pdf-extract"
    }

    async fn convert(&self, path: &Path) -> Result<Document, ConvertError> {
        debug!("Converting PDF: {:?}", path);

        let bytes = tokio::fs::read(path).await?;

        // pdf-extract panics on some malformed inputs; the join error catches it
        let pages = tokio::task::spawn_blocking(move || extract_pages(&bytes))
            .await
            .map_err(|e| ConvertError::Failed(format!("PDF library crashed: {e}")))?
            .map_err(|e| ConvertError::Failed(format!("PDF extraction failed: {e}")))?;

        let document = build_document(&pages);
        if document.is_empty() {
            return Err(ConvertError::Empty);
        }

        debug!(
            "Converted {:?}: {} pages, {} blocks",
            path,
            document.page_count,
            document.blocks.len()
        );
        Ok(document)
    }
}

/// Text of each page, in order.
fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, String> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| e.to_string())?;

    // Form feeds mark page breaks
    if text.contains('\x0C') {
        return Ok(text.split('\x0C').map(str::to_string).collect());
    }

    match lopdf::Document::load_mem(bytes) {
        Ok(doc) => {
            let pages: Vec<String> = doc
                .get_pages()
                .keys()
                .map(|&page_no| doc.extract_text(&[page_no]).unwrap_or_default())
                .collect();
            if pages.iter().any(|p| !p.trim().is_empty()) {
                return Ok(pages);
            }
        }
        Err(e) => warn!("lopdf could not load document for page split: {}", e),
    }

    Ok(vec![text])
}

/// Build a [`Document`] from page texts. Pages are numbered from 1.
fn build_document(pages: &[String]) -> Document {
    let mut blocks = Vec::new();

    for (index, page) in pages.iter().enumerate() {
        let page_no = u32::try_from(index + 1).unwrap_or(u32::MAX);

        for paragraph in page.split("\n\n") {
            let trimmed = paragraph.trim();
            if trimmed.is_empty() {
                continue;
            }

            let kind = if looks_like_heading(trimmed) {
                BlockKind::Heading
            } else {
                BlockKind::Paragraph
            };
            blocks.push(TextBlock {
                kind,
                text: trimmed.to_string(),
                page_no,
            });
        }
    }

    Document {
        blocks,
        page_count: u32::try_from(pages.len()).unwrap_or(u32::MAX),
    }
}

/// Heuristic to detect if text looks like a heading.
fn looks_like_heading(text: &str) -> bool {
    if text.len() > 100 || text.ends_with('.') || text.contains('\n') {
        return false;
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > 8 {
        return false;
    }

    // Mostly capitalized words
    let caps_count = words
        .iter()
        .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
        .count();
    caps_count * 2 >= words.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| (*t).to_string()).collect()
    }

    // ========== Document Building ==========

    #[test]
    fn test_blocks_carry_page_numbers() {
        let doc = build_document(&pages(&[
            "Introduction\n\nFirst page body text.",
            "Second page body text.",
        ]));

        assert_eq!(doc.page_count, 2);
        assert_eq!(doc.blocks.len(), 3);
        assert_eq!(doc.blocks[0].page_no, 1);
        assert_eq!(doc.blocks[1].page_no, 1);
        assert_eq!(doc.blocks[2].page_no, 2);
    }

    #[test]
    fn test_headings_are_classified() {
        let doc = build_document(&pages(&["Related Work\n\nPrior studies show this."]));
        assert_eq!(doc.blocks[0].kind, BlockKind::Heading);
        assert_eq!(doc.blocks[1].kind, BlockKind::Paragraph);
    }

    #[test]
    fn test_blank_paragraphs_are_dropped() {
        let doc = build_document(&pages(&["\n\n   \n\nOnly text here."]));
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].text, "Only text here.");
    }

    #[test]
    fn test_blank_pages_still_count() {
        let doc = build_document(&pages(&["Body text.", "   ", "More body text."]));
        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.blocks[1].page_no, 3);
    }

    #[test]
    fn test_whitespace_only_pages_build_empty_document() {
        assert!(build_document(&pages(&["  ", "\n\n"])).is_empty());
    }

    // ========== Heading Heuristic ==========

    #[test]
    fn test_looks_like_heading() {
        assert!(looks_like_heading("Introduction"));
        assert!(looks_like_heading("2 Materials And Methods"));
        assert!(!looks_like_heading("This is a sentence."));
        assert!(!looks_like_heading("the results were mostly not significant here"));
        assert!(!looks_like_heading(&"Long ".repeat(30)));
    }

    // ========== Conversion Errors ==========

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PdfConverter::new()
            .convert(&dir.path().join("absent.pdf"))
            .await;
        assert!(matches!(result, Err(ConvertError::Io(_))));
    }

    #[tokio::test]
    async fn test_garbage_bytes_fail_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\nnot really a pdf\n%%EOF\n").unwrap();

        let result = PdfConverter::new().convert(&path).await;
        assert!(matches!(
            result,
            Err(ConvertError::Failed(_) | ConvertError::Empty)
        ));
    }
}
