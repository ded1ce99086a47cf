//! Core types for zotrag.
//!
//! ## Library Records
//! - [`LibraryItem`]: A raw item as listed by the reference library
//! - [`Creator`]: An author, editor or institution of a record
//! - [`WorkItem`]: One record joined with one PDF attachment
//!
//! ## Documents
//! - [`Document`]: Converted text blocks with page provenance
//! - [`ProcessedDocument`]: A document plus its library metadata
//! - [`Passage`]: A bounded-size slice of a document
//!
//! ## Outcomes
//! - [`TaskOutcome`]: Success or failure of one item
//! - [`AggregateResult`]: Values and counters of a whole run
//!
//! ## Embeddings and Search
//! - [`EmbeddingConfig`], [`EmbeddingOutput`]
//! - [`PassageRecord`]: A passage with its vector, as stored
//! - [`SearchQuery`], [`SearchResult`], [`DistanceMetric`]
//!
//! ## Chat
//! - [`ChatMessage`], [`ChatRole`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title used when a record has none.
pub const UNTITLED: &str = "Untitled";

// ============================================================================
// Library Records
// ============================================================================

/// An item as returned by the reference library listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryItem {
    /// Library-unique item key
    pub key: String,
    /// Item fields
    #[serde(default)]
    pub data: ItemData,
}

/// Fields of a library item. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemData {
    /// Item type, e.g. `journalArticle` or `attachment`
    pub item_type: String,
    pub title: Option<String>,
    pub creators: Vec<Creator>,
    pub date: Option<String>,
    /// Parent record key (attachments and notes only)
    pub parent_item: Option<String>,
    /// MIME type (attachments only)
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

impl ItemData {
    /// True for attachments carrying a PDF.
    #[must_use]
    pub fn is_pdf_attachment(&self) -> bool {
        self.item_type == "attachment" && self.content_type.as_deref() == Some("application/pdf")
    }

    /// True for anything that is not an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.item_type == "attachment"
    }
}

/// A creator of a bibliographic record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Creator {
    /// Role, e.g. `author` or `editor`
    pub creator_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Single-field name used for institutions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Creator {
    /// Build a two-field author.
    #[must_use]
    pub fn author(first_name: &str, last_name: &str) -> Self {
        Self {
            creator_type: "author".to_string(),
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            name: None,
        }
    }

    /// `"First Last"`, or the single-field name.
    #[must_use]
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.trim().to_string();
        }
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{first} {last}").trim().to_string()
    }
}

/// Join creators as `"First Last, First Last"`; `None` when there are none.
#[must_use]
pub fn format_creators(creators: &[Creator]) -> Option<String> {
    let names: Vec<String> = creators
        .iter()
        .map(Creator::display_name)
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        None
    } else {
        Some(names.join(", "))
    }
}

/// One unit of extraction work: a record and one of its PDF attachments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Key of the bibliographic record
    pub parent_key: String,
    /// Key of the PDF attachment
    pub attachment_key: String,
    pub title: String,
    pub creators: Vec<Creator>,
    pub date: Option<String>,
    pub item_type: String,
}

// ============================================================================
// Documents
// ============================================================================

/// Kind of a text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Heading,
    Paragraph,
}

/// A block of text located on one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    pub kind: BlockKind,
    pub text: String,
    /// 1-based page number
    pub page_no: u32,
}

/// A converted document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<TextBlock>,
    pub page_count: u32,
}

impl Document {
    /// True when no block carries any non-whitespace text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.text.trim().is_empty())
    }
}

/// A converted document plus the metadata of its library record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub document: Document,
    /// Key of the bibliographic record
    pub zotero_key: String,
    pub attachment_key: String,
    pub title: String,
    pub creators: Vec<Creator>,
    pub date: Option<String>,
    pub item_type: String,
    /// Validated size of the source PDF in bytes
    pub pdf_size: u64,
    #[serde(default = "Utc::now")]
    pub processed_at: DateTime<Utc>,
}

/// A bounded-size slice of a processed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: Uuid,
    pub text: String,
    /// Headings in effect for this passage, outermost first
    #[serde(default)]
    pub headings: Vec<String>,
    /// Sorted, unique 1-based page numbers
    #[serde(default)]
    pub page_numbers: Vec<u32>,
    pub zotero_key: String,
    pub title: String,
    pub creators: Vec<Creator>,
    pub date: Option<String>,
    pub item_type: String,
    pub pdf_size: u64,
}

// ============================================================================
// Chunking
// ============================================================================

/// Configuration for chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum passage size in tokens
    pub max_tokens: usize,
    /// Merge consecutive small blocks into one passage
    pub merge_peers: bool,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_tokens: 8191,
            merge_peers: true,
        }
    }
}

/// Output from a chunker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutput {
    pub content: String,
    pub headings: Vec<String>,
    /// Sorted, unique 1-based page numbers
    pub page_numbers: Vec<u32>,
}

// ============================================================================
// Outcomes
// ============================================================================

/// Result of processing one item.
#[derive(Debug, Clone)]
pub enum TaskOutcome<T> {
    Success { cached: bool, value: T, title: String },
    Failure { error: String, title: String },
}

impl<T> TaskOutcome<T> {
    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Success { title, .. } | Self::Failure { title, .. } => title,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A failed item, kept for the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub title: String,
    pub error: String,
}

/// Values of all successful outcomes plus run counters.
///
/// Exactly one counter is incremented per recorded outcome, so
/// `processed + skipped_from_cache + errored` equals the number recorded.
#[derive(Debug, Clone)]
pub struct AggregateResult<T> {
    pub items: Vec<T>,
    pub processed: usize,
    pub skipped_from_cache: usize,
    pub errored: usize,
    pub failures: Vec<TaskFailure>,
}

impl<T> Default for AggregateResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            processed: 0,
            skipped_from_cache: 0,
            errored: 0,
            failures: Vec::new(),
        }
    }
}

impl<T> AggregateResult<T> {
    /// Fold one outcome into the result.
    pub fn record(&mut self, outcome: TaskOutcome<T>) {
        match outcome {
            TaskOutcome::Success { cached, value, .. } => {
                if cached {
                    self.skipped_from_cache += 1;
                } else {
                    self.processed += 1;
                }
                self.items.push(value);
            }
            TaskOutcome::Failure { error, title } => {
                self.errored += 1;
                self.failures.push(TaskFailure { title, error });
            }
        }
    }

    /// Number of outcomes recorded.
    #[must_use]
    pub fn total(&self) -> usize {
        self.processed + self.skipped_from_cache + self.errored
    }
}

// ============================================================================
// Embedding
// ============================================================================

/// Configuration for embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Normalize embeddings to unit length
    pub normalize: bool,
    /// Batch size for processing
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            batch_size: 32,
        }
    }
}

/// Output from embedding.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    /// The embedding vector
    pub embedding: Vec<f32>,
    /// Number of tokens in input
    pub token_count: usize,
}

// ============================================================================
// Vector Records and Search
// ============================================================================

/// Metadata stored alongside each passage vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Creators joined as `"First Last, ..."`
    pub creators: Option<String>,
    pub date: Option<String>,
    pub item_type: Option<String>,
    pub page_numbers: Option<Vec<u32>>,
    pub title: Option<String>,
    pub zotero_key: Option<String>,
}

impl RecordMetadata {
    /// Metadata of a passage, with empty collections stored as `None`.
    #[must_use]
    pub fn from_passage(passage: &Passage) -> Self {
        Self {
            creators: format_creators(&passage.creators),
            date: passage.date.clone(),
            item_type: Some(passage.item_type.clone()),
            page_numbers: if passage.page_numbers.is_empty() {
                None
            } else {
                Some(passage.page_numbers.clone())
            },
            title: Some(passage.title.clone()),
            zotero_key: Some(passage.zotero_key.clone()),
        }
    }
}

/// A passage with its embedding, as stored in the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassageRecord {
    pub id: Uuid,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// A search query.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Query embedding
    pub embedding: Vec<f32>,
    /// Original query text
    pub text: Option<String>,
    /// Maximum results to return
    pub limit: usize,
    /// Distance metric
    pub metric: DistanceMetric,
}

/// Distance metric for vector search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    L2,
    Dot,
}

/// A search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: Uuid,
    pub text: String,
    pub metadata: RecordMetadata,
    /// Similarity score, higher is closer
    pub score: f32,
}

// ============================================================================
// Chat
// ============================================================================

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== LibraryItem Tests ====================

    #[test]
    fn test_library_item_deserializes_api_shape() {
        let json = r#"{
            "key": "ATT1",
            "version": 12,
            "data": {
                "key": "ATT1",
                "itemType": "attachment",
                "parentItem": "REC1",
                "contentType": "application/pdf",
                "filename": "paper.pdf",
                "linkMode": "imported_file"
            }
        }"#;
        let item: LibraryItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.key, "ATT1");
        assert!(item.data.is_pdf_attachment());
        assert_eq!(item.data.parent_item.as_deref(), Some("REC1"));
        assert!(item.data.creators.is_empty());
    }

    #[test]
    fn test_html_snapshot_is_not_pdf_attachment() {
        let data = ItemData {
            item_type: "attachment".to_string(),
            content_type: Some("text/html".to_string()),
            ..Default::default()
        };
        assert!(data.is_attachment());
        assert!(!data.is_pdf_attachment());
    }

    // ==================== Creator Tests ====================

    #[test]
    fn test_creator_display_name_two_fields() {
        assert_eq!(Creator::author("Ada", "Lovelace").display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_creator_display_name_single_field() {
        let creator: Creator =
            serde_json::from_str(r#"{"creatorType":"author","name":"CERN"}"#).unwrap();
        assert_eq!(creator.display_name(), "CERN");
    }

    #[test]
    fn test_format_creators_joins_with_comma() {
        let creators = vec![Creator::author("Ada", "Lovelace"), Creator::author("Alan", "Turing")];
        assert_eq!(
            format_creators(&creators).as_deref(),
            Some("Ada Lovelace, Alan Turing")
        );
    }

    #[test]
    fn test_format_creators_empty_is_none() {
        assert_eq!(format_creators(&[]), None);
    }

    // ==================== Document Tests ====================

    #[test]
    fn test_document_whitespace_only_is_empty() {
        let doc = Document {
            blocks: vec![TextBlock {
                kind: BlockKind::Paragraph,
                text: "  \n ".to_string(),
                page_no: 1,
            }],
            page_count: 1,
        };
        assert!(doc.is_empty());
        assert!(Document::default().is_empty());
    }

    #[test]
    fn test_block_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&BlockKind::Heading).unwrap(),
            "\"heading\""
        );
    }

    // ==================== Outcome Tests ====================

    #[test]
    fn test_aggregate_counts_one_counter_per_outcome() {
        let mut agg = AggregateResult::default();
        agg.record(TaskOutcome::Success {
            cached: false,
            value: 1,
            title: "a".to_string(),
        });
        agg.record(TaskOutcome::Success {
            cached: true,
            value: 2,
            title: "b".to_string(),
        });
        agg.record(TaskOutcome::Failure {
            error: "boom".to_string(),
            title: "c".to_string(),
        });

        assert_eq!(agg.processed, 1);
        assert_eq!(agg.skipped_from_cache, 1);
        assert_eq!(agg.errored, 1);
        assert_eq!(agg.total(), 3);
        assert_eq!(agg.items, vec![1, 2]);
        assert_eq!(agg.failures[0].title, "c");
    }

    #[test]
    fn test_outcome_title() {
        let outcome: TaskOutcome<()> = TaskOutcome::Failure {
            error: "x".to_string(),
            title: "Paper".to_string(),
        };
        assert_eq!(outcome.title(), "Paper");
        assert!(!outcome.is_success());
    }

    // ==================== Record Tests ====================

    #[test]
    fn test_record_metadata_from_passage() {
        let passage = Passage {
            id: Uuid::new_v4(),
            text: "body".to_string(),
            headings: vec![],
            page_numbers: vec![],
            zotero_key: "REC1".to_string(),
            title: "Paper".to_string(),
            creators: vec![],
            date: Some("2020".to_string()),
            item_type: "journalArticle".to_string(),
            pdf_size: 10,
        };
        let meta = RecordMetadata::from_passage(&passage);
        assert_eq!(meta.creators, None);
        assert_eq!(meta.page_numbers, None);
        assert_eq!(meta.zotero_key.as_deref(), Some("REC1"));
    }

    #[test]
    fn test_chat_role_serialization() {
        let msg = ChatMessage::user("hi");
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn test_processed_document_defaults_timestamp() {
        let json = r#"{
            "document": {"blocks": [], "page_count": 0},
            "zotero_key": "R", "attachment_key": "A", "title": "T",
            "creators": [], "date": null, "item_type": "book", "pdf_size": 1
        }"#;
        let doc: ProcessedDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.pdf_size, 1);
    }
}
