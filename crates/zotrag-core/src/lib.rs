//! # zotrag-core
//!
//! Core types and traits for zotrag, a retrieval-augmented question answering
//! pipeline over a Zotero library.
//!
//! This crate provides the foundational abstractions used throughout zotrag:
//!
//! - **Library Access**: [`LibrarySource`] trait for listing items and fetching attachments
//! - **Document Conversion**: [`DocumentConverter`] trait for turning PDFs into [`Document`]s
//! - **Passage Chunking**: [`Chunker`] trait for splitting documents into passages
//! - **Embedding Generation**: [`Embedder`] trait for converting text to vector embeddings
//! - **Vector Storage**: [`VectorStore`] trait for storing and searching passages
//! - **Answering**: [`ChatModel`] trait for the language model behind `chat`
//!
//! ## Architecture
//!
//! ```text
//! LibrarySource -> WorkItem -> fetch + validate -> DocumentConverter -> ProcessedDocument
//!                                                                          |
//!                                          Chunker -> Passage -> Embedder -> VectorStore
//!                                                                               |
//!                                                        SearchQuery -> SearchResult -> ChatModel
//! ```
//!
//! Every per-item stage result is cached on disk under a [`CacheKey`].
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`WorkItem`] | One bibliographic record joined with one PDF attachment |
//! | [`CacheKey`] | Deterministic hash used to address cache files |
//! | [`ProcessedDocument`] | A converted document plus its library metadata |
//! | [`Passage`] | A bounded-size slice of a document |
//! | [`TaskOutcome`] | Success or failure of one item |
//! | [`AggregateResult`] | All successful values of a run plus counters |
//!
//! ## Related Crates
//!
//! - `zotrag-cache`: content-addressed disk cache
//! - `zotrag-zotero`: Zotero Web API client
//! - `zotrag-extract`: attachment fetching, PDF validation and conversion
//! - `zotrag-chunker`: passage splitting
//! - `zotrag-embed`: embedding generation
//! - `zotrag-store`: vector storage
//! - `zotrag-pipeline`: the parallel work coordinator and pipeline stages
//! - `zotrag-query`: search and chat

pub mod cache_key;
pub mod error;
pub mod traits;
pub mod types;

pub use cache_key::CacheKey;
pub use error::{
    CacheError, ChatError, ChunkError, ConvertError, EmbedError, Error, LibraryError, Result,
    StoreError, TaskError, ValidationError,
};
pub use traits::*;
pub use types::*;
