//! Passage chunking for zotrag.
//!
//! [`HybridChunker`] splits a [`Document`](zotrag_core::Document) along its
//! block structure within a token budget; [`chunk_document`] turns the output
//! into [`Passage`](zotrag_core::Passage)s that carry the record metadata.

pub mod hybrid;
pub mod passage;
pub mod split;

pub use hybrid::HybridChunker;
pub use passage::{chunk_document, to_passages};
pub use split::{estimate_tokens, split_text};
