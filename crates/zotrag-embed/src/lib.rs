//! # zotrag-embed
//!
//! Embedding generation for zotrag.
//!
//! ## Models
//!
//! | Property | [`OpenAiEmbedder`] | [`HashEmbedder`] |
//! |----------|--------------------|------------------|
//! | Model | `text-embedding-3-large` | blake3 bag of words |
//! | Dimension | 3072 | 384 (configurable) |
//! | Max tokens | 8191 | 8191 |
//! | Network | yes, `OPENAI_API_KEY` | no |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zotrag_embed::{EmbedderPool, OpenAiEmbedder};
//! use zotrag_core::EmbeddingConfig;
//! use std::sync::Arc;
//!
//! let embedder = OpenAiEmbedder::from_env("text-embedding-3-large", 3072)?;
//! let pool = EmbedderPool::new(Arc::new(embedder), 4);
//!
//! let texts = vec!["Hello world", "Machine learning"];
//! let embeddings = pool.embed_batch(&texts, &EmbeddingConfig::default()).await?;
//! ```
//!
//! ## Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`OpenAiEmbedder`] | OpenAI embeddings API client |
//! | [`HashEmbedder`] | Offline deterministic embedder |
//! | [`EmbedderPool`] | Concurrent embedding with semaphore limiting |

pub mod hash;
pub mod openai;
pub mod pool;

pub use hash::HashEmbedder;
pub use openai::OpenAiEmbedder;
pub use pool::EmbedderPool;
