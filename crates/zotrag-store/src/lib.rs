//! Vector storage for zotrag passages.
//!
//! Implements [`VectorStore`](zotrag_core::VectorStore) over
//! [`PassageRecord`](zotrag_core::PassageRecord)s.
//!
//! | Store | Backing | Feature |
//! |-------|---------|---------|
//! | [`MemoryStore`] | brute-force cosine, optional JSON snapshot | always |
//! | `LanceStore` | `LanceDB` table `docling` | `lancedb` |
//!
//! # Example
//!
//! ```rust,ignore
//! use zotrag_store::MemoryStore;
//! use zotrag_core::VectorStore;
//!
//! let store = MemoryStore::open("data/lancedb/passages.json", 3072).await?;
//! store.init().await?;
//! store.insert(&records).await?;
//! let results = store.search(query).await?;
//! ```

pub mod memory;

#[cfg(feature = "lancedb")]
pub mod lancedb;
#[cfg(feature = "lancedb")]
pub mod schema;

pub use memory::MemoryStore;

#[cfg(feature = "lancedb")]
pub use lancedb::LanceStore;

/// Table name used by every store.
pub const TABLE_NAME: &str = "docling";
