//! Zotero Web API access for zotrag.
//!
//! - [`ZoteroClient`]: a [`LibrarySource`] backed by the Zotero Web API (v3)
//! - [`ZoteroConfig`]: library id, type and API key, usually from the environment
//! - [`join_pdf_attachments`]: pairs PDF attachments with their parent records
//!
//! [`LibrarySource`]: zotrag_core::LibrarySource

pub mod client;
pub mod config;
pub mod join;

pub use client::ZoteroClient;
pub use config::{LibraryType, ZoteroConfig};
pub use join::{join_pdf_attachments, list_work_items};
