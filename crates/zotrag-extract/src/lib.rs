//! # zotrag-extract
//!
//! Turns a library attachment into a [`Document`](zotrag_core::Document).
//!
//! ## Flow
//!
//! ```text
//! attachment key -> AttachmentFetcher -> temp .pdf -> validate_pdf -> PdfConverter -> Document
//! ```
//!
//! ## Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`AttachmentFetcher`] | Downloads an attachment into a self-deleting temp file and validates it |
//! | [`FetchedPdf`] | Guard over the temp file; the file is removed when it is dropped |
//! | [`validate_pdf`] | Structural checks: non-empty, `%PDF-` header, `%%EOF` trailer |
//! | [`PdfConverter`] | [`DocumentConverter`](zotrag_core::DocumentConverter) over pdf-extract and lopdf |
//!
//! Conversion runs on the blocking thread pool. Panics inside the PDF
//! libraries surface as [`ConvertError`](zotrag_core::ConvertError).

pub mod fetch;
pub mod pdf;
pub mod validate;

pub use fetch::{AttachmentFetcher, FetchedPdf};
pub use pdf::PdfConverter;
pub use validate::validate_pdf;
