//! Error types for zotrag.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for zotrag operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Reference library access failed
    #[error("library error: {0}")]
    Library(#[from] LibraryError),

    /// Document conversion failed
    #[error("conversion error: {0}")]
    Conversion(#[from] ConvertError),

    /// Cache operation failed
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Chunking failed
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkError),

    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),

    /// Vector store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Language model call failed
    #[error("chat error: {0}")]
    Chat(#[from] ChatError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Errors from the remote reference library.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid response: {0}")]
    Decode(String),
}

/// Structural PDF validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("empty PDF file")]
    Empty,

    #[error("invalid PDF header, file starts with: {preview}")]
    BadHeader { preview: String },

    #[error("missing %%EOF marker in PDF trailer")]
    MissingEof,

    #[error("cannot read PDF: {0}")]
    Io(#[from] std::io::Error),
}

/// Document conversion errors.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("converter returned no document")]
    Empty,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("conversion failed: {0}")]
    Failed(String),
}

/// Disk cache errors.
///
/// [`CacheError::Corrupt`] never reaches callers of `get`: corrupt entries are
/// deleted and reported as a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt cache entry {path:?}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("cannot serialize cache entry: {0}")]
    Serialize(String),
}

/// Chunking errors.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("chunking failed: {0}")]
    Failed(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Embedding errors.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("missing api key: {0}")]
    MissingApiKey(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("input too long: {tokens} tokens, max {max}")]
    InputTooLong { tokens: usize, max: usize },
}

/// Vector store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store initialization failed: {0}")]
    Init(String),

    #[error("insert failed: {0}")]
    Insert(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("delete failed: {0}")]
    Delete(String),

    #[error("schema error: {0}")]
    Schema(String),
}

/// Language model errors.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("missing api key: {0}")]
    MissingApiKey(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    Response(String),
}

/// Failure of a single pipeline task.
///
/// Task errors are contained: the coordinator turns them into a failed
/// outcome for the item and moves on.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Conversion(#[from] ConvertError),

    #[error("{0}")]
    Chunking(#[from] ChunkError),

    #[error("{0}")]
    Embedding(#[from] EmbedError),

    #[error("timed out after {0:?}")]
    TimedOut(std::time::Duration),

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Result type alias for zotrag operations.
pub type Result<T> = std::result::Result<T, Error>;
