//! Search and question answering over the zotrag vector store.
//!
//! - [`QueryExecutor`]: semantic search and search by author
//! - [`format_context`]: results as cited context blocks
//! - [`ChatSession`]: multi-turn answers grounded in retrieved passages
//! - [`OpenAiChat`]: OpenAI chat completions client

pub mod chat;
pub mod context;
pub mod executor;

pub use chat::{system_prompt, Answer, ChatSession, OpenAiChat};
pub use context::{format_context, format_result, format_source};
pub use executor::{QueryExecutor, DEFAULT_LIMIT};
