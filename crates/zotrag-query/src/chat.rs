//! Question answering over the library.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zotrag_core::{ChatError, ChatMessage, ChatModel, Error, SearchResult};

use crate::context::format_context;
use crate::executor::{QueryExecutor, DEFAULT_LIMIT};

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// System prompt carrying the retrieved context.
#[must_use]
pub fn system_prompt(context: &str) -> String {
    format!(
        "You are a helpful assistant that answers questions based on documents from a Zotero library.\n\
         Use only the information from the provided context to answer questions. When citing information,\n\
         reference the source document (title, authors, date) when available. If you're unsure or the context\n\
         doesn't contain the relevant information, say so clearly.\n\
         \n\
         Context from Zotero library:\n\
         {context}\n"
    )
}

/// Chat model backed by `POST /v1/chat/completions`.
pub struct OpenAiChat {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiChat {
    /// `gpt-4o-mini` at temperature 0.7.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ChatError> {
        Self::with_model(api_key, DEFAULT_CHAT_MODEL)
    }

    pub fn with_model(api_key: impl Into<String>, model: &str) -> Result<Self, ChatError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ChatError::MissingApiKey(format!("{ENV_API_KEY} is not set")));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ChatError::Request(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Read the key from `OPENAI_API_KEY`.
    pub fn from_env(model: &str) -> Result<Self, ChatError> {
        let key = std::env::var(ENV_API_KEY).unwrap_or_default();
        Self::with_model(key, model)
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Point at an OpenAI-compatible server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        debug!("Sending {} messages to {}", messages.len(), self.model);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
                temperature: self.temperature,
            })
            .send()
            .await
            .map_err(|e| ChatError::Request(format!("failed to call chat API: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatError::Request(format!(
                "chat API returned {status}: {body}"
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Response(format!("failed to parse response: {e}")))?;

        first_content(parsed)
    }
}

fn first_content(response: CompletionResponse) -> Result<String, ChatError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ChatError::Response("response has no content".to_string()))
}

/// Reply of one chat turn and the passages it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SearchResult>,
}

/// A conversation that retrieves fresh context for every question.
pub struct ChatSession {
    executor: Arc<QueryExecutor>,
    model: Arc<dyn ChatModel>,
    context_limit: usize,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(executor: Arc<QueryExecutor>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            executor,
            model,
            context_limit: DEFAULT_LIMIT,
            history: Vec::new(),
        }
    }

    /// Number of passages retrieved per question.
    #[must_use]
    pub fn with_context_limit(mut self, limit: usize) -> Self {
        self.context_limit = limit.max(1);
        self
    }

    /// User and assistant turns so far.
    #[must_use]
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Ask a question. The history only grows when the model answers.
    pub async fn ask(&mut self, question: &str) -> Result<Answer, Error> {
        let sources = self.executor.search(question, self.context_limit).await?;
        let context = format_context(&sources);

        self.history.push(ChatMessage::user(question));
        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(ChatMessage::system(system_prompt(&context)));
        messages.extend(self.history.iter().cloned());

        match self.model.complete(&messages).await {
            Ok(text) => {
                self.history.push(ChatMessage::assistant(text.clone()));
                Ok(Answer { text, sources })
            }
            Err(e) => {
                self.history.pop();
                Err(e.into())
            }
        }
    }
}
