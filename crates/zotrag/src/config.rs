//! Configuration handling for zotrag.
//!
//! Settings come from an optional TOML file; credentials always come from the
//! environment (or a `.env` file).

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides the data directory.
pub const ENV_DATA_DIR: &str = "ZOTRAG_DATA_DIR";
/// Overrides the config directory.
pub const ENV_CONFIG_DIR: &str = "ZOTRAG_CONFIG_DIR";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Data directory configuration
    #[serde(default)]
    pub data: DataSection,

    /// Worker pool configuration
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Zotero API configuration
    #[serde(default)]
    pub zotero: ZoteroSection,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingSection,

    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingSection,

    /// Vector store configuration
    #[serde(default)]
    pub store: StoreSection,

    /// Chat configuration
    #[serde(default)]
    pub chat: ChatSection,
}

/// Where artifacts and caches live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSection {
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Worker count; all CPUs (capped at the item count) when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Per-task timeout in seconds
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,
}

fn default_task_timeout_secs() -> u64 {
    300
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            workers: None,
            task_timeout_secs: default_task_timeout_secs(),
        }
    }
}

/// Zotero API settings other than credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoteroSection {
    #[serde(default = "default_zotero_url")]
    pub base_url: String,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_zotero_url() -> String {
    "https://api.zotero.org".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ZoteroSection {
    fn default() -> Self {
        Self {
            base_url: default_zotero_url(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Chunking-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSection {
    /// Maximum passage size (tokens)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Merge neighbouring blocks of a section
    #[serde(default = "default_merge_peers")]
    pub merge_peers: bool,
}

fn default_max_tokens() -> usize {
    8191
}

fn default_merge_peers() -> bool {
    true
}

impl Default for ChunkingSection {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            merge_peers: default_merge_peers(),
        }
    }
}

/// Which embedder to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI embeddings API
    OpenAi,
    /// Offline blake3 bag of words
    Hash,
}

/// Embedding-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSection {
    #[serde(default = "default_provider")]
    pub provider: EmbeddingProvider,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector dimension of the model
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Passages per request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Max concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_provider() -> EmbeddingProvider {
    EmbeddingProvider::OpenAi
}

fn default_embedding_model() -> String {
    "text-embedding-3-large".to_string()
}

fn default_dimension() -> usize {
    3072
}

fn default_batch_size() -> usize {
    32
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            batch_size: default_batch_size(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// Which vector store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-memory store with a JSON snapshot
    Memory,
    /// `LanceDB` (requires the `lancedb` feature)
    Lancedb,
}

/// Vector store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

/// Chat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSection {
    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Passages retrieved per question
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_context_limit() -> usize {
    5
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            temperature: default_temperature(),
            context_limit: default_context_limit(),
        }
    }
}

impl Config {
    /// Load from the default config path, or defaults if there is no file.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load from `path`, or defaults when `path` is `None` or missing.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Default config file location.
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Data directory: CLI flag, then `ZOTRAG_DATA_DIR`, then the config file.
    pub fn data_dir(&self, cli: Option<PathBuf>) -> PathBuf {
        resolve_data_dir(cli, std::env::var(ENV_DATA_DIR).ok(), &self.data.dir)
    }

    /// A commented sample configuration.
    pub fn sample_toml() -> &'static str {
        r#"# zotrag configuration
#
# Credentials are read from the environment (or .env):
#   ZOTERO_USER_ID, ZOTERO_API_KEY, ZOTERO_LIBRARY_TYPE (user|group)
#   OPENAI_API_KEY

[data]
dir = "data"

[pipeline]
# workers = 4
task_timeout_secs = 300

[zotero]
base_url = "https://api.zotero.org"
page_size = 100
timeout_secs = 120

[chunking]
max_tokens = 8191
merge_peers = true

[embedding]
provider = "openai"   # or "hash" for offline runs
model = "text-embedding-3-large"
dimension = 3072
batch_size = 32
max_concurrent = 4

[store]
backend = "memory"    # or "lancedb"

[chat]
model = "gpt-4o-mini"
temperature = 0.7
context_limit = 5
"#
    }
}

fn resolve_data_dir(cli: Option<PathBuf>, env: Option<String>, configured: &Path) -> PathBuf {
    cli.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| configured.to_path_buf())
}

/// Get the XDG config directory for zotrag.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "zotrag").map(|dirs| dirs.config_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.data.dir, PathBuf::from("data"));
        assert_eq!(config.pipeline.workers, None);
        assert_eq!(config.pipeline.task_timeout_secs, 300);
        assert_eq!(config.chunking.max_tokens, 8191);
        assert_eq!(config.embedding.provider, EmbeddingProvider::OpenAi);
        assert_eq!(config.embedding.dimension, 3072);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.chat.model, "gpt-4o-mini");
    }

    #[test]
    fn test_sample_parses_to_defaults() {
        let config: Config = toml::from_str(Config::sample_toml()).unwrap();
        assert_eq!(config.embedding.model, "text-embedding-3-large");
        assert_eq!(config.zotero.page_size, 100);
        assert_eq!(config.chat.context_limit, 5);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [embedding]
            provider = "hash"
            dimension = 256

            [pipeline]
            workers = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.embedding.provider, EmbeddingProvider::Hash);
        assert_eq!(config.embedding.dimension, 256);
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.pipeline.workers, Some(2));
        assert_eq!(config.pipeline.task_timeout_secs, 300);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str("[store]\nbackend = \"redis\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.data.dir, PathBuf::from("data"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[data]\ndir = \"/srv/zotrag\"\n").unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.data.dir, PathBuf::from("/srv/zotrag"));
    }

    #[test]
    fn test_data_dir_precedence() {
        let configured = Path::new("data");
        assert_eq!(
            resolve_data_dir(Some("cli".into()), Some("env".into()), configured),
            PathBuf::from("cli")
        );
        assert_eq!(
            resolve_data_dir(None, Some("env".into()), configured),
            PathBuf::from("env")
        );
        assert_eq!(
            resolve_data_dir(None, Some(String::new()), configured),
            PathBuf::from("data")
        );
        assert_eq!(resolve_data_dir(None, None, configured), PathBuf::from("data"));
    }
}
