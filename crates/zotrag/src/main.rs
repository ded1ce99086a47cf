//! # zotrag CLI
//!
//! Turns the PDFs of a Zotero library into a searchable vector store and
//! answers questions about them.
//!
//! ## Commands
//!
//! - `zotrag extract` - Download and convert every PDF attachment
//! - `zotrag chunk` - Split the extracted documents into passages
//! - `zotrag embed` - Embed the passages into the vector store
//! - `zotrag search <QUERY>` - Semantic search over the passages
//! - `zotrag chat` - Ask questions answered from the library
//!
//! ## Examples
//!
//! ```bash
//! # Full pipeline with 8 workers
//! zotrag extract --workers 8
//! zotrag chunk --existing reprocess
//! zotrag embed
//!
//! # Passages by one author, as JSON
//! zotrag search "Smith" --by-author --format json
//! ```
//!
//! Credentials are read from the environment or a `.env` file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use zotrag_cache::DataLayout;
use zotrag_chunker::HybridChunker;
use zotrag_core::{
    AggregateResult, ChunkConfig, DocumentExport, Embedder, EmbeddingConfig, LibrarySource,
    SearchResult, TaskFailure, VectorStore,
};
use zotrag_embed::{EmbedderPool, HashEmbedder, OpenAiEmbedder};
use zotrag_extract::{AttachmentFetcher, PdfConverter};
use zotrag_pipeline::{
    resolve_workers, ChunkingStage, Coordinator, CoordinatorConfig, EmbeddingStage,
    ExtractionStage, Pipeline, PipelineEvent,
};
use zotrag_query::{format_source, ChatSession, OpenAiChat, QueryExecutor, DEFAULT_LIMIT};
#[cfg(feature = "lancedb")]
use zotrag_store::LanceStore;
use zotrag_store::MemoryStore;
use zotrag_zotero::{list_work_items, ZoteroClient, ZoteroConfig};

mod config;

use config::{Config, EmbeddingProvider, StoreBackend};

/// Characters of markdown shown after extraction.
const PREVIEW_CHARS: usize = 500;

#[derive(Parser)]
#[command(name = "zotrag")]
#[command(about = "Retrieval-augmented search and chat over a Zotero library")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/zotrag/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides ZOTRAG_DATA_DIR and the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// What to do when a stage's output already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum ExistingMode {
    /// Prompt on stdin
    #[default]
    Ask,
    /// Keep the existing output
    Reuse,
    /// Run the stage again (cached items are not recomputed)
    Reprocess,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, validate and convert every PDF attachment
    Extract {
        /// Number of workers (default: all CPUs, capped at the item count)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Behaviour when documents were already extracted
        #[arg(long, value_enum, default_value = "ask")]
        existing: ExistingMode,
    },

    /// Split extracted documents into passages
    Chunk {
        /// Number of workers (default: all CPUs, capped at the item count)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Behaviour when passages already exist
        #[arg(long, value_enum, default_value = "ask")]
        existing: ExistingMode,
    },

    /// Embed passages into the vector store
    Embed {
        /// Number of workers (default: all CPUs, capped at the batch count)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Behaviour when the store already holds vectors
        #[arg(long, value_enum, default_value = "ask")]
        existing: ExistingMode,
    },

    /// Search the embedded passages
    Search {
        /// Query string, or an author name with --by-author
        query: String,

        /// Maximum results
        #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,

        /// Only return passages whose creators contain the query
        #[arg(long)]
        by_author: bool,
    },

    /// Interactive question answering over the library
    Chat,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print sample configuration file
    Init,
    /// Show config file path
    Path,
}

/// Output structure for a stage run.
#[derive(Serialize)]
struct RunSummary<'a> {
    stage: &'a str,
    processed: usize,
    skipped_from_cache: usize,
    errored: usize,
    total: usize,
    workers: usize,
    failures: &'a [TaskFailure],
}

/// Output structure for search results.
#[derive(Serialize)]
struct SearchOutput {
    query: String,
    results: Vec<ResultItem>,
}

#[derive(Serialize)]
struct ResultItem {
    score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    creators: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    item_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_numbers: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zotero_key: Option<String>,
    text: String,
}

impl From<&SearchResult> for ResultItem {
    fn from(r: &SearchResult) -> Self {
        Self {
            score: r.score,
            title: r.metadata.title.clone(),
            creators: r.metadata.creators.clone(),
            date: r.metadata.date.clone(),
            item_type: r.metadata.item_type.clone(),
            page_numbers: r.metadata.page_numbers.clone(),
            zotero_key: r.metadata.zotero_key.clone(),
            text: truncate(&r.text, 300),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine; the variables may already be set.
    dotenvy::dotenv().ok();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    // Load config from file or CLI-specified path
    let config = if let Some(ref path) = cli.config {
        Config::load_from(Some(path.clone()))
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        Config::load().context("Failed to load config")?
    };

    let layout = DataLayout::new(config.data_dir(cli.data_dir.clone()));

    match cli.command {
        Commands::Extract { workers, existing } => {
            let documents_file = layout.documents_file();
            if documents_file.exists() && reuse_existing(existing, "extracted documents")? {
                let count = load_pipeline(&layout)
                    .load_documents()
                    .await?
                    .map_or(0, |d| d.len());
                println!("Using {count} existing documents from {}", documents_file.display());
                return Ok(());
            }

            let source: Arc<dyn LibrarySource> = Arc::new(zotero_client(&config)?);
            let items = list_work_items(source.as_ref())
                .await
                .context("Failed to list library items")?;
            info!("Found {} PDF attachments", items.len());

            let workers = pick_workers(workers, &config, items.len())?;
            let pipeline = build_pipeline(&layout, &config, workers);
            let progress = spawn_progress(pipeline.coordinator().subscribe());

            let stage = Arc::new(ExtractionStage::new(
                AttachmentFetcher::new(source),
                Arc::new(PdfConverter::new()),
                layout.document_cache(),
            ));
            let result = pipeline.extract(stage, items).await?;

            finish_progress(pipeline, progress).await;
            print_summary(cli.format, "extract", &result, workers)?;
            if let (OutputFormat::Text, Some(first)) = (cli.format, result.items.first()) {
                println!("\nPreview of {}:\n", first.title);
                println!("{}", preview(&first.to_markdown(), PREVIEW_CHARS));
            }
        }

        Commands::Chunk { workers, existing } => {
            let chunks_file = layout.chunks_file();
            if chunks_file.exists() && reuse_existing(existing, "passages")? {
                let count = load_pipeline(&layout)
                    .load_passages()
                    .await?
                    .map_or(0, |p| p.len());
                println!("Using {count} existing passages from {}", chunks_file.display());
                return Ok(());
            }

            let Some(documents) = load_pipeline(&layout).load_documents().await? else {
                anyhow::bail!(
                    "No extracted documents at {}. Run 'zotrag extract' first.",
                    layout.documents_file().display()
                );
            };

            let workers = pick_workers(workers, &config, documents.len())?;
            let pipeline = build_pipeline(&layout, &config, workers);
            let progress = spawn_progress(pipeline.coordinator().subscribe());

            let chunk_config = ChunkConfig {
                max_tokens: config.chunking.max_tokens,
                merge_peers: config.chunking.merge_peers,
            };
            let stage = Arc::new(ChunkingStage::new(
                Arc::new(HybridChunker::new()),
                chunk_config,
                layout.chunk_cache(),
            ));
            let (result, passages) = pipeline.chunk(stage, documents).await?;

            finish_progress(pipeline, progress).await;
            print_summary(cli.format, "chunk", &result, workers)?;
            if matches!(cli.format, OutputFormat::Text) {
                println!("  Passages:            {}", passages.len());
            }
        }

        Commands::Embed { workers, existing } => {
            let Some(passages) = load_pipeline(&layout).load_passages().await? else {
                anyhow::bail!(
                    "No passages at {}. Run 'zotrag chunk' first.",
                    layout.chunks_file().display()
                );
            };

            let embedder = build_embedder(&config)?;
            let store = open_store(&config, &layout, embedder.dimension()).await?;
            store.init().await.context("Failed to initialize store")?;

            let stored = store.count().await?;
            if stored > 0 && reuse_existing(existing, "vectors")? {
                println!("Using {stored} existing vectors in {}", layout.vector_dir().display());
                return Ok(());
            }

            let embed_config = EmbeddingConfig {
                normalize: true,
                batch_size: config.embedding.batch_size,
            };
            let batch_count = passages.len().div_ceil(embed_config.batch_size.max(1));
            let workers = pick_workers(workers, &config, batch_count)?;
            let pipeline = build_pipeline(&layout, &config, workers);
            let progress = spawn_progress(pipeline.coordinator().subscribe());

            let pool = Arc::new(EmbedderPool::new(embedder, config.embedding.max_concurrent));
            let stage = Arc::new(EmbeddingStage::new(pool, embed_config));
            let result = pipeline.embed(stage, passages, store.as_ref()).await?;

            finish_progress(pipeline, progress).await;
            print_summary(cli.format, "embed", &result, workers)?;
            if matches!(cli.format, OutputFormat::Text) {
                println!("  Vectors stored:      {}", store.count().await?);
            }
        }

        Commands::Search {
            query,
            limit,
            by_author,
        } => {
            let executor = query_executor(&config, &layout).await?;

            let results = if by_author {
                executor.search_by_author(&query, limit).await
            } else {
                executor.search(&query, limit).await
            }
            .context("Search failed")?;

            match cli.format {
                OutputFormat::Json => {
                    let output = SearchOutput {
                        query: query.clone(),
                        results: results.iter().map(ResultItem::from).collect(),
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => print_results(&query, &results),
            }
        }

        Commands::Chat => {
            let executor = Arc::new(query_executor(&config, &layout).await?);
            let model = OpenAiChat::from_env(&config.chat.model)
                .context("Failed to create chat model")?
                .with_temperature(config.chat.temperature);
            let mut session = ChatSession::new(executor, Arc::new(model))
                .with_context_limit(config.chat.context_limit);

            println!("Ask about your library. Type 'exit' or 'quit' to leave.\n");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                print!("> ");
                std::io::stdout().flush()?;

                let Some(line) = lines.next_line().await? else {
                    break;
                };
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                if matches!(question.to_lowercase().as_str(), "exit" | "quit") {
                    break;
                }

                match session.ask(question).await {
                    Ok(answer) => {
                        println!("\n{}\n", answer.text);
                        if !answer.sources.is_empty() {
                            println!("Sources:");
                            for source in &answer.sources {
                                println!("  - {}", format_source(&source.metadata));
                            }
                            println!();
                        }
                    }
                    Err(e) => eprintln!("Error: {e}\n"),
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&config)
                            .context("Failed to serialize config")?
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "{}",
                        toml::to_string_pretty(&config).context("Failed to serialize config")?
                    );
                }
            },
            ConfigAction::Init => {
                println!("{}", Config::sample_toml());
            }
            ConfigAction::Path => {
                if let Some(path) = Config::config_path() {
                    println!("{}", path.display());
                } else {
                    println!("Could not determine config directory");
                }
            }
        },
    }

    Ok(())
}

/// Zotero client from the environment plus the `[zotero]` section.
fn zotero_client(config: &Config) -> Result<ZoteroClient> {
    let mut zotero = ZoteroConfig::from_env().context("Failed to read Zotero credentials")?;
    zotero.base_url.clone_from(&config.zotero.base_url);
    zotero.page_size = config.zotero.page_size;
    zotero.timeout_secs = config.zotero.timeout_secs;
    ZoteroClient::new(zotero).context("Failed to create Zotero client")
}

fn pick_workers(requested: Option<usize>, config: &Config, n: usize) -> Result<usize> {
    let workers = resolve_workers(requested.or(config.pipeline.workers), num_cpus::get(), n)?;
    info!("Using {} workers for {} items", workers, n);
    Ok(workers)
}

fn build_pipeline(layout: &DataLayout, config: &Config, workers: usize) -> Pipeline {
    let coordinator = Coordinator::new(CoordinatorConfig {
        workers,
        task_timeout: Duration::from_secs(config.pipeline.task_timeout_secs),
    });
    Pipeline::new(layout.clone(), coordinator)
}

/// Pipeline used only to read artifacts.
fn load_pipeline(layout: &DataLayout) -> Pipeline {
    Pipeline::new(layout.clone(), Coordinator::new(CoordinatorConfig::default()))
}

fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let embedding = &config.embedding;
    let embedder: Arc<dyn Embedder> = match embedding.provider {
        EmbeddingProvider::OpenAi => Arc::new(
            OpenAiEmbedder::from_env(&embedding.model, embedding.dimension)
                .context("Failed to create OpenAI embedder")?,
        ),
        EmbeddingProvider::Hash => Arc::new(HashEmbedder::with_dimension(embedding.dimension)),
    };
    Ok(embedder)
}

async fn open_store(
    config: &Config,
    layout: &DataLayout,
    dimension: usize,
) -> Result<Arc<dyn VectorStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            let path = layout.vector_dir().join(zotrag_store::memory::SNAPSHOT_FILE);
            let store = MemoryStore::open(&path, dimension)
                .await
                .with_context(|| format!("Failed to open store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
        #[cfg(feature = "lancedb")]
        StoreBackend::Lancedb => Ok(Arc::new(LanceStore::new(layout.vector_dir(), dimension))),
        #[cfg(not(feature = "lancedb"))]
        StoreBackend::Lancedb => {
            anyhow::bail!("The lancedb backend needs zotrag built with --features lancedb")
        }
    }
}

async fn query_executor(config: &Config, layout: &DataLayout) -> Result<QueryExecutor> {
    let embedder = build_embedder(config)?;
    let store = open_store(config, layout, embedder.dimension()).await?;
    store.init().await.context("Failed to initialize store")?;

    if store.count().await? == 0 {
        anyhow::bail!(
            "The vector store in {} is empty. Run 'zotrag embed' first.",
            layout.vector_dir().display()
        );
    }
    Ok(QueryExecutor::new(store, embedder))
}

/// Decide whether to keep a stage's existing output.
fn reuse_existing(mode: ExistingMode, what: &str) -> Result<bool> {
    match mode {
        ExistingMode::Reuse => Ok(true),
        ExistingMode::Reprocess => Ok(false),
        ExistingMode::Ask => {
            println!("Found existing {what}.");
            println!("  1. Use existing");
            println!("  2. Reprocess (cache-assisted)");
            print!("Choice [1]: ");
            std::io::stdout().flush()?;

            let mut answer = String::new();
            std::io::stdin()
                .read_line(&mut answer)
                .context("Failed to read choice")?;
            match answer.trim() {
                "" | "1" => Ok(true),
                "2" => Ok(false),
                other => anyhow::bail!("Invalid choice '{other}', expected 1 or 2"),
            }
        }
    }
}

/// Log per-item progress until the coordinator is dropped.
fn spawn_progress(mut events: broadcast::Receiver<PipelineEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(PipelineEvent::RunStarted {
                    stage,
                    total,
                    workers,
                }) => info!("Running {} over {} items with {} workers", stage, total, workers),
                Ok(PipelineEvent::TaskCompleted { title, cached }) => {
                    if cached {
                        info!("Loaded from cache: {}", title);
                    } else {
                        info!("Processed: {}", title);
                    }
                }
                Ok(PipelineEvent::TaskFailed { title, error }) => {
                    warn!("Failed: {}: {}", title, error);
                }
                Ok(PipelineEvent::RunFinished { .. }) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Progress reporter skipped {} events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn finish_progress(pipeline: Pipeline, progress: JoinHandle<()>) {
    drop(pipeline);
    if let Err(e) = progress.await {
        warn!("Progress reporter failed: {}", e);
    }
}

fn print_summary<T>(
    format: OutputFormat,
    stage: &str,
    result: &AggregateResult<T>,
    workers: usize,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let summary = RunSummary {
                stage,
                processed: result.processed,
                skipped_from_cache: result.skipped_from_cache,
                errored: result.errored,
                total: result.total(),
                workers,
                failures: &result.failures,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => {
            println!("\nFinished {stage}");
            println!("  Processed:           {}", result.processed);
            println!("  Loaded from cache:   {}", result.skipped_from_cache);
            println!("  Errors:              {}", result.errored);
            println!("  Total:               {}", result.total());
            println!("  Workers:             {workers}");
            if !result.failures.is_empty() {
                println!("\nFailures:");
                for failure in &result.failures {
                    println!("  - {}: {}", failure.title, failure.error);
                }
            }
        }
    }
    Ok(())
}

fn print_results(query: &str, results: &[SearchResult]) {
    println!("Query: {query}\n");
    if results.is_empty() {
        println!("No results found.");
        return;
    }

    for (i, result) in results.iter().enumerate() {
        let meta = &result.metadata;
        println!(
            "{}. {} (score: {:.3})",
            i + 1,
            meta.title.as_deref().unwrap_or("Untitled"),
            result.score
        );
        if let Some(creators) = &meta.creators {
            println!("   Creators: {creators}");
        }
        if let Some(date) = &meta.date {
            println!("   Date: {date}");
        }
        if let Some(item_type) = &meta.item_type {
            println!("   Type: {item_type}");
        }
        if let Some(pages) = &meta.page_numbers {
            let pages: Vec<String> = pages.iter().map(u32::to_string).collect();
            println!("   Pages: {}", pages.join(", "));
        }
        if let Some(key) = &meta.zotero_key {
            println!("   Zotero Key: {key}");
        }
        println!("   {}", truncate(&result.text, 300));
        println!();
    }
}

/// Truncate a string to `max_chars` characters, adding ellipsis if needed.
fn truncate(s: &str, max_chars: usize) -> String {
    let s = s.replace('\n', " ").replace('\r', "");
    if s.chars().count() <= max_chars {
        s
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// First `max_chars` characters of `text`, line breaks kept.
fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
