//! Bounded worker pool that runs one [`Stage`] over a list of inputs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};
use zotrag_cache::DiskCache;
use zotrag_core::{AggregateResult, CacheKey, Error, Result, TaskError, TaskOutcome};

/// Default per-task timeout.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

/// One step of the pipeline, applied independently to each input.
#[async_trait]
pub trait Stage: Send + Sync + 'static {
    type Input: Send + Sync + 'static;
    type Output: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Short name used in logs and events.
    fn name(&self) -> &'static str;

    /// Cache consulted before [`compute`](Stage::compute), if any.
    fn cache(&self) -> Option<&DiskCache>;

    /// Cache key of an input. `None` means the input is never cached.
    fn cache_key(&self, input: &Self::Input) -> Option<CacheKey>;

    /// Human-readable label for reports.
    fn title(&self, input: &Self::Input) -> String;

    /// Do the actual work for one input.
    async fn compute(&self, input: &Self::Input) -> std::result::Result<Self::Output, TaskError>;
}

/// Progress events broadcast during a run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RunStarted {
        stage: &'static str,
        total: usize,
        workers: usize,
    },
    TaskCompleted {
        title: String,
        cached: bool,
    },
    TaskFailed {
        title: String,
        error: String,
    },
    RunFinished {
        processed: usize,
        skipped_from_cache: usize,
        errored: usize,
    },
}

/// Configuration for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Upper bound on one task's run time
    pub task_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }
}

/// Pick the worker count for `n` items.
///
/// Without a request the count is `min(available, n)`, never below one.
/// An explicit request must lie in `[1, available]`.
pub fn resolve_workers(requested: Option<usize>, available: usize, n: usize) -> Result<usize> {
    let available = available.max(1);
    match requested {
        Some(w) if w == 0 || w > available => Err(Error::Config(format!(
            "worker count must be between 1 and {available}, got {w}"
        ))),
        Some(w) => Ok(w),
        None => Ok(available.min(n).max(1)),
    }
}

/// Runs stages over a bounded pool of workers.
pub struct Coordinator {
    config: CoordinatorConfig,
    events: broadcast::Sender<PipelineEvent>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Self { config, events }
    }

    /// Subscribe to progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Run `stage` over every input and collect the outcomes.
    ///
    /// Task failures, panics and timeouts are recorded as failures. Only a
    /// fault in the pool itself returns `Err`.
    pub async fn run<S: Stage>(
        &self,
        stage: Arc<S>,
        inputs: Vec<S::Input>,
    ) -> Result<AggregateResult<S::Output>> {
        let total = inputs.len();
        let mut result = AggregateResult::default();
        if total == 0 {
            return Ok(result);
        }

        let workers = self.config.workers.clamp(1, total);
        info!(
            "Running {} over {} items with {} workers",
            stage.name(),
            total,
            workers
        );
        let _ = self.events.send(PipelineEvent::RunStarted {
            stage: stage.name(),
            total,
            workers,
        });

        let (queue_tx, queue_rx) = mpsc::channel(total);
        for input in inputs {
            queue_tx
                .send(input)
                .await
                .map_err(|_| Error::Other("work queue closed".to_string()))?;
        }
        drop(queue_tx);

        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let (done_tx, mut done_rx) = mpsc::channel(workers * 2);

        let handles: Vec<_> = (0..workers)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&stage),
                    Arc::clone(&queue_rx),
                    done_tx.clone(),
                    self.config.task_timeout,
                ))
            })
            .collect();
        drop(done_tx);

        // Single aggregator: outcomes arrive in completion order
        while let Some(outcome) = done_rx.recv().await {
            let event = match &outcome {
                TaskOutcome::Success { cached, title, .. } => PipelineEvent::TaskCompleted {
                    title: title.clone(),
                    cached: *cached,
                },
                TaskOutcome::Failure { error, title } => {
                    warn!("{title}: {error}");
                    PipelineEvent::TaskFailed {
                        title: title.clone(),
                        error: error.clone(),
                    }
                }
            };
            result.record(outcome);
            let _ = self.events.send(event);
        }

        for handle in handles {
            handle
                .await
                .map_err(|e| Error::Other(format!("worker crashed: {e}")))?;
        }

        if result.total() != total {
            return Err(Error::Other(format!(
                "{} of {total} tasks reported an outcome",
                result.total()
            )));
        }

        info!(
            "{} finished: {} processed, {} from cache, {} errored",
            stage.name(),
            result.processed,
            result.skipped_from_cache,
            result.errored
        );
        let _ = self.events.send(PipelineEvent::RunFinished {
            processed: result.processed,
            skipped_from_cache: result.skipped_from_cache,
            errored: result.errored,
        });

        Ok(result)
    }
}

async fn worker_loop<S: Stage>(
    id: usize,
    stage: Arc<S>,
    queue: Arc<Mutex<mpsc::Receiver<S::Input>>>,
    done: mpsc::Sender<TaskOutcome<S::Output>>,
    timeout: Duration,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(input) = next else {
            break;
        };

        let title = stage.title(&input);
        debug!("Worker {id} picked up {title}");

        let task_stage = Arc::clone(&stage);
        let mut handle = tokio::spawn(async move { run_task(task_stage.as_ref(), input).await });

        let outcome = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!("Task for {title} crashed: {e}");
                TaskOutcome::Failure {
                    error: TaskError::Unexpected(join_error_message(e)).to_string(),
                    title,
                }
            }
            Err(_) => {
                handle.abort();
                TaskOutcome::Failure {
                    error: TaskError::TimedOut(timeout).to_string(),
                    title,
                }
            }
        };

        if done.send(outcome).await.is_err() {
            break;
        }
    }
    debug!("Worker {id} finished");
}

/// Cache check, compute, cache write for one input.
async fn run_task<S: Stage>(stage: &S, input: S::Input) -> TaskOutcome<S::Output> {
    let title = stage.title(&input);
    let cache = stage.cache().zip(stage.cache_key(&input));

    if let Some((cache, key)) = &cache {
        if let Some(value) = cache.get(key).await {
            debug!("Cache hit for {title}");
            return TaskOutcome::Success {
                cached: true,
                value,
                title,
            };
        }
    }

    match stage.compute(&input).await {
        Ok(value) => {
            if let Some((cache, key)) = &cache {
                if let Err(e) = cache.put(key, &value).await {
                    warn!("Could not cache {title}: {e}");
                }
            }
            TaskOutcome::Success {
                cached: false,
                value,
                title,
            }
        }
        Err(e) => TaskOutcome::Failure {
            error: e.to_string(),
            title,
        },
    }
}

fn join_error_message(e: JoinError) -> String {
    if !e.is_panic() {
        return "task was cancelled".to_string();
    }
    let payload = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
