//! Parallel pipeline stages for zotrag.
//!
//! Every stage (extraction, chunking, embedding) runs the same way: the
//! [`Coordinator`] hands one input at a time to a bounded pool of workers,
//! each task consults the stage's cache, computes on a miss, and reports a
//! [`TaskOutcome`](zotrag_core::TaskOutcome) to a single aggregator.
//!
//! # Components
//!
//! - [`Coordinator`]: Bounded worker pool with per-task timeouts
//! - [`Stage`]: One step of the pipeline
//! - [`ExtractionStage`], [`ChunkingStage`], [`EmbeddingStage`]: The stages
//! - [`Pipeline`]: Stage runs that persist their artifacts
//! - [`PipelineEvent`]: Progress events
//!
//! # Example
//!
//! ```rust,ignore
//! use zotrag_pipeline::{Coordinator, CoordinatorConfig, ExtractionStage, Pipeline};
//!
//! let pipeline = Pipeline::new(layout, Coordinator::new(CoordinatorConfig::default()));
//! let mut events = pipeline.coordinator().subscribe();
//!
//! let result = pipeline.extract(Arc::new(stage), work_items).await?;
//! println!("{} processed, {} errored", result.processed, result.errored);
//! ```

pub mod coordinator;
pub mod runner;
pub mod stages;

pub use coordinator::{
    resolve_workers, Coordinator, CoordinatorConfig, PipelineEvent, Stage, DEFAULT_TASK_TIMEOUT,
};
pub use runner::Pipeline;
pub use stages::{ChunkingStage, EmbeddingStage, ExtractionStage};
