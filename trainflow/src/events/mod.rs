//! Lifecycle events emitted by the orchestrator.
//!
//! Sinks are injected into the pipeline; there is no process-wide sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A run started.
pub const PIPELINE_STARTED: &str = "pipeline.started";
/// A run finished with a pushed or skipped outcome.
pub const PIPELINE_COMPLETED: &str = "pipeline.completed";
/// A run halted.
pub const PIPELINE_FAILED: &str = "pipeline.failed";
/// A stage began executing.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage produced its artifact.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// A stage failed.
pub const STAGE_FAILED: &str = "stage.failed";
/// The candidate model was not accepted; publishing is skipped.
pub const MODEL_REJECTED: &str = "model.rejected";
