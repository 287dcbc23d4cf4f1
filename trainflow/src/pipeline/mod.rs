//! Orchestration of the staged training run.
//!
//! [`TrainPipeline`] drives the stages through the run state machine,
//! recording timing and failures as it goes. The first stage error halts
//! the run; there is no retry and no cleanup of partial artifacts.

mod failure;
mod orchestrator;
mod outcome;
mod state;

pub use failure::{FailureRecord, StageRecord, StageStatus};
pub use orchestrator::TrainPipeline;
pub use outcome::{RunOutcome, RunReport};
pub use state::PipelineStateMachine;
