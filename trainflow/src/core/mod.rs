//! Core domain model types for trainflow.
//!
//! - Stage kinds and the run state machine states
//! - Run identity

mod identity;
mod status;

pub use identity::RunIdentity;
pub use status::{PipelineState, StageKind};
