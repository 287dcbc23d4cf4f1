//! Stage kinds and pipeline states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The six stages of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Pull records from the document store and split them.
    Ingestion,
    /// Check the ingested partitions against the dataset schema.
    Validation,
    /// Encode features and persist the fitted preprocessor.
    Transformation,
    /// Fit the classifier and gate it on accuracy.
    Training,
    /// Compare the candidate against the production model.
    Evaluation,
    /// Upload the accepted model to object storage.
    Publishing,
}

impl StageKind {
    /// All stages in execution order.
    pub const ALL: [Self; 6] = [
        Self::Ingestion,
        Self::Validation,
        Self::Transformation,
        Self::Training,
        Self::Evaluation,
        Self::Publishing,
    ];

    /// The pipeline state in which this stage runs.
    #[must_use]
    pub fn state(self) -> PipelineState {
        match self {
            Self::Ingestion => PipelineState::Ingest,
            Self::Validation => PipelineState::Validate,
            Self::Transformation => PipelineState::Transform,
            Self::Training => PipelineState::Train,
            Self::Evaluation => PipelineState::Evaluate,
            Self::Publishing => PipelineState::Push,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingestion => write!(f, "ingestion"),
            Self::Validation => write!(f, "validation"),
            Self::Transformation => write!(f, "transformation"),
            Self::Training => write!(f, "training"),
            Self::Evaluation => write!(f, "evaluation"),
            Self::Publishing => write!(f, "publishing"),
        }
    }
}

/// States of the run state machine.
///
/// `Pending → Ingest → Validate → Transform → Train → Evaluate → (Push | Skip) → Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Constructed, nothing executed yet.
    #[default]
    Pending,
    /// Ingestion running.
    Ingest,
    /// Validation running.
    Validate,
    /// Transformation running.
    Transform,
    /// Training running.
    Train,
    /// Evaluation running.
    Evaluate,
    /// Publishing the accepted model.
    Push,
    /// Candidate rejected, publishing skipped.
    Skip,
    /// Run finished.
    Done,
}

impl PipelineState {
    /// States that may follow this one.
    #[must_use]
    pub fn successors(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Ingest],
            Self::Ingest => &[Self::Validate],
            Self::Validate => &[Self::Transform],
            Self::Transform => &[Self::Train],
            Self::Train => &[Self::Evaluate],
            Self::Evaluate => &[Self::Push, Self::Skip],
            Self::Push | Self::Skip => &[Self::Done],
            Self::Done => &[],
        }
    }

    /// Returns true if `next` may follow this state.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        self.successors().contains(&next)
    }

    /// Returns true if the state is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Ingest => "ingest",
            Self::Validate => "validate",
            Self::Transform => "transform",
            Self::Train => "train",
            Self::Evaluate => "evaluate",
            Self::Push => "push",
            Self::Skip => "skip",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}
