//! Results of a finished run.

use serde::Serialize;
use std::path::PathBuf;

use super::failure::StageRecord;
use crate::core::{PipelineState, RunIdentity};
use crate::entities::{ModelEvaluationArtifact, ModelPusherArtifact};

/// How a successful run ended.
///
/// Rejecting the candidate is a normal outcome, not an error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The candidate was accepted and published.
    Pushed {
        /// The evaluation that accepted it.
        evaluation: ModelEvaluationArtifact,
        /// Where it was published.
        pushed: ModelPusherArtifact,
    },
    /// The candidate was not better than production; nothing was published.
    SkippedNotAccepted {
        /// The evaluation that rejected it.
        evaluation: ModelEvaluationArtifact,
    },
}

impl RunOutcome {
    /// True if a model was published.
    #[must_use]
    pub fn is_pushed(&self) -> bool {
        matches!(self, Self::Pushed { .. })
    }

    /// The evaluation behind the outcome.
    #[must_use]
    pub fn evaluation(&self) -> &ModelEvaluationArtifact {
        match self {
            Self::Pushed { evaluation, .. } | Self::SkippedNotAccepted { evaluation } => evaluation,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Pipeline name.
    pub pipeline: String,
    /// Run identity.
    pub identity: RunIdentity,
    /// Artifact directory of the run.
    pub artifact_dir: PathBuf,
    /// Final state, always `Done`.
    pub final_state: PipelineState,
    /// Pushed or skipped.
    #[serde(flatten)]
    pub outcome: RunOutcome,
    /// Every stage that ran, in order.
    pub stages: Vec<StageRecord>,
}

impl RunReport {
    /// Total time spent in stages.
    #[must_use]
    pub fn total_duration_ms(&self) -> f64 {
        self.stages.iter().map(|s| s.duration_ms).sum()
    }
}
