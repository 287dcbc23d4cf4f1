//! Per-stage execution records.

use serde::{Deserialize, Serialize};

use crate::core::{PipelineState, StageKind};
use crate::errors::{error_chain, ErrorCategory, StageError};
use crate::utils::iso_timestamp;

/// How a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// The stage produced its artifact.
    Completed,
    /// The stage failed and the run halted.
    Failed,
}

/// Timing and status of one executed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// Stage that ran.
    pub stage: StageKind,
    /// Outcome.
    pub status: StageStatus,
    /// Wall-clock duration.
    pub duration_ms: f64,
    /// The produced artifact, serialized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<serde_json::Value>,
}

/// Why a run halted, captured for reports and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stage that failed.
    pub stage: StageKind,
    /// State the run was in.
    pub state: PipelineState,
    /// Coarse category of the root cause.
    pub category: ErrorCategory,
    /// Top-level error message.
    pub error: String,
    /// The error followed by every source, outermost first.
    pub chain: Vec<String>,
    /// When the failure was recorded (ISO 8601).
    pub timestamp: String,
    /// Time spent in the stage before it failed.
    pub duration_ms: f64,
}

impl FailureRecord {
    /// Captures a stage error.
    #[must_use]
    pub fn from_stage_error(err: &StageError, state: PipelineState, duration_ms: f64) -> Self {
        Self {
            stage: err.kind(),
            state,
            category: err.cause().category(),
            error: err.to_string(),
            chain: error_chain(err),
            timestamp: iso_timestamp(),
            duration_ms,
        }
    }

    /// The innermost message, usually the most specific.
    #[must_use]
    pub fn root_cause(&self) -> &str {
        self.chain.last().map_or(self.error.as_str(), String::as_str)
    }
}
