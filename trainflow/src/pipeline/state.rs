//! The run state machine.

use serde::Serialize;

use crate::core::PipelineState;
use crate::errors::PipelineError;

/// Tracks the current state of a run and refuses out-of-order moves.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStateMachine {
    current: PipelineState,
    history: Vec<PipelineState>,
}

impl PipelineStateMachine {
    /// Starts in [`PipelineState::Pending`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state.
    #[must_use]
    pub fn current(&self) -> PipelineState {
        self.current
    }

    /// States entered so far, in order, excluding `Pending`.
    #[must_use]
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Moves to `next` if it is a legal successor of the current state.
    pub fn advance(&mut self, next: PipelineState) -> Result<(), PipelineError> {
        if !self.current.can_advance_to(next) {
            return Err(PipelineError::IllegalTransition {
                from: self.current,
                to: next,
            });
        }
        tracing::debug!(from = %self.current, to = %next, "State transition");
        self.current = next;
        self.history.push(next);
        Ok(())
    }
}
