//! Suggestion lifecycle state
//!
//! Mirrors the status column in memory so the worker can refuse an illegal
//! move before it reaches the store.

use std::fmt::Debug;

use sprout_db::SuggestionStatus;

use crate::error::{Error, Result};

/// Something that moves through a fixed set of phases
pub trait Workflow {
    type Phase: Clone + PartialEq + Debug;

    /// Phase the workflow is in now
    fn current_phase(&self) -> &Self::Phase;

    /// Whether an edge leads from the current phase to `phase`
    fn can_transition_to(&self, phase: &Self::Phase) -> bool;

    /// Move to `phase`, or fail and stay put
    fn transition_to(&mut self, phase: Self::Phase) -> Result<()>;

    /// No edge leaves the current phase
    fn is_terminal(&self) -> bool;
}

/// Lifecycle of one suggestion
///
/// Edges are exactly `SuggestionStatus::valid_transitions`:
/// `pending → processing → {completed | failed}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifecycle {
    id: i64,
    status: SuggestionStatus,
}

impl Lifecycle {
    pub fn new(id: i64, status: SuggestionStatus) -> Self {
        Self { id, status }
    }
}

impl Workflow for Lifecycle {
    type Phase = SuggestionStatus;

    fn current_phase(&self) -> &SuggestionStatus {
        &self.status
    }

    fn can_transition_to(&self, phase: &SuggestionStatus) -> bool {
        self.status.can_transition_to(phase)
    }

    fn transition_to(&mut self, phase: SuggestionStatus) -> Result<()> {
        if !self.can_transition_to(&phase) {
            return Err(Error::Other(format!(
                "Suggestion #{} cannot move from {} to {}",
                self.id, self.status, phase
            )));
        }

        tracing::debug!(suggestion_id = self.id, from = %self.status, to = %phase, "Status change");
        self.status = phase;
        Ok(())
    }

    fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
