//! Human review of suggestion branches
//!
//! A reviewer picks a branch, reads its diff and ends the session with
//! exactly one action.

use std::fmt;
use std::str::FromStr;

use super::branch::SuggestionBranch;
use super::lock::WorkingTreeLock;
use super::repo::GitRepo;
use crate::{Error, Result};

/// Reviewer decision on a branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    /// Merge into trunk with a merge commit
    Approve,
    /// Return to trunk, keeping the branch for audit
    Reject,
    /// Stay on the branch for manual edits
    Edit,
    /// Return to trunk without deciding
    Quit,
}

impl FromStr for ReviewAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a" | "approve" => Ok(ReviewAction::Approve),
            "r" | "reject" => Ok(ReviewAction::Reject),
            "e" | "edit" => Ok(ReviewAction::Edit),
            "q" | "quit" => Ok(ReviewAction::Quit),
            other => Err(format!("Invalid choice '{}'", other)),
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewAction::Approve => write!(f, "approve"),
            ReviewAction::Reject => write!(f, "reject"),
            ReviewAction::Edit => write!(f, "edit"),
            ReviewAction::Quit => write!(f, "quit"),
        }
    }
}

/// Result of finishing a review session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Branch merged; carries the merge commit id
    Merged { commit: String },
    /// Back on trunk, branch left in place
    Rejected,
    /// Branch left checked out
    LeftForEditing { branch: String },
    /// Back on trunk, nothing decided
    Quit,
}

/// An open review of one suggestion branch
///
/// Holds the working-tree lock for its whole lifetime.
#[derive(Debug)]
pub struct ReviewSession<'a> {
    repo: &'a GitRepo,
    branch: SuggestionBranch,
    _lock: WorkingTreeLock,
}

impl GitRepo {
    /// Check out the branch of suggestion `id` for review
    pub fn start_review(&self, id: i64) -> Result<ReviewSession<'_>> {
        let branch = self
            .find_suggestion_branch(id)?
            .ok_or_else(|| Error::Other(format!("No branch found for suggestion #{}", id)))?;

        let lock = self.lock()?;
        self.checkout_branch(&branch.name)?;
        tracing::info!(branch = %branch.name, "Reviewing branch");

        Ok(ReviewSession {
            repo: self,
            branch,
            _lock: lock,
        })
    }
}

impl ReviewSession<'_> {
    /// Branch under review
    pub fn branch(&self) -> &SuggestionBranch {
        &self.branch
    }

    /// Changes the branch introduces relative to trunk
    pub fn diff(&self) -> Result<String> {
        self.repo.diff_against_trunk(&self.branch.name)
    }

    /// Apply the reviewer's decision, ending the session
    pub fn finish(self, action: ReviewAction) -> Result<ReviewOutcome> {
        let name = &self.branch.name;
        tracing::info!(branch = %name, %action, "Review decision");

        match action {
            ReviewAction::Approve => {
                let commit = self.repo.merge_no_ff(name)?;
                Ok(ReviewOutcome::Merged { commit })
            }
            ReviewAction::Reject => {
                self.repo.switch_to_main()?;
                Ok(ReviewOutcome::Rejected)
            }
            ReviewAction::Edit => Ok(ReviewOutcome::LeftForEditing {
                branch: name.clone(),
            }),
            ReviewAction::Quit => {
                self.repo.switch_to_main()?;
                Ok(ReviewOutcome::Quit)
            }
        }
    }
}
