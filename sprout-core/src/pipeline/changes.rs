//! Multi-file change pipeline: analyze, modify, review, apply

use std::path::Path;
use std::sync::Arc;

use sprout_db::models::preview;
use sprout_db::Suggestion;

use crate::git::{BranchOptions, ChangeSet, GitRepo};
use crate::model::LanguageModel;
use crate::{Error, Result};

use super::analyzer::{ImpactAnalysis, ImpactAnalyzer};
use super::modifier::ModificationSynthesizer;
use super::reviewer::{ChangeReviewer, ReviewReport};

/// Most tracked paths listed to the analyzer
pub const CODEBASE_LIMIT: usize = 200;

/// Result of generating changes for a suggestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The analyzer named no files; nothing was generated
    NoFilesIdentified { analysis: ImpactAnalysis },
    /// Every candidate file came back unchanged
    NoChanges { analysis: ImpactAnalysis },
    /// A change set was produced and reviewed
    Reviewed {
        analysis: ImpactAnalysis,
        changes: ChangeSet,
        review: ReviewReport,
    },
}

impl ChangeOutcome {
    pub fn analysis(&self) -> &ImpactAnalysis {
        match self {
            ChangeOutcome::NoFilesIdentified { analysis }
            | ChangeOutcome::NoChanges { analysis }
            | ChangeOutcome::Reviewed { analysis, .. } => analysis,
        }
    }

    /// The change set, only when the review approved it
    pub fn approved_changes(&self) -> Option<&ChangeSet> {
        match self {
            ChangeOutcome::Reviewed {
                changes, review, ..
            } if review.approved => Some(changes),
            _ => None,
        }
    }
}

/// What the apply stage left in the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedChanges {
    pub branch: String,
    pub commit: String,
    pub diff: String,
    pub files: Vec<String>,
}

/// Outcome of a full changes run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRun {
    pub outcome: ChangeOutcome,
    /// Present only when applying was requested and the review approved
    pub applied: Option<AppliedChanges>,
}

async fn read_current(root: &Path, rel: &str) -> Option<String> {
    match tokio::fs::read_to_string(root.join(rel)).await {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Some(String::new()),
        Err(e) => {
            tracing::warn!(path = rel, error = %e, "Cannot read file, leaving it out of the change set");
            None
        }
    }
}

/// Runs the analyze → modify → review stages
pub struct ChangePipeline {
    analyzer: ImpactAnalyzer,
    modifier: ModificationSynthesizer,
    reviewer: ChangeReviewer,
}

impl ChangePipeline {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            analyzer: ImpactAnalyzer::new(model.clone()),
            modifier: ModificationSynthesizer::new(model.clone()),
            reviewer: ChangeReviewer::new(model),
        }
    }

    /// Impact analysis only
    pub async fn analyze(&self, text: &str, codebase: &[String]) -> ImpactAnalysis {
        self.analyzer.analyze(text, codebase).await
    }

    /// Produce and review a change set for `text`, reading files under `root`
    ///
    /// Touches nothing on disk.
    pub async fn generate_changes(&self, text: &str, root: &Path, codebase: &[String]) -> ChangeOutcome {
        let analysis = self.analyzer.analyze(text, codebase).await;
        if !analysis.is_actionable() {
            tracing::info!(reasoning = %analysis.reasoning, "No files identified");
            return ChangeOutcome::NoFilesIdentified { analysis };
        }

        let mut changes = ChangeSet::new();
        for rel in &analysis.files_to_modify {
            let Some(current) = read_current(root, rel).await else {
                continue;
            };
            let updated = self.modifier.synthesize(text, rel, &current).await;
            if updated != current {
                changes.insert(rel.clone(), updated);
            } else {
                tracing::debug!(path = %rel, "File unchanged");
            }
        }

        if changes.is_empty() {
            tracing::info!("Modification produced no changes");
            return ChangeOutcome::NoChanges { analysis };
        }

        let review = self.reviewer.review(text, &changes).await;
        ChangeOutcome::Reviewed {
            analysis,
            changes,
            review,
        }
    }

    /// Generate changes for `suggestion` and, if asked and approved, apply them
    ///
    /// A rejected review never reaches version control.
    pub async fn run(
        &self,
        suggestion: &Suggestion,
        root: &Path,
        options: &BranchOptions,
        apply: bool,
    ) -> Result<ChangeRun> {
        let (root, codebase) = {
            let repo = GitRepo::open(root)?;
            (repo.root().to_path_buf(), repo.tracked_files(CODEBASE_LIMIT)?)
        };

        let outcome = self
            .generate_changes(&suggestion.content, &root, &codebase)
            .await;

        let applied = match (apply, outcome.approved_changes()) {
            (true, Some(changes)) => {
                let repo = GitRepo::open(&root)?.with_options(options.clone());
                Some(apply_change_set(&repo, suggestion, changes)?)
            }
            (true, None) => {
                tracing::info!(suggestion_id = suggestion.id, "Not applying: no approved changes");
                None
            }
            (false, _) => None,
        };

        Ok(ChangeRun { outcome, applied })
    }
}

/// Commit `changes` on the suggestion's branch and return to trunk
///
/// Holds the working-tree lock throughout. If anything fails after the
/// branch is checked out, uncommitted changes are discarded and trunk is
/// checked out again before the error is returned.
pub fn apply_change_set(
    repo: &GitRepo,
    suggestion: &Suggestion,
    changes: &ChangeSet,
) -> Result<AppliedChanges> {
    let _lock = repo.lock()?;
    let branch = repo.create_branch(suggestion.id, &suggestion.content)?;

    let result = (|| -> Result<AppliedChanges> {
        let files = repo.apply_changes(changes)?;
        if files.is_empty() {
            return Err(Error::Other("No files could be written".to_string()));
        }

        let diff = repo.get_diff(None)?;
        let message = format!(
            "Suggestion #{}: {}",
            suggestion.id,
            preview(&suggestion.content, 50)
        );
        let commit = repo.commit_changes(&message, &files)?;
        repo.switch_to_main()?;

        Ok(AppliedChanges {
            branch: branch.clone(),
            commit,
            diff,
            files,
        })
    })();

    match result {
        Ok(applied) => {
            tracing::info!(
                suggestion_id = suggestion.id,
                branch = %applied.branch,
                commit = %applied.commit,
                files = applied.files.len(),
                "Applied changes"
            );
            Ok(applied)
        }
        Err(e) => {
            tracing::error!(suggestion_id = suggestion.id, branch = %branch, error = %e, "Apply failed, rolling back");
            if let Err(rollback) = repo.discard_changes() {
                tracing::error!(error = %rollback, "Failed to discard changes");
            }
            if let Err(rollback) = repo.switch_to_main() {
                tracing::error!(error = %rollback, "Failed to return to trunk");
            }
            Err(e)
        }
    }
}
