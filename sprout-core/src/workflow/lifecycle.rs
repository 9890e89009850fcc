//! Lifecycle orchestrator: the worker loop that drives pending suggestions
//!
//! Each cycle claims every `pending` suggestion, oldest first, and takes it
//! through the safety gate and code synthesis one at a time. A suggestion's
//! failure is recorded on that suggestion and never stops the cycle.

use std::sync::Arc;
use std::time::Duration;

use sprout_db::{Suggestion, SuggestionStatus};
use tokio::sync::watch;

use crate::config::WorkerConfig;
use crate::model::LanguageModel;
use crate::pipeline::{CodeSynthesizer, SafetyGate};
use crate::Result;

use super::state::{Lifecycle, Workflow};
use super::store::SuggestionStore;

/// Worker loop settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Sleep between cycles, also the retry delay after a failed query
    pub poll_interval: Duration,
    /// Record stub artifacts as `failed` instead of `completed`
    pub fail_on_stub: bool,
    /// Reclaim stale `processing` records at start-up
    pub reclaim_after: Option<Duration>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        WorkerOptions::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for WorkerOptions {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            fail_on_stub: config.fail_on_stub,
            reclaim_after: config.reclaim_after,
        }
    }
}

/// How one suggestion ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionOutcome {
    /// Artifact stored; `stub` marks the error placeholder
    Completed { stub: bool },
    /// Gate said no
    Rejected { reason: String },
    /// Stub artifact recorded as a failure (`fail_on_stub`)
    StubFailed,
    /// Unexpected error, recorded as the failure reason
    Errored { error: String },
}

/// Tally of one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub processed: usize,
    pub completed: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: &SuggestionOutcome) {
        self.processed += 1;
        match outcome {
            SuggestionOutcome::Completed { .. } => self.completed += 1,
            SuggestionOutcome::Rejected { .. } => self.rejected += 1,
            SuggestionOutcome::StubFailed | SuggestionOutcome::Errored { .. } => self.failed += 1,
        }
    }
}

/// Drives suggestions from `pending` to a terminal status
pub struct Orchestrator {
    store: Arc<dyn SuggestionStore>,
    gate: SafetyGate,
    synthesizer: CodeSynthesizer,
    options: WorkerOptions,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn SuggestionStore>,
        model: Arc<dyn LanguageModel>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            store,
            gate: SafetyGate::new(model.clone()),
            synthesizer: CodeSynthesizer::new(model),
            options,
        }
    }

    /// Run until `shutdown` becomes true
    ///
    /// Shutdown is honoured between suggestions and during the sleep; a
    /// suggestion that has been claimed always runs to a terminal status.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        if let Some(window) = self.options.reclaim_after {
            match self.store.reclaim_stale(window).await {
                Ok(ids) if !ids.is_empty() => {
                    tracing::warn!(?ids, "Returned stale suggestions to pending");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Failed to reclaim stale suggestions"),
            }
        }

        tracing::info!(
            poll_interval = ?self.options.poll_interval,
            "Worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_cycle_until(&shutdown).await {
                Ok(report) if report.processed > 0 => {
                    tracing::info!(
                        processed = report.processed,
                        completed = report.completed,
                        rejected = report.rejected,
                        failed = report.failed,
                        "Cycle finished"
                    );
                }
                Ok(_) => tracing::debug!("No pending suggestions"),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to query pending suggestions, retrying");
                }
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender also means stop
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.options.poll_interval) => {}
            }
        }

        tracing::info!("Worker stopped");
        Ok(())
    }

    /// Process every currently pending suggestion once
    ///
    /// Only a failure to list pending suggestions is returned as an error.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let (_tx, rx) = watch::channel(false);
        self.run_cycle_until(&rx).await
    }

    async fn run_cycle_until(&self, shutdown: &watch::Receiver<bool>) -> Result<CycleReport> {
        let pending = self.store.pending().await?;
        let mut report = CycleReport::default();

        for suggestion in pending {
            if *shutdown.borrow() {
                tracing::info!("Shutdown requested, leaving remaining suggestions pending");
                break;
            }
            if let Some(outcome) = self.process(suggestion).await {
                report.record(&outcome);
            }
        }

        Ok(report)
    }

    /// Claim and drive one suggestion; `None` when it could not be claimed
    pub async fn process(&self, suggestion: Suggestion) -> Option<SuggestionOutcome> {
        let id = suggestion.id;
        let mut lifecycle = Lifecycle::new(id, suggestion.status);

        if let Err(e) = lifecycle.transition_to(SuggestionStatus::Processing) {
            tracing::warn!(suggestion_id = id, error = %e, "Skipping suggestion");
            return None;
        }

        // Commit the claim before any model call
        let claimed = match self.store.claim(id).await {
            Ok(claimed) => claimed,
            Err(e) => {
                tracing::warn!(suggestion_id = id, error = %e, "Could not claim suggestion");
                return None;
            }
        };
        tracing::info!(suggestion_id = id, content = %claimed.preview(), "Processing suggestion");

        let outcome = match self.drive(&claimed).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(suggestion_id = id, error = %e, "Suggestion failed");
                if let Err(store_err) = self.store.fail(id, &format!("// Error: {}", e)).await {
                    tracing::error!(suggestion_id = id, error = %store_err, "Could not record failure");
                }
                SuggestionOutcome::Errored {
                    error: e.to_string(),
                }
            }
        };

        let terminal = match outcome {
            SuggestionOutcome::Completed { .. } => SuggestionStatus::Completed,
            _ => SuggestionStatus::Failed,
        };
        if let Err(e) = lifecycle.transition_to(terminal) {
            tracing::error!(suggestion_id = id, error = %e, "Lifecycle out of step");
        }

        Some(outcome)
    }

    async fn drive(&self, suggestion: &Suggestion) -> Result<SuggestionOutcome> {
        let id = suggestion.id;

        let verdict = self.gate.validate(&suggestion.content).await;
        if !verdict.approved {
            tracing::info!(suggestion_id = id, reason = %verdict.reason, "Suggestion rejected");
            self.store
                .fail(id, &format!("// Validation failed: {}", verdict.reason))
                .await?;
            return Ok(SuggestionOutcome::Rejected {
                reason: verdict.reason,
            });
        }

        let artifact = self.synthesizer.generate(&suggestion.content).await;

        if artifact.stub && self.options.fail_on_stub {
            tracing::warn!(suggestion_id = id, "Generation failed, recording stub as failure");
            self.store.fail(id, &artifact.source).await?;
            return Ok(SuggestionOutcome::StubFailed);
        }

        if artifact.stub {
            tracing::warn!(suggestion_id = id, "Generation failed, completing with stub artifact");
        }
        self.store.complete(id, &artifact.source).await?;
        tracing::info!(suggestion_id = id, stub = artifact.stub, "Suggestion completed");

        Ok(SuggestionOutcome::Completed {
            stub: artifact.stub,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use crate::Error;
    use async_trait::async_trait;
    use sprout_db::{Database, NewSuggestion, SuggestionRepo};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const APPROVE: &str = r#"{"approved": true, "reason": "Simple and safe"}"#;
    const TITLE: &str = "import React from 'react';\n\nconst WelcomeTitle = () => <h1 className=\"text-4xl\">Welcome</h1>;\n\nexport default WelcomeTitle;";

    async fn setup() -> (TempDir, SuggestionRepo) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("test.db")).await.unwrap();
        (dir, db.suggestions())
    }

    async fn submit(repo: &SuggestionRepo, text: &str) -> Suggestion {
        repo.create(&NewSuggestion::new(text).unwrap()).await.unwrap()
    }

    fn orchestrator(repo: SuggestionRepo, model: Arc<ScriptedModel>, fail_on_stub: bool) -> Orchestrator {
        Orchestrator::new(
            Arc::new(repo),
            model,
            WorkerOptions {
                fail_on_stub,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_welcome_title_scenario() {
        let (_dir, repo) = setup().await;
        let s = submit(&repo, "Add a welcome title").await;
        let model = Arc::new(ScriptedModel::new().reply(APPROVE).reply(TITLE));

        let report = orchestrator(repo.clone(), model, false)
            .run_cycle()
            .await
            .unwrap();
        assert_eq!(report.completed, 1);

        let done = repo.get(s.id).await.unwrap();
        assert_eq!(done.status, SuggestionStatus::Completed);
        assert!(done.generated_code.unwrap().contains("export default WelcomeTitle;"));
    }

    #[tokio::test]
    async fn test_rejection_is_recorded() {
        let (_dir, repo) = setup().await;
        let s = submit(&repo, "Steal cookies").await;
        let model = Arc::new(
            ScriptedModel::new().reply(r#"{"approved": false, "reason": "Malicious"}"#),
        );

        let report = orchestrator(repo.clone(), model.clone(), false)
            .run_cycle()
            .await
            .unwrap();
        assert_eq!(report.rejected, 1);
        // Synthesizer never called
        assert_eq!(model.calls(), 1);

        let failed = repo.get(s.id).await.unwrap();
        assert_eq!(failed.status, SuggestionStatus::Failed);
        assert_eq!(
            failed.generated_code.as_deref(),
            Some("// Validation failed: Malicious")
        );
    }

    #[tokio::test]
    async fn test_gate_error_fails_closed() {
        let (_dir, repo) = setup().await;
        let s = submit(&repo, "Add a footer").await;
        let model = Arc::new(ScriptedModel::new().fail("network down"));

        orchestrator(repo.clone(), model, false)
            .run_cycle()
            .await
            .unwrap();

        let failed = repo.get(s.id).await.unwrap();
        assert_eq!(failed.status, SuggestionStatus::Failed);
        assert!(failed
            .generated_code
            .unwrap()
            .starts_with("// Validation failed: Validation error"));
    }

    #[tokio::test]
    async fn test_stub_completes_by_default() {
        let (_dir, repo) = setup().await;
        let s = submit(&repo, "Add a footer").await;
        let model = Arc::new(ScriptedModel::new().reply(APPROVE).fail("quota"));

        let report = orchestrator(repo.clone(), model, false)
            .run_cycle()
            .await
            .unwrap();
        assert_eq!(report.completed, 1);

        let done = repo.get(s.id).await.unwrap();
        assert_eq!(done.status, SuggestionStatus::Completed);
        assert!(done
            .generated_code
            .unwrap()
            .contains("export default ErrorComponent;"));
    }

    #[tokio::test]
    async fn test_stub_fails_when_configured() {
        let (_dir, repo) = setup().await;
        let s = submit(&repo, "Add a footer").await;
        let model = Arc::new(ScriptedModel::new().reply(APPROVE).fail("quota"));

        let report = orchestrator(repo.clone(), model, true)
            .run_cycle()
            .await
            .unwrap();
        assert_eq!(report.failed, 1);

        let failed = repo.get(s.id).await.unwrap();
        assert_eq!(failed.status, SuggestionStatus::Failed);
        assert!(failed.generated_code.unwrap().contains("quota"));
    }

    #[tokio::test]
    async fn test_processes_oldest_first() {
        let (_dir, repo) = setup().await;
        let first = submit(&repo, "First").await;
        let second = submit(&repo, "Second").await;
        let model = Arc::new(
            ScriptedModel::new()
                .reply(APPROVE)
                .reply(TITLE)
                .reply(APPROVE)
                .reply(TITLE),
        );

        orchestrator(repo.clone(), model.clone(), false)
            .run_cycle()
            .await
            .unwrap();

        let prompts: Vec<String> = model.requests().into_iter().map(|r| r.prompt).collect();
        assert!(prompts[0].contains("\"First\""));
        assert!(prompts[2].contains("\"Second\""));
        assert_eq!(repo.get(first.id).await.unwrap().status, SuggestionStatus::Completed);
        assert_eq!(repo.get(second.id).await.unwrap().status, SuggestionStatus::Completed);
    }

    #[tokio::test]
    async fn test_processing_records_are_not_resumed() {
        let (_dir, repo) = setup().await;
        let s = submit(&repo, "Orphan").await;
        repo.claim(s.id).await.unwrap();
        let model = Arc::new(ScriptedModel::new());

        let report = orchestrator(repo.clone(), model.clone(), false)
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.processed, 0);
        assert_eq!(model.calls(), 0);
        assert_eq!(repo.get(s.id).await.unwrap().status, SuggestionStatus::Processing);
    }

    #[tokio::test]
    async fn test_oversized_submission_never_reaches_worker() {
        let (_dir, repo) = setup().await;
        assert!(NewSuggestion::new("x".repeat(501)).is_err());
        let model = Arc::new(ScriptedModel::new());

        let report = orchestrator(repo.clone(), model.clone(), false)
            .run_cycle()
            .await
            .unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(model.calls(), 0);
        assert!(repo.list().await.unwrap().is_empty());
    }

    /// Store whose `complete` fails for one id
    struct FlakyStore {
        inner: SuggestionRepo,
        broken_id: i64,
    }

    #[async_trait]
    impl SuggestionStore for FlakyStore {
        async fn pending(&self) -> Result<Vec<Suggestion>> {
            SuggestionStore::pending(&self.inner).await
        }
        async fn claim(&self, id: i64) -> Result<Suggestion> {
            SuggestionStore::claim(&self.inner, id).await
        }
        async fn complete(&self, id: i64, code: &str) -> Result<Suggestion> {
            if id == self.broken_id {
                return Err(Error::Other("disk full".to_string()));
            }
            SuggestionStore::complete(&self.inner, id, code).await
        }
        async fn fail(&self, id: i64, reason: &str) -> Result<Suggestion> {
            SuggestionStore::fail(&self.inner, id, reason).await
        }
        async fn reclaim_stale(&self, older_than: Duration) -> Result<Vec<i64>> {
            SuggestionStore::reclaim_stale(&self.inner, older_than).await
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_cycle() {
        let (_dir, repo) = setup().await;
        let broken = submit(&repo, "Broken").await;
        let fine = submit(&repo, "Fine").await;
        let model = Arc::new(
            ScriptedModel::new()
                .reply(APPROVE)
                .reply(TITLE)
                .reply(APPROVE)
                .reply(TITLE),
        );

        let store = FlakyStore {
            inner: repo.clone(),
            broken_id: broken.id,
        };
        let report = Orchestrator::new(Arc::new(store), model, WorkerOptions::default())
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.processed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 1);

        let broken = repo.get(broken.id).await.unwrap();
        assert_eq!(broken.status, SuggestionStatus::Failed);
        assert_eq!(broken.generated_code.as_deref(), Some("// Error: disk full"));
        assert_eq!(repo.get(fine.id).await.unwrap().status, SuggestionStatus::Completed);
    }

    /// Store that cannot list pending work
    #[derive(Default)]
    struct DownStore {
        queries: AtomicUsize,
    }

    #[async_trait]
    impl SuggestionStore for DownStore {
        async fn pending(&self) -> Result<Vec<Suggestion>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Err(Error::Other("database locked".to_string()))
        }
        async fn claim(&self, _id: i64) -> Result<Suggestion> {
            unreachable!()
        }
        async fn complete(&self, _id: i64, _code: &str) -> Result<Suggestion> {
            unreachable!()
        }
        async fn fail(&self, _id: i64, _reason: &str) -> Result<Suggestion> {
            unreachable!()
        }
        async fn reclaim_stale(&self, _older_than: Duration) -> Result<Vec<i64>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_query_failure_is_retried() {
        let store = Arc::new(DownStore::default());
        let orchestrator = Orchestrator::new(
            store.clone(),
            Arc::new(ScriptedModel::new()),
            WorkerOptions {
                poll_interval: Duration::from_millis(10),
                ..Default::default()
            },
        );

        assert!(orchestrator.run_cycle().await.is_err());

        let (tx, rx) = watch::channel(false);
        let stopper = async {
            tokio::time::sleep(Duration::from_millis(60)).await;
            tx.send(true).unwrap();
        };
        let (result, ()) = tokio::join!(orchestrator.run(rx), stopper);

        assert!(result.is_ok());
        // One direct call plus several loop retries
        assert!(store.queries.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_run_reclaims_then_processes() {
        let (_dir, repo) = setup().await;
        let s = submit(&repo, "Add a welcome title").await;
        repo.claim(s.id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let model = Arc::new(ScriptedModel::new().reply(APPROVE).reply(TITLE));

        let orchestrator = Orchestrator::new(
            Arc::new(repo.clone()),
            model,
            WorkerOptions {
                poll_interval: Duration::from_secs(60),
                reclaim_after: Some(Duration::ZERO),
                ..Default::default()
            },
        );

        let (tx, rx) = watch::channel(false);
        let stopper = async {
            // Wait for the first cycle to finish the suggestion
            loop {
                if repo.get(s.id).await.unwrap().status == SuggestionStatus::Completed {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            tx.send(true).unwrap();
        };
        let (result, ()) = tokio::join!(orchestrator.run(rx), stopper);

        assert!(result.is_ok());
        assert_eq!(repo.get(s.id).await.unwrap().status, SuggestionStatus::Completed);
    }

    #[tokio::test]
    async fn test_run_stops_immediately_when_already_shut_down() {
        let (_dir, repo) = setup().await;
        submit(&repo, "Untouched").await;
        let model = Arc::new(ScriptedModel::new());

        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        orchestrator(repo.clone(), model.clone(), false)
            .run(rx)
            .await
            .unwrap();

        assert_eq!(model.calls(), 0);
        assert_eq!(repo.pending().await.unwrap().len(), 1);
    }
}
