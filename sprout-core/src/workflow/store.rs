//! Record-store seam used by the lifecycle orchestrator

use std::time::Duration;

use async_trait::async_trait;
use sprout_db::{Suggestion, SuggestionRepo};

use crate::{Error, Result};

/// Persistence operations the orchestrator needs
///
/// Each call is atomic: it either commits fully or leaves the record as it was.
#[async_trait]
pub trait SuggestionStore: Send + Sync {
    /// All `pending` suggestions, oldest first
    async fn pending(&self) -> Result<Vec<Suggestion>>;

    /// `pending → processing`
    async fn claim(&self, id: i64) -> Result<Suggestion>;

    /// `processing → completed`, storing the artifact
    async fn complete(&self, id: i64, generated_code: &str) -> Result<Suggestion>;

    /// `processing → failed`, storing the reason in place of the artifact
    async fn fail(&self, id: i64, reason: &str) -> Result<Suggestion>;

    /// Return `processing` records idle longer than `older_than` to `pending`
    async fn reclaim_stale(&self, older_than: Duration) -> Result<Vec<i64>>;
}

#[async_trait]
impl SuggestionStore for SuggestionRepo {
    async fn pending(&self) -> Result<Vec<Suggestion>> {
        Ok(SuggestionRepo::pending(self).await?)
    }

    async fn claim(&self, id: i64) -> Result<Suggestion> {
        Ok(SuggestionRepo::claim(self, id).await?)
    }

    async fn complete(&self, id: i64, generated_code: &str) -> Result<Suggestion> {
        Ok(SuggestionRepo::complete(self, id, generated_code).await?)
    }

    async fn fail(&self, id: i64, reason: &str) -> Result<Suggestion> {
        Ok(SuggestionRepo::fail(self, id, reason).await?)
    }

    async fn reclaim_stale(&self, older_than: Duration) -> Result<Vec<i64>> {
        let lease = chrono::Duration::from_std(older_than)
            .map_err(|e| Error::Config(format!("Reclaim window out of range: {}", e)))?;
        Ok(SuggestionRepo::reclaim_stale(self, lease).await?)
    }
}
