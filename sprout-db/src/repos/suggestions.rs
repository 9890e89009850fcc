//! Suggestion repository: creation, queries, and guarded status changes

use chrono::{DateTime, Duration, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use crate::models::{NewSuggestion, Suggestion, SuggestionStatus};
use crate::{Error, Result};

const COLUMNS: &str =
    "id, content, status, generated_code, deployed, component_name, created_at, updated_at";

/// Repository for suggestion records
#[derive(Clone)]
pub struct SuggestionRepo {
    pool: SqlitePool,
}

impl SuggestionRepo {
    /// Create a new repository over a pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new `pending` suggestion
    pub async fn create(&self, suggestion: &NewSuggestion) -> Result<Suggestion> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO suggestions (content, status, deployed, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            "#,
        )
        .bind(suggestion.content())
        .bind(SuggestionStatus::Pending)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        tracing::info!(suggestion_id = id, "Created suggestion");

        self.get(id).await
    }

    /// Fetch a suggestion by id
    pub async fn get(&self, id: i64) -> Result<Suggestion> {
        let sql = format!("SELECT {} FROM suggestions WHERE id = ?", COLUMNS);
        sqlx::query_as::<_, Suggestion>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Suggestion #{} not found", id)))
    }

    /// All suggestions, newest first
    pub async fn list(&self) -> Result<Vec<Suggestion>> {
        let sql = format!(
            "SELECT {} FROM suggestions ORDER BY created_at DESC, id DESC",
            COLUMNS
        );
        Ok(sqlx::query_as::<_, Suggestion>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Suggestions in a given status, oldest first
    pub async fn list_by_status(&self, status: SuggestionStatus) -> Result<Vec<Suggestion>> {
        let sql = format!(
            "SELECT {} FROM suggestions WHERE status = ? ORDER BY created_at ASC, id ASC",
            COLUMNS
        );
        Ok(sqlx::query_as::<_, Suggestion>(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Suggestions awaiting processing, in creation order
    pub async fn pending(&self) -> Result<Vec<Suggestion>> {
        self.list_by_status(SuggestionStatus::Pending).await
    }

    /// Currently deployed suggestions, oldest first
    pub async fn deployed(&self) -> Result<Vec<Suggestion>> {
        let sql = format!(
            "SELECT {} FROM suggestions WHERE deployed = 1 ORDER BY created_at ASC, id ASC",
            COLUMNS
        );
        Ok(sqlx::query_as::<_, Suggestion>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Claim a pending suggestion (`pending → processing`)
    pub async fn claim(&self, id: i64) -> Result<Suggestion> {
        self.transition(id, SuggestionStatus::Pending, SuggestionStatus::Processing, None)
            .await
    }

    /// Record a generated artifact (`processing → completed`)
    pub async fn complete(&self, id: i64, generated_code: &str) -> Result<Suggestion> {
        self.transition(
            id,
            SuggestionStatus::Processing,
            SuggestionStatus::Completed,
            Some(generated_code),
        )
        .await
    }

    /// Record a failure reason in place of the artifact (`processing → failed`)
    pub async fn fail(&self, id: i64, reason: &str) -> Result<Suggestion> {
        self.transition(
            id,
            SuggestionStatus::Processing,
            SuggestionStatus::Failed,
            Some(reason),
        )
        .await
    }

    /// Mark a completed suggestion as deployed under `component_name`
    pub async fn set_deployed(&self, id: i64, component_name: &str) -> Result<Suggestion> {
        let mut tx = self.pool.begin().await?;

        let current = fetch_in(&mut tx, id).await?;
        if !current.is_deployable() {
            return Err(Error::NotDeployable(
                id,
                format!(
                    "status is {} and artifact is {}",
                    current.status,
                    if current.generated_code.is_some() {
                        "present"
                    } else {
                        "missing"
                    }
                ),
            ));
        }

        sqlx::query(
            r#"
            UPDATE suggestions
            SET deployed = 1, component_name = ?, updated_at = ?
            WHERE id = ? AND status = ? AND generated_code IS NOT NULL
            "#,
        )
        .bind(component_name)
        .bind(Utc::now())
        .bind(id)
        .bind(SuggestionStatus::Completed)
        .execute(&mut *tx)
        .await?;

        let updated = fetch_in(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(suggestion_id = id, component = component_name, "Marked deployed");
        Ok(updated)
    }

    /// Clear the deployment flag and component name
    pub async fn clear_deployed(&self, id: i64) -> Result<Suggestion> {
        let mut tx = self.pool.begin().await?;

        // Surfaces NotFound before updating
        fetch_in(&mut tx, id).await?;

        sqlx::query(
            "UPDATE suggestions SET deployed = 0, component_name = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let updated = fetch_in(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(suggestion_id = id, "Cleared deployment");
        Ok(updated)
    }

    /// Return `processing` records untouched for longer than `older_than` to `pending`
    ///
    /// Returns the ids that were reclaimed.
    pub async fn reclaim_stale(&self, older_than: Duration) -> Result<Vec<i64>> {
        let cutoff: DateTime<Utc> = Utc::now() - older_than;
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM suggestions WHERE status = ?", COLUMNS);
        let processing = sqlx::query_as::<_, Suggestion>(&sql)
            .bind(SuggestionStatus::Processing)
            .fetch_all(&mut *tx)
            .await?;

        let mut reclaimed = Vec::new();
        for suggestion in processing.iter().filter(|s| s.updated_at < cutoff) {
            sqlx::query(
                "UPDATE suggestions SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
            )
            .bind(SuggestionStatus::Pending)
            .bind(Utc::now())
            .bind(suggestion.id)
            .bind(SuggestionStatus::Processing)
            .execute(&mut *tx)
            .await?;
            reclaimed.push(suggestion.id);
        }

        tx.commit().await?;

        if !reclaimed.is_empty() {
            tracing::warn!(ids = ?reclaimed, "Reclaimed stale processing suggestions");
        }
        Ok(reclaimed)
    }

    /// Guarded status change inside a transaction
    ///
    /// The transaction is dropped (rolled back) on every early return.
    async fn transition(
        &self,
        id: i64,
        from: SuggestionStatus,
        to: SuggestionStatus,
        generated_code: Option<&str>,
    ) -> Result<Suggestion> {
        debug_assert!(from.can_transition_to(&to));

        let mut tx = self.pool.begin().await?;

        let current = fetch_in(&mut tx, id).await?;
        if current.status != from {
            return Err(Error::InvalidState {
                id,
                expected: from,
                actual: current.status,
            });
        }

        let result = sqlx::query(
            r#"
            UPDATE suggestions
            SET status = ?, generated_code = COALESCE(?, generated_code), updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to)
        .bind(generated_code)
        .bind(Utc::now())
        .bind(id)
        .bind(from)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::InvalidState {
                id,
                expected: from,
                actual: current.status,
            });
        }

        let updated = fetch_in(&mut tx, id).await?;
        tx.commit().await?;

        tracing::debug!(suggestion_id = id, from = %from, to = %to, "Status change committed");
        Ok(updated)
    }
}

async fn fetch_in(conn: &mut SqliteConnection, id: i64) -> Result<Suggestion> {
    let sql = format!("SELECT {} FROM suggestions WHERE id = ?", COLUMNS);
    sqlx::query_as::<_, Suggestion>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Suggestion #{} not found", id)))
}
