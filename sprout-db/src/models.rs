//! Data models for database records

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Maximum accepted suggestion length, in characters
pub const MAX_CONTENT_LEN: usize = 500;

/// Lifecycle status of a suggestion
///
/// `pending → processing → {completed | failed}` are the only edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SuggestionStatus {
    /// Submitted, waiting for the worker
    Pending,
    /// Claimed by the worker
    Processing,
    /// Artifact generated
    Completed,
    /// Rejected or errored; the reason is stored as the artifact
    Failed,
}

impl SuggestionStatus {
    /// All statuses, in lifecycle order
    pub fn all() -> &'static [SuggestionStatus] {
        &[
            SuggestionStatus::Pending,
            SuggestionStatus::Processing,
            SuggestionStatus::Completed,
            SuggestionStatus::Failed,
        ]
    }

    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Processing => "processing",
            SuggestionStatus::Completed => "completed",
            SuggestionStatus::Failed => "failed",
        }
    }

    /// Statuses reachable from this one
    pub fn valid_transitions(&self) -> &'static [SuggestionStatus] {
        match self {
            SuggestionStatus::Pending => &[SuggestionStatus::Processing],
            SuggestionStatus::Processing => {
                &[SuggestionStatus::Completed, SuggestionStatus::Failed]
            }
            SuggestionStatus::Completed | SuggestionStatus::Failed => &[],
        }
    }

    /// Check whether `to` is a legal next status
    pub fn can_transition_to(&self, to: &SuggestionStatus) -> bool {
        self.valid_transitions().contains(to)
    }

    /// Terminal statuses have no outgoing edges
    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuggestionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SuggestionStatus::Pending),
            "processing" => Ok(SuggestionStatus::Processing),
            "completed" => Ok(SuggestionStatus::Completed),
            "failed" => Ok(SuggestionStatus::Failed),
            other => Err(format!(
                "Unknown status '{}'. Valid statuses: pending, processing, completed, failed",
                other
            )),
        }
    }
}

/// A user-submitted suggestion and its lifecycle state
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Suggestion {
    /// Stable identifier assigned at creation
    pub id: i64,

    /// Raw suggestion text
    pub content: String,

    /// Lifecycle status
    pub status: SuggestionStatus,

    /// Generated artifact, or the failure reason once processing failed
    pub generated_code: Option<String>,

    /// Whether the artifact is currently deployed
    pub deployed: bool,

    /// Name of the deployed component
    pub component_name: Option<String>,

    /// When the suggestion was submitted
    pub created_at: DateTime<Utc>,

    /// When the record last changed
    pub updated_at: DateTime<Utc>,
}

impl Suggestion {
    /// Short preview of the content for log lines
    pub fn preview(&self) -> String {
        preview(&self.content, 50)
    }

    /// Check whether the record can be deployed
    pub fn is_deployable(&self) -> bool {
        self.status == SuggestionStatus::Completed && self.generated_code.is_some()
    }
}

/// Validated content for a new suggestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSuggestion {
    content: String,
}

impl NewSuggestion {
    /// Trim and bound-check submitted text
    pub fn new(content: impl AsRef<str>) -> Result<Self> {
        let content = content.as_ref().trim();

        if content.is_empty() {
            return Err(Error::InvalidContent(
                "Suggestion content cannot be empty".to_string(),
            ));
        }

        let len = content.chars().count();
        if len > MAX_CONTENT_LEN {
            return Err(Error::InvalidContent(format!(
                "Suggestion content too long ({} characters, max {})",
                len, MAX_CONTENT_LEN
            )));
        }

        Ok(Self {
            content: content.to_string(),
        })
    }

    /// The validated text
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Truncate text to `max` characters, appending an ellipsis when cut
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}
