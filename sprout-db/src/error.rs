//! Error types for database operations

use thiserror::Error;

use crate::models::SuggestionStatus;

/// Database error types
#[derive(Error, Debug)]
pub enum Error {
    /// SQLx database error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Submitted content failed the submission bounds
    #[error("Invalid suggestion: {0}")]
    InvalidContent(String),

    /// A status change was requested from the wrong starting status
    #[error("Suggestion #{id} is {actual}, expected {expected}")]
    InvalidState {
        id: i64,
        expected: SuggestionStatus,
        actual: SuggestionStatus,
    },

    /// Deployment requested for a suggestion that has no usable artifact
    #[error("Suggestion #{0} cannot be deployed: {1}")]
    NotDeployable(i64, String),
}

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, Error>;
