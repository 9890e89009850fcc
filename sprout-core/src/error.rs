//! Error types for Sprout

use thiserror::Error;

/// Result type alias for Sprout operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Sprout operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Git error
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Record store error
    #[error(transparent)]
    Store(#[from] sprout_db::Error),

    /// HTTP transport error talking to a model backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Language-model call failed or returned unusable output
    #[error("Model error: {0}")]
    Model(String),

    /// Working tree is already held by another writer
    #[error("Working tree is locked: {0}")]
    Locked(String),

    /// Merge could not complete cleanly
    #[error("Merge conflict in {branch}: {paths:?}")]
    MergeConflict { branch: String, paths: Vec<String> },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
