//! Version-control workflow for Sprout
//!
//! Each suggestion gets its own branch off trunk. Changes are written,
//! staged and committed there, reviewed by a human, then merged back with
//! a merge commit or left in place.

mod branch;
mod changes;
mod lock;
mod repo;
mod review;

pub use branch::{slugify, SuggestionBranch};
pub use changes::ChangeSet;
pub use lock::{WorkingTreeLock, LOCK_FILE};
pub use repo::{is_safe_relative_path, BranchOptions, GitRepo};
pub use review::{ReviewAction, ReviewOutcome, ReviewSession};
