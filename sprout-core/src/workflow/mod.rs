//! Suggestion lifecycle
//!
//! The state machine that governs a suggestion's status, the store seam it
//! persists through, and the worker loop that drives pending work.

pub mod lifecycle;
pub mod state;
pub mod store;

pub use lifecycle::{CycleReport, Orchestrator, SuggestionOutcome, WorkerOptions};
pub use state::{Lifecycle, Workflow};
pub use store::SuggestionStore;
