//! Sprout Core - suggestion lifecycle and code generation pipeline
//!
//! Visitors submit short suggestions. A worker loop passes each through a
//! safety gate and a code synthesizer; a separate change pipeline turns
//! suggestions into reviewed commits on per-suggestion branches that a
//! human merges or rejects.

pub mod config;
pub mod deploy;
pub mod error;
pub mod git;
pub mod model;
pub mod pipeline;
pub mod secrets;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use config::{CliOverrides, Config, ModelBackend};
pub use deploy::Deployer;
pub use error::{Error, Result};
pub use git::{GitRepo, ReviewAction, ReviewOutcome};
pub use model::LanguageModel;
pub use pipeline::{ChangeOutcome, ChangePipeline};
pub use secrets::Secrets;
pub use workflow::{Orchestrator, WorkerOptions};
