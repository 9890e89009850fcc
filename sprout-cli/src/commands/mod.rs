//! CLI command implementations

pub mod changes;
pub mod deploy;
pub mod recover;
pub mod review;
pub mod suggestion;
pub mod worker;

use std::sync::Arc;

use sprout_core::git::BranchOptions;
use sprout_core::model::backend;
use sprout_core::{Config, GitRepo, LanguageModel, Secrets};
use sprout_db::Database;

pub use changes::{AnalyzeArgs, ChangesArgs};
pub use deploy::{DeployArgs, DeployedArgs, UndeployArgs};
pub use recover::RecoverArgs;
pub use review::ReviewArgs;
pub use suggestion::{ListArgs, ShowArgs, SubmitArgs};
pub use worker::WorkerArgs;

/// Resolved configuration shared by every command
pub struct Context {
    pub config: Config,
    pub verbose: bool,
}

impl Context {
    pub fn new(config: Config, verbose: bool) -> Self {
        Self { config, verbose }
    }

    pub async fn database(&self) -> anyhow::Result<Database> {
        let path = self.config.database_path()?;
        Database::new(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to open database {}: {}", path.display(), e))
    }

    pub fn model(&self) -> anyhow::Result<Arc<dyn LanguageModel>> {
        let secrets = Secrets::load()?;
        let model = backend::from_config(&self.config.model, &secrets)?;
        tracing::debug!(backend = model.name(), "Model backend ready");
        Ok(model)
    }

    pub fn branch_options(&self) -> BranchOptions {
        BranchOptions::from(&self.config.repo)
    }

    pub fn repo(&self) -> anyhow::Result<GitRepo> {
        Ok(GitRepo::open(&self.config.repo.path)?.with_options(self.branch_options()))
    }
}
