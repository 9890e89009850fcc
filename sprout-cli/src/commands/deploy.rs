//! Deployment commands

use clap::Args;
use sprout_core::Deployer;

use super::suggestion::print_row;
use super::Context;

async fn deployer(ctx: &Context) -> anyhow::Result<Deployer> {
    let db = ctx.database().await?;
    let target = ctx.config.repo.path.join(&ctx.config.deploy.target_dir);
    Ok(Deployer::new(db.suggestions(), target))
}

/// Deploy a completed suggestion
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Suggestion id
    id: i64,
}

impl DeployArgs {
    /// Execute the deploy command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let deployer = deployer(ctx).await?;
        let suggestion = deployer.deploy(self.id).await?;

        println!(
            "Deployed #{} as {} ({})",
            suggestion.id,
            suggestion.component_name.as_deref().unwrap_or("?"),
            deployer.component_path(suggestion.id).display()
        );
        Ok(())
    }
}

/// Remove a deployed component
#[derive(Args, Debug)]
pub struct UndeployArgs {
    /// Suggestion id
    id: i64,
}

impl UndeployArgs {
    /// Execute the undeploy command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let suggestion = deployer(ctx).await?.undeploy(self.id).await?;
        println!("Undeployed #{}", suggestion.id);
        Ok(())
    }
}

/// List deployed suggestions
#[derive(Args, Debug)]
pub struct DeployedArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

impl DeployedArgs {
    /// Execute the deployed command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let deployed = deployer(ctx).await?.deployed().await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&deployed)?);
        } else if deployed.is_empty() {
            println!("Nothing deployed.");
        } else {
            for suggestion in &deployed {
                print_row(suggestion);
            }
        }
        Ok(())
    }
}
