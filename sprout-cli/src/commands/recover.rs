//! Recover command - return orphaned processing suggestions to pending

use std::time::Duration;

use clap::Args;

use super::Context;

/// Reclaim suggestions stuck in `processing`
#[derive(Args, Debug)]
pub struct RecoverArgs {
    /// Only reclaim records untouched for this long (e.g. 30m, 2h)
    #[arg(long, default_value = "30m", value_parser = humantime::parse_duration)]
    older_than: Duration,
}

impl RecoverArgs {
    /// Execute the recover command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let lease = chrono::Duration::from_std(self.older_than)?;
        let repo = ctx.database().await?.suggestions();
        let ids = repo.reclaim_stale(lease).await?;

        if ids.is_empty() {
            println!("No stale suggestions.");
        } else {
            let list: Vec<String> = ids.iter().map(|id| format!("#{}", id)).collect();
            println!("Returned to pending: {}", list.join(", "));
        }
        Ok(())
    }
}
