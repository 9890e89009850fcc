//! Worker command - drive pending suggestions through the pipeline

use std::sync::Arc;

use clap::Args;
use sprout_core::workflow::{Orchestrator, WorkerOptions};
use tokio::sync::watch;

use super::Context;

/// Run the suggestion worker
#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Process the current pending suggestions once and exit
    #[arg(long)]
    once: bool,
}

impl WorkerArgs {
    /// Execute the worker command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let db = ctx.database().await?;
        let model = ctx.model()?;
        let orchestrator = Orchestrator::new(
            Arc::new(db.suggestions()),
            model,
            WorkerOptions::from(&ctx.config.worker),
        );

        if self.once {
            let report = orchestrator.run_cycle().await?;
            println!(
                "Processed {} suggestion(s): {} completed, {} rejected, {} failed",
                report.processed, report.completed, report.rejected, report.failed
            );
            return Ok(());
        }

        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Interrupt received, stopping after the current suggestion");
                    let _ = tx.send(true);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
                    // Keep the sender alive so the worker is not stopped
                    tx.closed().await;
                }
            }
        });

        orchestrator.run(rx).await?;
        Ok(())
    }
}
