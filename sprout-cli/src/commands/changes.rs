//! Change commands - analysis and multi-file changes for a suggestion

use clap::Args;
use sprout_core::pipeline::changes::CODEBASE_LIMIT;
use sprout_core::pipeline::{ChangeOutcome, ChangePipeline, ImpactAnalysis, ReviewReport};

use super::Context;

/// Run impact analysis only
#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Suggestion id
    id: i64,
}

impl AnalyzeArgs {
    /// Execute the analyze command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let suggestion = ctx.database().await?.suggestions().get(self.id).await?;
        let codebase = ctx.repo()?.tracked_files(CODEBASE_LIMIT)?;

        let pipeline = ChangePipeline::new(ctx.model()?);
        let analysis = pipeline.analyze(&suggestion.content, &codebase).await;

        print_analysis(&analysis);
        Ok(())
    }
}

/// Generate and review changes, optionally committing them to a branch
#[derive(Args, Debug)]
pub struct ChangesArgs {
    /// Suggestion id
    id: i64,

    /// Commit approved changes to the suggestion's branch
    #[arg(long)]
    apply: bool,
}

impl ChangesArgs {
    /// Execute the changes command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let suggestion = ctx.database().await?.suggestions().get(self.id).await?;
        let pipeline = ChangePipeline::new(ctx.model()?);

        let run = pipeline
            .run(
                &suggestion,
                &ctx.config.repo.path,
                &ctx.branch_options(),
                self.apply,
            )
            .await?;

        print_analysis(run.outcome.analysis());
        println!();

        match &run.outcome {
            ChangeOutcome::NoFilesIdentified { .. } => {
                println!("No files identified for modification.");
            }
            ChangeOutcome::NoChanges { .. } => {
                println!("The model left every file unchanged.");
            }
            ChangeOutcome::Reviewed {
                changes, review, ..
            } => {
                println!("Changed files:");
                for (path, content) in changes {
                    println!("  {} ({} chars)", path, content.chars().count());
                }
                println!();
                print_review(review);
            }
        }

        match run.applied {
            Some(applied) => {
                println!();
                println!(
                    "Committed {} to {}",
                    &applied.commit[..applied.commit.len().min(8)],
                    applied.branch
                );
                if ctx.verbose {
                    println!();
                    println!("{}", applied.diff);
                }
                println!("Review with: sprout review {}", suggestion.id);
            }
            None if self.apply => println!("Nothing applied."),
            None => {}
        }

        Ok(())
    }
}

fn print_analysis(analysis: &ImpactAnalysis) {
    println!("Complexity: {}", analysis.complexity);
    println!("Reasoning: {}", analysis.reasoning);
    if analysis.files_to_modify.is_empty() {
        println!("Files: (none)");
    } else {
        println!("Files:");
        for file in &analysis.files_to_modify {
            println!("  {}", file);
        }
    }
}

fn print_review(review: &ReviewReport) {
    println!(
        "Review: {} (risk: {})",
        if review.approved { "approved" } else { "not approved" },
        review.risk_level
    );
    for issue in &review.issues {
        println!("  issue: {}", issue);
    }
    for suggestion in &review.suggestions {
        println!("  suggestion: {}", suggestion);
    }
}
