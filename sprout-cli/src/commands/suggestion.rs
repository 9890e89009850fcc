//! Suggestion commands - submit, list and inspect

use clap::Args;
use sprout_db::{NewSuggestion, Suggestion, SuggestionStatus};

use super::Context;

/// Submit a suggestion
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Suggestion text (at most 500 characters)
    text: String,
}

impl SubmitArgs {
    /// Execute the submit command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let new = NewSuggestion::new(&self.text)?;
        let db = ctx.database().await?;
        let suggestion = db.suggestions().create(&new).await?;

        println!("Submitted suggestion #{}", suggestion.id);
        Ok(())
    }
}

/// List suggestions
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show suggestions with this status
    #[arg(short, long)]
    status: Option<SuggestionStatus>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

impl ListArgs {
    /// Execute the list command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let repo = ctx.database().await?.suggestions();
        let suggestions = match self.status {
            Some(status) => repo.list_by_status(status).await?,
            None => repo.list().await?,
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&suggestions)?);
            return Ok(());
        }

        if suggestions.is_empty() {
            println!("No suggestions.");
            return Ok(());
        }

        for suggestion in &suggestions {
            print_row(suggestion);
        }
        Ok(())
    }
}

/// Show one suggestion
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Suggestion id
    id: i64,

    /// Print JSON
    #[arg(long)]
    json: bool,
}

impl ShowArgs {
    /// Execute the show command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        let suggestion = ctx.database().await?.suggestions().get(self.id).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&suggestion)?);
            return Ok(());
        }

        println!("Suggestion #{}", suggestion.id);
        println!("  Status: {}", suggestion.status);
        println!(
            "  Submitted: {}",
            suggestion.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!(
            "  Updated: {}",
            suggestion.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        if let Some(ref name) = suggestion.component_name {
            println!("  Deployed as: {}", name);
        }
        println!();
        println!("{}", suggestion.content);

        if let Some(ref code) = suggestion.generated_code {
            println!();
            println!("--- generated ---");
            println!("{}", code);
        }
        Ok(())
    }
}

pub(crate) fn print_row(suggestion: &Suggestion) {
    let deployed = if suggestion.deployed { " (deployed)" } else { "" };
    println!(
        "  #{:<5} {:<11} {}{}",
        suggestion.id,
        suggestion.status,
        suggestion.preview(),
        deployed
    );
}
