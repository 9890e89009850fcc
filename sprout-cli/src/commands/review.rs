//! Review command - human approval of suggestion branches

use std::io::{self, BufRead, Write};

use clap::{Args, Subcommand};
use sprout_core::{ReviewAction, ReviewOutcome};

use super::Context;

/// Review suggestion branches
#[derive(Args, Debug)]
#[command(args_conflicts_with_subcommands = true)]
pub struct ReviewArgs {
    #[command(subcommand)]
    command: Option<ReviewCommand>,

    /// Suggestion id to review
    id: Option<i64>,
}

#[derive(Subcommand, Debug)]
enum ReviewCommand {
    /// List branches waiting for review
    List,
}

impl ReviewArgs {
    /// Execute the review command
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        match (&self.command, self.id) {
            (None, Some(id)) => review_branch(ctx, id).await,
            _ => list_branches(ctx).await,
        }
    }
}

async fn list_branches(ctx: &Context) -> anyhow::Result<()> {
    let branches = ctx.repo()?.list_suggestion_branches()?;

    if branches.is_empty() {
        println!("No suggestion branches.");
        return Ok(());
    }

    println!("Suggestion branches:");
    for branch in &branches {
        println!("  #{:<5} {}", branch.id, branch.name);
    }
    Ok(())
}

async fn review_branch(ctx: &Context, id: i64) -> anyhow::Result<()> {
    // The record is context only; review works from the branch alone
    match ctx.database().await {
        Ok(db) => match db.suggestions().get(id).await {
            Ok(suggestion) => println!("Suggestion #{}: {}", id, suggestion.content),
            Err(e) => tracing::debug!(error = %e, "No record for suggestion"),
        },
        Err(e) => tracing::debug!(error = %e, "Database unavailable"),
    }

    let repo = ctx.repo()?;
    let session = repo.start_review(id)?;
    println!("Branch: {}", session.branch().name);
    println!();

    let diff = session.diff()?;
    if diff.is_empty() {
        println!("(no changes against trunk)");
    } else {
        println!("{}", diff);
    }

    let stdin = io::stdin();
    let action = prompt_action(&mut stdin.lock(), &mut io::stdout())?;

    match session.finish(action)? {
        ReviewOutcome::Merged { commit } => {
            println!("Merged into trunk ({})", &commit[..commit.len().min(8)]);
        }
        ReviewOutcome::Rejected => println!("Rejected; branch kept for reference."),
        ReviewOutcome::LeftForEditing { branch } => {
            println!("Left on {} for editing. Commit your edits, then review again.", branch);
        }
        ReviewOutcome::Quit => println!("No decision made."),
    }
    Ok(())
}

/// Ask until a valid action is entered; end of input means quit
fn prompt_action(input: &mut impl BufRead, output: &mut impl Write) -> io::Result<ReviewAction> {
    loop {
        write!(output, "[a]pprove, [r]eject, [e]dit, [q]uit: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            return Ok(ReviewAction::Quit);
        }

        match line.parse::<ReviewAction>() {
            Ok(action) => return Ok(action),
            Err(e) => writeln!(output, "{}", e)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_prompt_reprompts_on_invalid_input() {
        let mut input = Cursor::new("maybe\n\nApprove\n");
        let mut output = Vec::new();

        let action = prompt_action(&mut input, &mut output).unwrap();
        assert_eq!(action, ReviewAction::Approve);

        let shown = String::from_utf8(output).unwrap();
        assert_eq!(shown.matches("[a]pprove").count(), 3);
        assert!(shown.contains("Invalid choice 'maybe'"));
    }

    #[test]
    fn test_prompt_eof_quits() {
        let mut input = Cursor::new("");
        let mut output = Vec::new();
        assert_eq!(
            prompt_action(&mut input, &mut output).unwrap(),
            ReviewAction::Quit
        );
    }
}
