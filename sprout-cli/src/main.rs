//! Sprout CLI - Command line interface for Sprout
//!
//! Suggestions go in, reviewed code comes out.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sprout_core::{CliOverrides, Config, ModelBackend, Secrets};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{
    AnalyzeArgs, ChangesArgs, Context, DeployArgs, DeployedArgs, ListArgs, RecoverArgs,
    ReviewArgs, ShowArgs, SubmitArgs, UndeployArgs, WorkerArgs,
};

/// Sprout: turn visitor suggestions into reviewable code
#[derive(Parser, Debug)]
#[command(name = "sprout")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Model backend (overrides config and env)
    #[arg(long, global = true)]
    backend: Option<ModelBackend>,

    /// Model to use (overrides config and env)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Path to claude executable (overrides config and env)
    #[arg(long, global = true)]
    claude_path: Option<String>,

    /// Working tree (overrides config and env)
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    /// SQLite database file (overrides config and env)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Show current configuration
    Config {
        /// Create an empty secrets file with safe permissions
        #[arg(long)]
        init_secrets: bool,
    },

    /// Run the worker loop
    #[command(visible_alias = "w")]
    Worker(WorkerArgs),

    /// Submit a suggestion
    Submit(SubmitArgs),

    /// List suggestions
    #[command(visible_alias = "ls")]
    List(ListArgs),

    /// Show one suggestion
    Show(ShowArgs),

    /// Run impact analysis for a suggestion
    Analyze(AnalyzeArgs),

    /// Generate, review and optionally apply changes for a suggestion
    Changes(ChangesArgs),

    /// Deploy a completed suggestion's component
    Deploy(DeployArgs),

    /// Remove a deployed component
    Undeploy(UndeployArgs),

    /// List deployed suggestions
    Deployed(DeployedArgs),

    /// Review suggestion branches
    Review(ReviewArgs),

    /// Return stale processing suggestions to pending
    Recover(RecoverArgs),
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Load configuration with overrides
    let config = Config::load_with_overrides(CliOverrides {
        backend: cli.backend,
        model: cli.model.clone(),
        claude_path: cli.claude_path.clone(),
        repo: cli.repo.clone(),
        database: cli.db.clone(),
    })?;

    tracing::debug!(
        backend = %config.model.backend,
        model = ?config.model.model,
        repo = %config.repo.path.display(),
        "Configuration loaded"
    );

    let ctx = Context::new(config, cli.verbose);

    match cli.command {
        Some(Commands::Version) => {
            println!("sprout {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Config { init_secrets }) => {
            if init_secrets {
                let path = Secrets::create_template()?;
                println!("Created {}", path.display());
                println!();
            }
            print_config(&ctx.config)?;
        }
        Some(Commands::Worker(args)) => args.execute(&ctx).await?,
        Some(Commands::Submit(args)) => args.execute(&ctx).await?,
        Some(Commands::List(args)) => args.execute(&ctx).await?,
        Some(Commands::Show(args)) => args.execute(&ctx).await?,
        Some(Commands::Analyze(args)) => args.execute(&ctx).await?,
        Some(Commands::Changes(args)) => args.execute(&ctx).await?,
        Some(Commands::Deploy(args)) => args.execute(&ctx).await?,
        Some(Commands::Undeploy(args)) => args.execute(&ctx).await?,
        Some(Commands::Deployed(args)) => args.execute(&ctx).await?,
        Some(Commands::Review(args)) => args.execute(&ctx).await?,
        Some(Commands::Recover(args)) => args.execute(&ctx).await?,
        None => {
            println!("Sprout - turn visitor suggestions into reviewable code");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn print_config(config: &Config) -> anyhow::Result<()> {
    println!("Sprout Configuration");
    println!("====================");
    println!();
    println!("Model:");
    println!("  backend: {}", config.model.backend);
    println!("  model: {}", config.model.model.as_deref().unwrap_or("(default)"));
    println!("  base_url: {}", config.model.base_url);
    println!("  claude_path: {}", config.model.claude_path);
    println!("  timeout: {:?}", config.model.timeout);
    println!();
    println!("Worker:");
    println!("  poll_interval: {:?}", config.worker.poll_interval);
    println!("  fail_on_stub: {}", config.worker.fail_on_stub);
    match config.worker.reclaim_after {
        Some(after) => println!("  reclaim_after: {:?}", after),
        None => println!("  reclaim_after: (off)"),
    }
    println!();
    println!("Repository:");
    println!("  path: {}", config.repo.path.display());
    println!("  trunk: {}", config.repo.trunk);
    println!("  branch_prefix: {}", config.repo.branch_prefix);
    println!("  slug_len: {}", config.repo.slug_len);
    println!();
    println!("Deploy:");
    println!("  target_dir: {}", config.deploy.target_dir.display());
    println!();
    println!("Database: {}", config.database_path()?.display());
    println!();

    if let Some(path) = Config::default_config_path() {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
    if let Some(path) = Secrets::default_secrets_path() {
        println!("Secrets file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - OPENAI_API_KEY is used if set)");
        }
    }

    Ok(())
}
