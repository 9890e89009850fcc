//! Configuration management for Sprout
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (SPROUT_*)
//! 3. Config file (~/.config/sprout/config.toml)
//! 4. Default values

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Which language-model backend to call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// OpenAI-compatible chat-completions endpoint
    #[default]
    OpenAi,
    /// Claude Code CLI in print mode
    Claude,
}

impl fmt::Display for ModelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelBackend::OpenAi => write!(f, "openai"),
            ModelBackend::Claude => write!(f, "claude"),
        }
    }
}

impl FromStr for ModelBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ModelBackend::OpenAi),
            "claude" => Ok(ModelBackend::Claude),
            other => Err(format!(
                "Unknown backend '{}'. Valid backends: openai, claude",
                other
            )),
        }
    }
}

/// Language-model configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Backend to use
    pub backend: ModelBackend,

    /// Model name passed to the backend
    pub model: Option<String>,

    /// Base URL of the chat-completions API
    pub base_url: String,

    /// Path to the claude executable
    pub claude_path: String,

    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::OpenAi,
            model: None,
            base_url: "https://api.openai.com/v1".to_string(),
            claude_path: "claude".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Worker loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Sleep between polling cycles
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Record a stub artifact as `failed` instead of `completed`
    pub fail_on_stub: bool,

    /// Reclaim `processing` records older than this at start-up
    #[serde(with = "humantime_serde")]
    pub reclaim_after: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            fail_on_stub: false,
            reclaim_after: None,
        }
    }
}

/// Working-tree configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RepoConfig {
    /// Path inside the working tree
    pub path: PathBuf,

    /// Trunk branch name
    pub trunk: String,

    /// Prefix of suggestion branches
    pub branch_prefix: String,

    /// Maximum slug length in branch names
    pub slug_len: usize,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            trunk: "main".to_string(),
            branch_prefix: "suggestion-".to_string(),
            slug_len: 30,
        }
    }
}

/// Deployment configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Directory (relative to the working tree) receiving deployed components
    pub target_dir: PathBuf,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("frontend/src/generated"),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to ~/.cache/sprout/sprout.db
    pub path: Option<PathBuf>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Language-model configuration
    pub model: ModelConfig,
    /// Worker loop configuration
    pub worker: WorkerConfig,
    /// Working-tree configuration
    pub repo: RepoConfig,
    /// Deployment configuration
    pub deploy: DeployConfig,
    /// Database configuration
    pub database: DatabaseConfig,
}

/// Overrides collected from CLI flags
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub backend: Option<ModelBackend>,
    pub model: Option<String>,
    pub claude_path: Option<String>,
    pub repo: Option<PathBuf>,
    pub database: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/sprout/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sprout").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - SPROUT_BACKEND: Model backend (openai, claude)
    /// - SPROUT_MODEL: Model to use
    /// - SPROUT_BASE_URL: Chat-completions base URL
    /// - SPROUT_CLAUDE_PATH: Path to claude executable
    /// - SPROUT_REPO: Working tree path
    /// - SPROUT_DB: Database file
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(backend) = std::env::var("SPROUT_BACKEND") {
            match backend.parse() {
                Ok(b) => self.model.backend = b,
                Err(e) => tracing::warn!("Ignoring SPROUT_BACKEND: {}", e),
            }
        }

        if let Ok(model) = std::env::var("SPROUT_MODEL") {
            self.model.model = Some(model);
        }

        if let Ok(base_url) = std::env::var("SPROUT_BASE_URL") {
            self.model.base_url = base_url;
        }

        if let Ok(claude_path) = std::env::var("SPROUT_CLAUDE_PATH") {
            self.model.claude_path = claude_path;
        }

        if let Ok(repo) = std::env::var("SPROUT_REPO") {
            self.repo.path = PathBuf::from(repo);
        }

        if let Ok(db) = std::env::var("SPROUT_DB") {
            self.database.path = Some(PathBuf::from(db));
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, overrides: CliOverrides) -> Self {
        if let Some(backend) = overrides.backend {
            self.model.backend = backend;
        }

        if let Some(m) = overrides.model {
            self.model.model = Some(m);
        }

        if let Some(path) = overrides.claude_path {
            self.model.claude_path = path;
        }

        if let Some(repo) = overrides.repo {
            self.repo.path = repo;
        }

        if let Some(db) = overrides.database {
            self.database.path = Some(db);
        }

        self
    }

    /// Load configuration with all overrides applied and validate it
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(overrides: CliOverrides) -> Result<Self> {
        let config = Self::load()?
            .with_env_overrides()
            .with_cli_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.model.base_url).map_err(|e| {
            Error::Config(format!("Invalid base_url '{}': {}", self.model.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.worker.poll_interval.is_zero() {
            return Err(Error::Config("worker.poll_interval must be non-zero".to_string()));
        }

        if self.repo.trunk.trim().is_empty() {
            return Err(Error::Config("repo.trunk cannot be empty".to_string()));
        }

        if self.repo.branch_prefix.trim().is_empty() {
            return Err(Error::Config("repo.branch_prefix cannot be empty".to_string()));
        }

        if self.repo.slug_len == 0 {
            return Err(Error::Config("repo.slug_len must be at least 1".to_string()));
        }

        if self.deploy.target_dir.is_absolute() {
            return Err(Error::Config(
                "deploy.target_dir must be relative to the working tree".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolved database path
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(sprout_db::Database::default_path()?),
        }
    }
}
