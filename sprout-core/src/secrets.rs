//! Secrets management for Sprout
//!
//! Credentials live apart from configuration so a config file can be shared.
//! The secrets file is `~/.config/sprout/secrets.toml` and must have
//! restrictive permissions (0600 on Unix).
//!
//! Loading priority:
//! 1. Environment variables (OPENAI_API_KEY)
//! 2. Secrets file (~/.config/sprout/secrets.toml)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Credentials loaded from the secrets file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Secrets {
    /// OpenAI-compatible API credentials
    pub openai: OpenAiSecrets,
}

/// Credentials for the chat-completions backend
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenAiSecrets {
    /// Bearer key sent with every request
    pub api_key: Option<String>,
}

impl Secrets {
    /// Read the default secrets file; empty secrets when there is none
    pub fn load() -> Result<Self> {
        match Self::default_secrets_path() {
            Some(path) if path.is_file() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Read `path`, refusing files readable by group or others
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = std::fs::metadata(path)?.permissions().mode() & 0o777;
            if mode & 0o077 != 0 {
                return Err(Error::Config(format!(
                    "{} is accessible to other users (mode {:o}); fix with: chmod 600 {}",
                    path.display(),
                    mode,
                    path.display()
                )));
            }
            debug!(path = %path.display(), mode = format!("{:o}", mode), "Secrets permissions checked");
        }

        let raw = std::fs::read_to_string(path)?;
        let mut secrets: Secrets = toml::from_str(&raw).map_err(|e| {
            Error::Config(format!("Invalid secrets file {}: {}", path.display(), e))
        })?;

        if let Some(ref mut key) = secrets.openai.api_key {
            *key = key.trim().to_string();
        }

        Ok(secrets)
    }

    /// Get the default secrets file path
    pub fn default_secrets_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sprout").join("secrets.toml"))
    }

    /// API key with environment variable override
    ///
    /// Priority: OPENAI_API_KEY env var > secrets file
    pub fn openai_api_key(&self) -> Option<String> {
        let from_env = std::env::var("OPENAI_API_KEY").ok();
        self.resolve_api_key(from_env)
    }

    fn resolve_api_key(&self, from_env: Option<String>) -> Option<String> {
        if let Some(key) = from_env {
            let key = key.trim().to_string();
            if !key.is_empty() {
                debug!("Using API key from OPENAI_API_KEY environment variable");
                return Some(key);
            }
        }

        match self.openai.api_key {
            Some(ref key) if !key.is_empty() => {
                debug!("Using API key from secrets file");
                Some(key.clone())
            }
            _ => None,
        }
    }

    /// Write a starter secrets file with mode 0600; never overwrites
    pub fn create_template() -> Result<PathBuf> {
        let path = Self::default_secrets_path()
            .ok_or_else(|| Error::Config("No config directory on this system".to_string()))?;

        if path.exists() {
            return Err(Error::Config(format!("{} already exists", path.display())));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = r#"# Sprout credentials. Keep this file private (chmod 600)
# and out of version control.

[openai]
# Key for the chat-completions endpoint configured in [model] base_url
api_key = ""
"#;

        std::fs::write(&path, template)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        warn!(path = %path.display(), "Wrote empty secrets file; add an API key to it");

        Ok(path)
    }
}
