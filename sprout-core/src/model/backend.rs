//! Language-model backends

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;

use crate::config::{ModelBackend, ModelConfig};
use crate::secrets::Secrets;
use crate::{Error, Result};

use super::{CompletionRequest, LanguageModel};

/// Model used when none is configured
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

/// OpenAI-compatible chat-completions backend
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAiBackend {
    /// Create a backend for `base_url` using `api_key`
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
        })
    }

    /// Use a specific model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModel for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": request.prompt }
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        tracing::debug!(
            model = %self.model,
            max_tokens = request.max_tokens,
            temperature = request.temperature,
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(Error::Model(format!(
                "Model request failed with status {}: {}",
                status,
                sprout_db::models::preview(&body, 400)
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            Error::Model(format!(
                "Error decoding response body: {}. Response snippet: {}",
                e,
                sprout_db::models::preview(&body, 400)
            ))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| Error::Model("Model reply contained no content".to_string()))
    }
}

/// Claude Code CLI backend in non-interactive print mode
///
/// The CLI does not expose sampling controls, so temperature and token
/// limits in the request are ignored.
#[derive(Debug, Clone)]
pub struct ClaudeBackend {
    claude_path: String,
    model: Option<String>,
    timeout: Duration,
}

impl ClaudeBackend {
    /// Create a new Claude backend with default settings
    pub fn new() -> Self {
        Self {
            claude_path: "claude".to_string(),
            model: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Create a Claude backend with custom path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.claude_path = path.into();
        self
    }

    /// Create a Claude backend with a specific model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Bound each invocation
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_command(&self, prompt: &str) -> Command {
        let mut cmd = Command::new(&self.claude_path);
        cmd.arg("--print").arg("--output-format").arg("text");

        if let Some(ref model) = self.model {
            cmd.arg("--model").arg(model);
        }

        cmd.arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }
}

impl Default for ClaudeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for ClaudeBackend {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut cmd = self.build_command(&request.prompt);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| {
                Error::Model(format!(
                    "Claude did not answer within {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::Model(format!(
                        "Claude executable not found at '{}'. Is Claude Code installed?",
                        self.claude_path
                    ))
                } else {
                    Error::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Model(format!(
                "Claude exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Build the configured backend
pub fn from_config(config: &ModelConfig, secrets: &Secrets) -> Result<Arc<dyn LanguageModel>> {
    match config.backend {
        ModelBackend::OpenAi => {
            let api_key = secrets.openai_api_key().ok_or_else(|| {
                Error::Config(
                    "No API key found. Set OPENAI_API_KEY or add [openai] api_key to the secrets file"
                        .to_string(),
                )
            })?;
            let model = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
            let backend = OpenAiBackend::new(&config.base_url, api_key, config.timeout)?
                .with_model(model);
            Ok(Arc::new(backend))
        }
        ModelBackend::Claude => {
            let mut backend = ClaudeBackend::new()
                .with_path(&config.claude_path)
                .with_timeout(config.timeout);
            if let Some(ref model) = config.model {
                backend = backend.with_model(model);
            }
            Ok(Arc::new(backend))
        }
    }
}
