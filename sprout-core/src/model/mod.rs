//! Language-model capability shared by every pipeline stage
//!
//! Stages hold an `Arc<dyn LanguageModel>` built once at start-up and send
//! plain completion requests through it. Replies are expected to be either
//! plain text or JSON, optionally wrapped in a Markdown code fence.

pub mod backend;
pub mod prompts;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::{Error, Result};

pub use backend::{from_config, ClaudeBackend, OpenAiBackend};

/// A single completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Fully rendered prompt
    pub prompt: String,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl CompletionRequest {
    /// Create a request with the given limits
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens,
            temperature,
        }
    }
}

/// Something that can turn a prompt into text
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Run one completion and return the raw reply text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Remove a surrounding Markdown code fence, if present
///
/// The opening fence may carry a language tag (```` ```tsx ````). A reply
/// without a leading fence is returned trimmed but otherwise untouched.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut lines: Vec<&str> = trimmed.lines().collect();
    // Opening fence line, including any language tag
    lines.remove(0);
    if lines.last().is_some_and(|l| l.trim() == "```") {
        lines.pop();
    }

    lines.join("\n").trim().to_string()
}

/// Strip fences and decode a JSON reply into `T`
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let body = strip_code_fences(text);
    serde_json::from_str(&body).map_err(|e| {
        Error::Model(format!(
            "Unparseable model reply ({}): {}",
            e,
            sprout_db::models::preview(&body, 120)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Verdict {
        approved: bool,
        reason: String,
    }

    #[test]
    fn test_strip_plain_text() {
        assert_eq!(strip_code_fences("  hello\n"), "hello");
    }

    #[test]
    fn test_strip_fence_with_language_tag() {
        let text = "```tsx\nconst A = () => <div/>;\nexport default A;\n```";
        assert_eq!(
            strip_code_fences(text),
            "const A = () => <div/>;\nexport default A;"
        );
    }

    #[test]
    fn test_strip_unterminated_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_json_fenced() {
        let v: Verdict =
            parse_json("```json\n{\"approved\": true, \"reason\": \"fine\"}\n```").unwrap();
        assert_eq!(
            v,
            Verdict {
                approved: true,
                reason: "fine".to_string()
            }
        );
    }

    #[test]
    fn test_parse_json_rejects_prose() {
        // Substring "approved": true inside prose must not count as approval
        let err = parse_json::<Verdict>("Sure! \"approved\": true, looks good").unwrap_err();
        assert!(matches!(err, Error::Model(_)));
    }
}
