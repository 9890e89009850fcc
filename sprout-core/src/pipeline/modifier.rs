//! Whole-file modification synthesis

use std::sync::Arc;

use crate::model::prompts::{render, PromptContext, PromptKind};
use crate::model::{strip_code_fences, CompletionRequest, LanguageModel};
use crate::{Error, Result};

const MAX_TOKENS: u32 = 2000;
const TEMPERATURE: f32 = 0.7;

/// Rewrites one file to implement a suggestion
///
/// Always yields complete file content. On any failure the current content
/// comes back untouched, so a working file is never replaced by an error.
pub struct ModificationSynthesizer {
    model: Arc<dyn LanguageModel>,
}

impl ModificationSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    async fn try_synthesize(&self, text: &str, path: &str, current: &str) -> Result<String> {
        let prompt = render(
            PromptKind::Modify,
            &PromptContext::new()
                .with_suggestion(text)
                .with_file(path, current),
        );
        let reply = self
            .model
            .complete(&CompletionRequest::new(prompt, MAX_TOKENS, TEMPERATURE))
            .await?;

        let content = strip_code_fences(&reply);
        if content.is_empty() {
            return Err(Error::Model("Model returned an empty file".to_string()));
        }
        Ok(content)
    }

    /// New content for `path`; `current` is empty for files that don't exist yet
    pub async fn synthesize(&self, text: &str, path: &str, current: &str) -> String {
        match self.try_synthesize(text, path, current).await {
            Ok(mut content) => {
                // Keep the POSIX trailing newline when the original had one
                if current.ends_with('\n') && !content.ends_with('\n') {
                    content.push('\n');
                }
                tracing::info!(path, chars = content.chars().count(), "Generated modification");
                content
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "Modification failed, keeping original content");
                current.to_string()
            }
        }
    }
}
