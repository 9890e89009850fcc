//! Component synthesis for approved suggestions

use std::sync::Arc;

use crate::model::prompts::{render, PromptContext, PromptKind};
use crate::model::{strip_code_fences, CompletionRequest, LanguageModel};
use crate::{Error, Result};

const MAX_TOKENS: u32 = 1500;
const TEMPERATURE: f32 = 0.7;

/// Generated component source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Component source text
    pub source: String,
    /// True when `source` is the error placeholder rather than real output
    pub stub: bool,
}

impl Artifact {
    /// Placeholder component carrying the generation error
    ///
    /// Every line of `error` is commented out so the stub stays valid TSX.
    pub fn stub(error: &str) -> Self {
        let error = error.lines().collect::<Vec<_>>().join("\n// ");
        Self {
            source: format!(
                "// Error generating component: {}\n\n\
                 const ErrorComponent = () => <div>Error generating component</div>;\n\n\
                 export default ErrorComponent;",
                error
            ),
            stub: true,
        }
    }
}

/// Whether `source` has a module default export
fn has_default_export(source: &str) -> bool {
    source.lines().any(|l| l.trim_start().starts_with("export default"))
}

/// Turns an approved suggestion into a single React component
pub struct CodeSynthesizer {
    model: Arc<dyn LanguageModel>,
}

impl CodeSynthesizer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    async fn try_generate(&self, text: &str) -> Result<String> {
        let prompt = render(
            PromptKind::Generate,
            &PromptContext::new().with_suggestion(text),
        );
        let reply = self
            .model
            .complete(&CompletionRequest::new(prompt, MAX_TOKENS, TEMPERATURE))
            .await?;

        let source = strip_code_fences(&reply);
        if source.is_empty() {
            return Err(Error::Model("Model returned no code".to_string()));
        }
        if !has_default_export(&source) {
            return Err(Error::Model(
                "Generated component has no default export".to_string(),
            ));
        }
        Ok(source)
    }

    /// Generate component source; on failure returns a stub artifact
    pub async fn generate(&self, text: &str) -> Artifact {
        match self.try_generate(text).await {
            Ok(source) => {
                tracing::info!(chars = source.chars().count(), "Generated component");
                Artifact {
                    source,
                    stub: false,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Code generation failed, using stub artifact");
                Artifact::stub(&e.to_string())
            }
        }
    }
}
