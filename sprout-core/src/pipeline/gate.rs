//! Content safety gate

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::prompts::{render, PromptContext, PromptKind};
use crate::model::{parse_json, CompletionRequest, LanguageModel};

const MAX_TOKENS: u32 = 200;
const TEMPERATURE: f32 = 0.3;

/// Approve/reject decision on a suggestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    pub approved: bool,
    pub reason: String,
}

impl GateVerdict {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
        }
    }
}

/// Decides whether a suggestion is safe and actionable
///
/// Fails closed: a model error or an unparseable reply is a rejection.
pub struct SafetyGate {
    model: Arc<dyn LanguageModel>,
}

impl SafetyGate {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Validate suggestion text; never errors
    pub async fn validate(&self, text: &str) -> GateVerdict {
        let prompt = render(
            PromptKind::Validate,
            &PromptContext::new().with_suggestion(text),
        );
        let request = CompletionRequest::new(prompt, MAX_TOKENS, TEMPERATURE);

        let verdict = match self.model.complete(&request).await {
            Ok(reply) => parse_json::<GateVerdict>(&reply),
            Err(e) => Err(e),
        };

        match verdict {
            Ok(verdict) => {
                tracing::info!(approved = verdict.approved, reason = %verdict.reason, "Gate verdict");
                verdict
            }
            Err(e) => {
                tracing::warn!(error = %e, "Gate failed closed");
                GateVerdict::rejected(format!("Validation error: {}", e))
            }
        }
    }
}
