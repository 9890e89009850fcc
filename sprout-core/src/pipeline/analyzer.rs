//! Impact analysis: which files a suggestion touches

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::git::is_safe_relative_path;
use crate::model::prompts::{render, PromptContext, PromptKind};
use crate::model::{parse_json, CompletionRequest, LanguageModel};

const MAX_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.3;

/// Estimated size of a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    /// Analysis failed; never accepted from a model reply
    #[serde(skip_deserializing)]
    Unknown,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
            Complexity::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Plan produced by the analyzer
///
/// An empty `files_to_modify` means there is no actionable plan, not that
/// nothing needs to change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub files_to_modify: Vec<String>,
    pub reasoning: String,
    pub complexity: Complexity,
}

impl ImpactAnalysis {
    fn failed(reason: impl fmt::Display) -> Self {
        Self {
            files_to_modify: Vec::new(),
            reasoning: format!("Error: {}", reason),
            complexity: Complexity::Unknown,
        }
    }

    /// Whether there is anything to act on
    pub fn is_actionable(&self) -> bool {
        !self.files_to_modify.is_empty()
    }
}

/// Drop unsafe and duplicate paths, keeping the model's order
fn sanitize_paths(files: Vec<String>) -> Vec<String> {
    let mut kept: Vec<String> = Vec::with_capacity(files.len());
    for file in files {
        let file = file.trim().trim_start_matches("./").to_string();
        if !is_safe_relative_path(&file) {
            tracing::warn!(path = %file, "Ignoring unsafe path from analysis");
            continue;
        }
        if !kept.contains(&file) {
            kept.push(file);
        }
    }
    kept
}

/// Picks the files a suggestion needs to change
pub struct ImpactAnalyzer {
    model: Arc<dyn LanguageModel>,
}

impl ImpactAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Analyze `text` against the repository's `codebase` listing; never errors
    pub async fn analyze(&self, text: &str, codebase: &[String]) -> ImpactAnalysis {
        let prompt = render(
            PromptKind::Analyze,
            &PromptContext::new()
                .with_suggestion(text)
                .with_codebase(codebase),
        );
        let request = CompletionRequest::new(prompt, MAX_TOKENS, TEMPERATURE);

        let parsed = match self.model.complete(&request).await {
            Ok(reply) => parse_json::<ImpactAnalysis>(&reply),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(mut analysis) => {
                analysis.files_to_modify = sanitize_paths(analysis.files_to_modify);
                tracing::info!(
                    files = analysis.files_to_modify.len(),
                    complexity = %analysis.complexity,
                    "Impact analysis complete"
                );
                analysis
            }
            Err(e) => {
                tracing::warn!(error = %e, "Impact analysis failed");
                ImpactAnalysis::failed(e)
            }
        }
    }
}
