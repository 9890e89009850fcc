//! Prompt templates for the pipeline stages
//!
//! Templates are embedded Markdown with `{{VARIABLE}}` placeholders.
//! Placeholders are resolved in a single pass over the template, so
//! substituted values (file contents, user text) are never re-expanded.

use std::collections::HashMap;

const VALIDATE_PROMPT: &str = include_str!("prompts/validate.md");
const GENERATE_PROMPT: &str = include_str!("prompts/generate.md");
const ANALYZE_PROMPT: &str = include_str!("prompts/analyze.md");
const MODIFY_PROMPT: &str = include_str!("prompts/modify.md");
const REVIEW_PROMPT: &str = include_str!("prompts/review.md");

/// Which stage a prompt belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Content safety gate
    Validate,
    /// Component synthesis
    Generate,
    /// Impact analysis
    Analyze,
    /// Whole-file modification
    Modify,
    /// Change review
    Review,
}

/// Get the raw prompt template for a stage
pub fn get_template(kind: PromptKind) -> &'static str {
    match kind {
        PromptKind::Validate => VALIDATE_PROMPT,
        PromptKind::Generate => GENERATE_PROMPT,
        PromptKind::Analyze => ANALYZE_PROMPT,
        PromptKind::Modify => MODIFY_PROMPT,
        PromptKind::Review => REVIEW_PROMPT,
    }
}

/// Context for rendering a prompt template
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    variables: HashMap<String, String>,
}

impl PromptContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Set a variable value (builder pattern)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set the suggestion text
    pub fn with_suggestion(self, text: impl Into<String>) -> Self {
        self.with("SUGGESTION", text)
    }

    /// Set the file being modified and its current content
    pub fn with_file(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.with("FILE_PATH", path).with("CURRENT_CONTENT", content)
    }

    /// Set the repository file listing
    pub fn with_codebase(self, files: &[String]) -> Self {
        let listing = if files.is_empty() {
            "(empty repository)".to_string()
        } else {
            files
                .iter()
                .map(|f| format!("- `{}`", f))
                .collect::<Vec<_>>()
                .join("\n")
        };
        self.with("CODEBASE", listing)
    }

    /// Set the change previews for review
    pub fn with_changes(self, summary: impl Into<String>) -> Self {
        self.with("CHANGES", summary)
    }
}

/// Render a prompt template with the given context
pub fn render(kind: PromptKind, context: &PromptContext) -> String {
    render_template(get_template(kind), context)
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase() || c == '_')
}

/// Substitute `{{NAME}}` placeholders; unknown names become "(not specified)"
fn render_template(template: &str, context: &PromptContext) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) if is_placeholder_name(&after[..end]) => {
                result.push_str(&rest[..start]);
                let name = &after[..end];
                match context.variables.get(name) {
                    Some(value) => result.push_str(value),
                    None => result.push_str("(not specified)"),
                }
                rest = &after[end + 2..];
            }
            _ => {
                result.push_str(&rest[..start + 2]);
                rest = after;
            }
        }
    }

    result.push_str(rest);
    result
}
