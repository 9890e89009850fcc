//! Automated review of a proposed change set

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::git::ChangeSet;
use crate::model::prompts::{render, PromptContext, PromptKind};
use crate::model::{parse_json, CompletionRequest, LanguageModel};

const MAX_TOKENS: u32 = 500;
const TEMPERATURE: f32 = 0.3;

/// Characters of each file shown to the reviewer
const PREVIEW_CHARS: usize = 200;

/// Reviewer's risk estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Review verdict on a change set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewReport {
    pub approved: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub risk_level: RiskLevel,
}

impl ReviewReport {
    fn failed(error: impl fmt::Display) -> Self {
        Self {
            approved: false,
            issues: vec![format!("Review error: {}", error)],
            suggestions: Vec::new(),
            risk_level: RiskLevel::Unknown,
        }
    }

    /// Withdraw an approval that contradicts the rest of the report
    ///
    /// Any listed issue, or a high/unknown risk, blocks approval.
    fn enforce_policy(mut self) -> Self {
        if self.approved
            && (!self.issues.is_empty()
                || matches!(self.risk_level, RiskLevel::High | RiskLevel::Unknown))
        {
            tracing::info!(
                issues = self.issues.len(),
                risk = %self.risk_level,
                "Approval withdrawn by review policy"
            );
            self.approved = false;
        }
        self
    }
}

/// Bounded, human-readable excerpt of every changed file
pub fn preview_changes(changes: &ChangeSet) -> String {
    changes
        .iter()
        .map(|(path, content)| {
            let excerpt: String = content.chars().take(PREVIEW_CHARS).collect();
            format!(
                "File: {}\nLength: {} chars\nPreview: {}...",
                path,
                content.chars().count(),
                excerpt
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Reviews change sets before they reach version control
///
/// Fails closed: errors produce an unapproved report with `unknown` risk.
pub struct ChangeReviewer {
    model: Arc<dyn LanguageModel>,
}

impl ChangeReviewer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Review `changes` made for suggestion `text`; never errors
    pub async fn review(&self, text: &str, changes: &ChangeSet) -> ReviewReport {
        let prompt = render(
            PromptKind::Review,
            &PromptContext::new()
                .with_suggestion(text)
                .with_changes(preview_changes(changes)),
        );
        let request = CompletionRequest::new(prompt, MAX_TOKENS, TEMPERATURE);

        let parsed = match self.model.complete(&request).await {
            Ok(reply) => parse_json::<ReviewReport>(&reply),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(report) => {
                let report = report.enforce_policy();
                tracing::info!(
                    approved = report.approved,
                    issues = report.issues.len(),
                    risk = %report.risk_level,
                    "Review complete"
                );
                report
            }
            Err(e) => {
                tracing::warn!(error = %e, "Review failed closed");
                ReviewReport::failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    fn two_files() -> ChangeSet {
        let mut changes = ChangeSet::new();
        changes.insert("src/App.tsx".to_string(), "const App = () => <Footer />;".to_string());
        changes.insert("src/Footer.tsx".to_string(), "export default Footer;".to_string());
        changes
    }

    #[test]
    fn test_preview_format() {
        let mut changes = ChangeSet::new();
        changes.insert("a.tsx".to_string(), "é".repeat(250));

        let preview = preview_changes(&changes);
        assert!(preview.starts_with("File: a.tsx\nLength: 250 chars\nPreview: "));
        assert!(preview.ends_with(&format!("{}...", "é".repeat(200))));
    }

    #[test]
    fn test_preview_joins_files() {
        let preview = preview_changes(&two_files());
        assert_eq!(preview.matches("File: ").count(), 2);
        assert!(preview.contains("...\n\nFile: src/Footer.tsx"));
    }

    #[tokio::test]
    async fn test_clean_approval() {
        let model = Arc::new(ScriptedModel::new().reply(
            r#"{"approved": true, "issues": [], "suggestions": ["Add aria-label"], "risk_level": "low"}"#,
        ));
        let reviewer = ChangeReviewer::new(model.clone());

        let report = reviewer.review("Add a footer", &two_files()).await;
        assert!(report.approved);
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert_eq!(report.suggestions, vec!["Add aria-label"]);

        let request = &model.requests()[0];
        assert_eq!(request.max_tokens, 500);
        assert!(request.prompt.contains("File: src/Footer.tsx"));
    }

    #[tokio::test]
    async fn test_flagged_issue_blocks_approval() {
        // Reviewer says yes but lists an issue at medium risk
        let model = Arc::new(ScriptedModel::new().reply(
            r#"{"approved": true, "issues": ["Footer is not exported from index"], "suggestions": [], "risk_level": "medium"}"#,
        ));
        let report = ChangeReviewer::new(model).review("Add a footer", &two_files()).await;

        assert!(!report.approved);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.risk_level, RiskLevel::Medium);
    }

    #[tokio::test]
    async fn test_high_risk_blocks_approval() {
        let model = Arc::new(ScriptedModel::new().reply(
            r#"{"approved": true, "issues": [], "suggestions": [], "risk_level": "high"}"#,
        ));
        let report = ChangeReviewer::new(model).review("Add a footer", &two_files()).await;
        assert!(!report.approved);
    }

    #[tokio::test]
    async fn test_error_fails_closed() {
        let model = Arc::new(ScriptedModel::new().fail("503"));
        let report = ChangeReviewer::new(model).review("Add a footer", &two_files()).await;

        assert!(!report.approved);
        assert_eq!(report.risk_level, RiskLevel::Unknown);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].starts_with("Review error:"));
        assert!(report.issues[0].contains("503"));
    }

    #[tokio::test]
    async fn test_unparseable_reply_fails_closed() {
        let model = Arc::new(ScriptedModel::new().reply("LGTM!"));
        let report = ChangeReviewer::new(model).review("Add a footer", &two_files()).await;
        assert!(!report.approved);
        assert_eq!(report.risk_level, RiskLevel::Unknown);
    }
}
