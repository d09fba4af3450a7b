//! Document analysis: summary, entities, legal codes, violations,
//! contradictions and severity.
//!
//! Backends:
//! - `HeuristicAnalyzer`: offline, keeps prior findings
//! - `OpenAiAnalyzer`: OpenAI chat completions
//! - `AnthropicAnalyzer`: Anthropic messages API

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicAnalyzer;
pub use openai::OpenAiAnalyzer;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::storage::{DocumentRecord, Severity};

/// Longest slice of document text sent to a remote model.
const MAX_PROMPT_CHARS: usize = 24_000;

/// Characters of text quoted by the heuristic summary.
const AUTO_SUMMARY_CHARS: usize = 200;

/// Structured result of analyzing one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub summary: String,
    pub severity: Severity,
    pub entities: Vec<String>,
    pub legal_codes: Vec<String>,
    pub violations: Vec<String>,
    pub contradictions: Vec<String>,
}

/// Produces an [`Analysis`] for a document's text.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze `text`. `prior` is the record as currently stored, for context.
    async fn analyze(&self, text: &str, prior: &DocumentRecord)
        -> Result<Analysis, AnalysisError>;

    /// Short backend name for logs ("heuristic", "openai", "anthropic").
    fn name(&self) -> &'static str;
}

/// Run an analysis bounded by `timeout`.
pub async fn analyze_with_timeout(
    analyzer: &dyn Analyzer,
    text: &str,
    prior: &DocumentRecord,
    timeout: Duration,
) -> Result<Analysis, AnalysisError> {
    match tokio::time::timeout(timeout, analyzer.analyze(text, prior)).await {
        Ok(result) => result,
        Err(_) => Err(AnalysisError::Timeout(timeout.as_secs())),
    }
}

/// Analyzer configuration stored in settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// No model; keep existing findings
    #[default]
    Heuristic,
    /// OpenAI API
    #[serde(rename = "openai")]
    OpenAI { api_key: String, model: String },
    /// Anthropic API
    Anthropic { api_key: String, model: String },
}

impl ProviderConfig {
    pub fn provider_type(&self) -> &'static str {
        match self {
            ProviderConfig::Heuristic => "heuristic",
            ProviderConfig::OpenAI { .. } => "openai",
            ProviderConfig::Anthropic { .. } => "anthropic",
        }
    }

    /// Fill an empty API key from the provider's environment variable.
    pub fn with_env_api_key(self) -> Self {
        match self {
            ProviderConfig::OpenAI { api_key, model } if api_key.is_empty() => {
                ProviderConfig::OpenAI {
                    api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
                    model,
                }
            }
            ProviderConfig::Anthropic { api_key, model } if api_key.is_empty() => {
                ProviderConfig::Anthropic {
                    api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
                    model,
                }
            }
            other => other,
        }
    }
}

/// Build the analyzer described by `config`.
///
/// A remote provider without an API key falls back to the heuristic analyzer.
pub fn build_analyzer(config: &ProviderConfig) -> Arc<dyn Analyzer> {
    match config.clone().with_env_api_key() {
        ProviderConfig::OpenAI { api_key, model } if !api_key.is_empty() => {
            Arc::new(OpenAiAnalyzer::new(&api_key, &model))
        }
        ProviderConfig::Anthropic { api_key, model } if !api_key.is_empty() => {
            Arc::new(AnthropicAnalyzer::new(&api_key, &model))
        }
        ProviderConfig::Heuristic => Arc::new(HeuristicAnalyzer),
        other => {
            tracing::warn!(
                provider = other.provider_type(),
                "No API key configured, using heuristic analyzer"
            );
            Arc::new(HeuristicAnalyzer)
        }
    }
}

/// Offline analyzer.
///
/// Carries the prior findings forward and only synthesizes a summary when
/// the document has none yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicAnalyzer;

#[async_trait]
impl Analyzer for HeuristicAnalyzer {
    async fn analyze(
        &self,
        text: &str,
        prior: &DocumentRecord,
    ) -> Result<Analysis, AnalysisError> {
        let summary = if !prior.summary.is_empty() {
            prior.summary.clone()
        } else {
            let head: String = text.trim().chars().take(AUTO_SUMMARY_CHARS).collect();
            if head.is_empty() {
                String::new()
            } else {
                format!("Auto-summary: {}…", head)
            }
        };

        Ok(Analysis {
            summary,
            severity: prior.severity,
            entities: prior.entities.clone(),
            legal_codes: prior.legal_codes.clone(),
            violations: prior.violations.clone(),
            contradictions: prior.contradictions.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

pub(crate) const SYSTEM_PROMPT: &str = "You are a legal document analyst reviewing evidence for a civil rights and family court case file. \
Read the document and respond with a single JSON object and nothing else, using exactly these keys: \
\"summary\" (2-4 sentence neutral summary), \
\"severity\" (one of \"Low\", \"Medium\", \"High\", \"Critical\"), \
\"entities\" (people, agencies and organizations named), \
\"legalCodes\" (statutes, court rules or constitutional provisions referenced or implicated), \
\"violations\" (specific procedural or rights violations the document evidences), \
\"contradictions\" (statements that conflict with each other or with the prior findings provided). \
Use empty arrays when nothing applies.";

/// Build the user message for a remote model.
pub(crate) fn build_prompt(text: &str, prior: &DocumentRecord) -> String {
    let body: String = text.chars().take(MAX_PROMPT_CHARS).collect();
    let mut prompt = format!("Document name: {}\n", prior.name);

    if !prior.summary.is_empty() {
        prompt.push_str(&format!("Prior summary: {}\n", prior.summary));
    }
    if !prior.contradictions.is_empty() {
        prompt.push_str(&format!(
            "Prior contradictions: {}\n",
            prior.contradictions.join("; ")
        ));
    }

    prompt.push_str("\n--- DOCUMENT TEXT ---\n");
    prompt.push_str(&body);
    prompt
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    entities: Vec<String>,
    #[serde(default, alias = "legal_codes")]
    legal_codes: Vec<String>,
    #[serde(default)]
    violations: Vec<String>,
    #[serde(default)]
    contradictions: Vec<String>,
}

/// Parse a model reply into an [`Analysis`].
///
/// Tolerates markdown code fences and prose around the JSON object.
pub(crate) fn parse_analysis(reply: &str) -> Result<Analysis, AnalysisError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if e > s => &reply[s..=e],
        _ => return Err(AnalysisError::Parse("no JSON object in reply".to_string())),
    };

    let raw: RawAnalysis =
        serde_json::from_str(json).map_err(|e| AnalysisError::Parse(e.to_string()))?;

    let severity = raw
        .severity
        .as_deref()
        .and_then(Severity::parse_lenient)
        .unwrap_or_default();

    Ok(Analysis {
        summary: raw.summary.trim().to_string(),
        severity,
        entities: raw.entities,
        legal_codes: raw.legal_codes,
        violations: raw.violations,
        contradictions: raw.contradictions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_heuristic_synthesizes_summary() {
        let prior = DocumentRecord {
            id: "doc-1".to_string(),
            ..Default::default()
        };
        let text = "x".repeat(500);

        let analysis = HeuristicAnalyzer.analyze(&text, &prior).await.unwrap();

        assert!(analysis.summary.starts_with("Auto-summary: "));
        // prefix + 200 chars + ellipsis
        assert_eq!(analysis.summary.chars().count(), 14 + 200 + 1);
        assert_eq!(analysis.severity, Severity::Medium);
    }

    #[tokio::test]
    async fn test_heuristic_keeps_prior_findings() {
        let prior = DocumentRecord {
            id: "doc-1".to_string(),
            summary: "Existing summary".to_string(),
            severity: Severity::High,
            violations: vec!["Denied hearing".to_string()],
            ..Default::default()
        };

        let analysis = HeuristicAnalyzer.analyze("new text", &prior).await.unwrap();

        assert_eq!(analysis.summary, "Existing summary");
        assert_eq!(analysis.severity, Severity::High);
        assert_eq!(analysis.violations, vec!["Denied hearing"]);
    }

    #[tokio::test]
    async fn test_heuristic_empty_text_gives_empty_summary() {
        let prior = DocumentRecord::default();
        let analysis = HeuristicAnalyzer.analyze("   ", &prior).await.unwrap();
        assert!(analysis.summary.is_empty());
    }

    #[test]
    fn test_parse_analysis_with_fences() {
        let reply = "```json\n{\"summary\": \" Order entered \", \"severity\": \"high\", \
                     \"entities\": [\"Judge Doe\"], \"legalCodes\": [\"42 U.S.C. 1983\"], \
                     \"violations\": [], \"contradictions\": [\"Dates differ\"]}\n```";

        let analysis = parse_analysis(reply).unwrap();

        assert_eq!(analysis.summary, "Order entered");
        assert_eq!(analysis.severity, Severity::High);
        assert_eq!(analysis.entities, vec!["Judge Doe"]);
        assert_eq!(analysis.legal_codes, vec!["42 U.S.C. 1983"]);
        assert_eq!(analysis.contradictions, vec!["Dates differ"]);
    }

    #[test]
    fn test_parse_analysis_defaults_and_snake_case() {
        let analysis =
            parse_analysis(r#"{"summary":"s","severity":"bogus","legal_codes":["MCR 3.207"]}"#)
                .unwrap();
        assert_eq!(analysis.severity, Severity::Medium);
        assert_eq!(analysis.legal_codes, vec!["MCR 3.207"]);
        assert!(analysis.entities.is_empty());
    }

    #[test]
    fn test_parse_analysis_rejects_prose() {
        assert!(matches!(
            parse_analysis("I cannot help with that."),
            Err(AnalysisError::Parse(_))
        ));
    }

    #[test]
    fn test_build_prompt_truncates_and_includes_context() {
        let prior = DocumentRecord {
            name: "exhibit-7.pdf".to_string(),
            summary: "Earlier".to_string(),
            ..Default::default()
        };
        let text = "a".repeat(MAX_PROMPT_CHARS + 100);

        let prompt = build_prompt(&text, &prior);

        assert!(prompt.starts_with("Document name: exhibit-7.pdf\n"));
        assert!(prompt.contains("Prior summary: Earlier"));
        assert!(prompt.ends_with(&"a".repeat(10)));
        assert!(prompt.len() < text.len());
    }

    #[test]
    fn test_provider_config_serde() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"type":"openai","api_key":"k","model":"gpt-4o-mini"}"#)
                .unwrap();
        assert_eq!(config.provider_type(), "openai");

        let json = serde_json::to_string(&ProviderConfig::Heuristic).unwrap();
        assert_eq!(json, r#"{"type":"heuristic"}"#);
    }

    #[test]
    fn test_build_analyzer_heuristic() {
        assert_eq!(build_analyzer(&ProviderConfig::Heuristic).name(), "heuristic");
    }
}
