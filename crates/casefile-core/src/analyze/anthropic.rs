//! Anthropic analyzer
//!
//! Uses reqwest against the messages API (non-streaming).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{build_prompt, parse_analysis, Analysis, Analyzer, SYSTEM_PROMPT};
use crate::error::AnalysisError;
use crate::storage::DocumentRecord;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;

/// Analyzer backed by an Anthropic model
pub struct AnthropicAnalyzer {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicAnalyzer {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn headers(&self) -> Result<HeaderMap, AnalysisError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| AnalysisError::NotConfigured("invalid API key".to_string()))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        Ok(headers)
    }
}

#[async_trait]
impl Analyzer for AnthropicAnalyzer {
    async fn analyze(
        &self,
        text: &str,
        prior: &DocumentRecord,
    ) -> Result<Analysis, AnalysisError> {
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT,
            messages: vec![AnthropicMessage {
                role: "user",
                content: build_prompt(text, prior),
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<AnthropicError>().await {
                Ok(err) => err.error.message,
                Err(_) => status.to_string(),
            };
            return Err(AnalysisError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body: AnthropicResponse = response.json().await?;
        let reply: String = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();

        debug!(doc_id = %prior.id, chars = reply.len(), "Anthropic analysis received");
        parse_analysis(&reply)
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_text_blocks_are_joined() {
        let body = r#"{"content":[{"type":"text","text":"{\"summary\":"},{"type":"text","text":"\"joined\"}"}]}"#;
        let response: AnthropicResponse = serde_json::from_str(body).unwrap();
        let reply: String = response
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect();
        assert_eq!(parse_analysis(&reply).unwrap().summary, "joined");
    }

    #[test]
    fn test_invalid_api_key_header() {
        let analyzer = AnthropicAnalyzer::new("bad\nkey", "claude-3-5-sonnet-latest");
        assert!(matches!(
            analyzer.headers(),
            Err(AnalysisError::NotConfigured(_))
        ));
    }
}
