//! OpenAI analyzer
//!
//! Uses the chat completions endpoint with JSON response format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{build_prompt, parse_analysis, Analysis, Analyzer, SYSTEM_PROMPT};
use crate::error::AnalysisError;
use crate::storage::DocumentRecord;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Analyzer backed by an OpenAI chat model
pub struct OpenAiAnalyzer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiAnalyzer {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: OPENAI_CHAT_URL.to_string(),
        }
    }

    /// Point at an OpenAI-compatible server instead of api.openai.com.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Analyzer for OpenAiAnalyzer {
    async fn analyze(
        &self,
        text: &str,
        prior: &DocumentRecord,
    ) -> Result<Analysis, AnalysisError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(text, prior),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<OpenAiError>().await {
                Ok(err) => err.error.message,
                Err(_) => status.to_string(),
            };
            return Err(AnalysisError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatResponse = response.json().await?;
        let reply = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AnalysisError::Parse("empty completion".to_string()))?;

        debug!(doc_id = %prior.id, chars = reply.len(), "OpenAI analysis received");
        parse_analysis(&reply)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi".to_string(),
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"summary\":\"ok\"}"}}]}"#;
        let response: ChatResponse = serde_json::from_str(body).unwrap();
        let content = response.choices[0].message.content.clone().unwrap();
        assert_eq!(parse_analysis(&content).unwrap().summary, "ok");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_request_error() {
        let analyzer =
            OpenAiAnalyzer::new("key", "gpt-4o-mini").with_endpoint("http://127.0.0.1:9/v1/chat");
        let err = analyzer
            .analyze("text", &DocumentRecord::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Request(_)), "got {err}");
    }
}
