//! Hosted request/response providers.

use openai_client::{ChatRequest, Message, OpenAIClient};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BackendKind, CallLimits};
use crate::error::GenerationError;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Any provider speaking the OpenAI chat completions shape.
pub struct ChatBackend {
    kind: BackendKind,
    client: OpenAIClient,
    model: String,
}

impl ChatBackend {
    pub fn openai(api_key: String, model: &str) -> Self {
        Self::with_client(BackendKind::OpenAi, OpenAIClient::new(api_key), model)
    }

    pub fn gemini(api_key: String, model: &str) -> Self {
        Self::with_client(
            BackendKind::Gemini,
            OpenAIClient::new(api_key).with_base_url(GEMINI_BASE_URL),
            model,
        )
    }

    pub fn groq(api_key: String, model: &str) -> Self {
        Self::with_client(
            BackendKind::Groq,
            OpenAIClient::new(api_key).with_base_url(GROQ_BASE_URL),
            model,
        )
    }

    pub fn ollama(base_url: &str, model: &str) -> Self {
        let base = format!("{}/v1", base_url.trim_end_matches('/'));
        Self::with_client(BackendKind::Ollama, OpenAIClient::unauthenticated(base), model)
    }

    fn with_client(kind: BackendKind, client: OpenAIClient, model: &str) -> Self {
        Self {
            kind,
            client,
            model: model.to_string(),
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub(crate) async fn complete(
        &self,
        prompt: &str,
        limits: CallLimits,
    ) -> Result<String, GenerationError> {
        let backend = self.kind.as_str();
        let request = ChatRequest::new(&self.model)
            .message(Message::user(prompt))
            .output_limit(limits.max_tokens);

        let response = tokio::time::timeout(limits.timeout, self.client.chat_completion(request))
            .await
            .map_err(|_| GenerationError::Timeout {
                backend,
                timeout: limits.timeout,
            })?
            .map_err(|e| GenerationError::Client {
                backend,
                message: e.to_string(),
            })?;

        if let Some(usage) = &response.usage {
            debug!(
                backend,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Token usage"
            );
        }
        Ok(response.content)
    }
}

/// Anthropic messages API.
pub struct AnthropicBackend {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<MessagesTurn<'a>>,
}

#[derive(Serialize)]
struct MessagesTurn<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl AnthropicBackend {
    pub fn new(api_key: String, model: &str) -> Self {
        Self {
            http: Client::new(),
            api_key,
            model: model.to_string(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub(crate) async fn complete(
        &self,
        prompt: &str,
        limits: CallLimits,
    ) -> Result<String, GenerationError> {
        let backend = BackendKind::Anthropic.as_str();
        let client_error = |message: String| GenerationError::Client { backend, message };

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: limits.max_tokens,
            messages: vec![MessagesTurn {
                role: "user",
                content: prompt,
            }],
        };

        let call = async {
            let response = self
                .http
                .post(format!("{}/v1/messages", self.base_url))
                .header("x-api-key", self.api_key.trim())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(|e| client_error(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(client_error(format!("HTTP {}: {}", status, text)));
            }

            let parsed: MessagesResponse = response
                .json()
                .await
                .map_err(|e| client_error(e.to_string()))?;
            Ok(join_text_blocks(parsed.content))
        };

        tokio::time::timeout(limits.timeout, call)
            .await
            .map_err(|_| GenerationError::Timeout {
                backend,
                timeout: limits.timeout,
            })?
    }
}

fn join_text_blocks(blocks: Vec<ContentBlock>) -> String {
    blocks
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_ollama_base_url_gets_v1_suffix() {
        let backend = ChatBackend::ollama("http://localhost:11434/", "llama3.1");
        assert_eq!(backend.client.base_url(), "http://localhost:11434/v1");
        assert_eq!(backend.kind(), BackendKind::Ollama);
    }

    #[test]
    fn test_compatible_providers_use_their_endpoints() {
        let gemini = ChatBackend::gemini("k".into(), "gemini-1.5-flash");
        let groq = ChatBackend::groq("k".into(), "llama");
        assert_eq!(gemini.client.base_url(), GEMINI_BASE_URL);
        assert_eq!(groq.client.base_url(), GROQ_BASE_URL);
    }

    #[test]
    fn test_text_blocks_are_joined_and_others_skipped() {
        let parsed: MessagesResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"one"},{"type":"tool_use","id":"x"},{"type":"text","text":"two"}]}"#,
        )
        .unwrap();
        assert_eq!(join_text_blocks(parsed.content), "one\ntwo");
    }

    #[tokio::test]
    async fn test_unreachable_anthropic_is_client_error() {
        let backend = AnthropicBackend::new("k".into(), "m").with_base_url("http://127.0.0.1:9");
        let limits = CallLimits {
            timeout: Duration::from_secs(5),
            max_tokens: 10,
        };
        let err = backend.complete("hi", limits).await.unwrap_err();
        assert!(matches!(err, GenerationError::Client { .. }));
    }
}
