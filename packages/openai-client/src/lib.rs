//! Client for OpenAI-compatible chat completion endpoints
//!
//! Talks to any provider that implements the `/chat/completions` shape:
//! OpenAI itself, Gemini's OpenAI endpoint, Groq and a local Ollama server.
//! No domain-specific logic lives here.
//!
//! # Example
//!
//! ```rust,ignore
//! use openai_client::{OpenAIClient, ChatRequest, Message};
//!
//! let client = OpenAIClient::new(api_key);
//!
//! let response = client.chat_completion(
//!     ChatRequest::new("gpt-4o")
//!         .message(Message::user("Hello!"))
//!         .output_limit(256),
//! ).await?;
//!
//! // Same client shape against Groq
//! let groq = OpenAIClient::new(key).with_base_url("https://api.groq.com/openai/v1");
//! ```

pub mod error;
pub mod types;

pub use error::{OpenAIError, Result};
pub use types::*;

use reqwest::Client;
use tracing::{debug, warn};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat completion client for one provider endpoint.
#[derive(Clone)]
pub struct OpenAIClient {
    http_client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIClient {
    /// Create a new client with the given API key against api.openai.com.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    /// Client for a keyless local server such as Ollama.
    pub fn unauthenticated(base_url: impl Into<String>) -> Self {
        Self::new(String::new()).with_base_url(base_url)
    }

    /// Set a custom base URL (compatible providers, proxies, etc.).
    ///
    /// A trailing slash is dropped so paths join cleanly.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Chat completion.
    ///
    /// Send messages to the chat completion API and get the first choice back.
    pub async fn chat_completion(&self, request: ChatRequest) -> Result<ChatResponse> {
        let start = std::time::Instant::now();

        let mut builder = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .json(&request);
        if !self.api_key.is_empty() {
            builder = builder.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, base_url = %self.base_url, "Chat completion request failed");
            OpenAIError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "Chat completion API error");
            return Err(OpenAIError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let chat_response: types::ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| OpenAIError::Parse(e.to_string()))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OpenAIError::EmptyResponse(self.base_url.clone()))?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis(),
            "Chat completion"
        );

        Ok(ChatResponse {
            content,
            usage: chat_response.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builder() {
        let client = OpenAIClient::new("sk-test").with_base_url("https://api.groq.com/openai/v1/");

        assert_eq!(client.api_key, "sk-test");
        assert_eq!(client.base_url(), "https://api.groq.com/openai/v1");
    }

    #[test]
    fn test_unauthenticated_client_has_no_key() {
        let client = OpenAIClient::unauthenticated("http://localhost:11434/v1");
        assert!(client.api_key.is_empty());
        assert_eq!(client.base_url(), "http://localhost:11434/v1");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let client = OpenAIClient::unauthenticated("http://127.0.0.1:9");
        let err = client
            .chat_completion(ChatRequest::new("m").message(Message::user("hi")))
            .await
            .unwrap_err();
        assert!(matches!(err, OpenAIError::Network(_)));
    }
}
