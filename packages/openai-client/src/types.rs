//! Chat completion request and response types.

use serde::{Deserialize, Serialize};

/// Chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model to use (e.g., "gpt-4o", "llama-3.3-70b-versatile")
    pub model: String,

    /// Conversation messages
    pub messages: Vec<Message>,

    /// Maximum tokens in completion (for older models)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Maximum completion tokens (for o1, o3, gpt-5)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
}

impl Default for ChatRequest {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            messages: Vec::new(),
            max_tokens: None,
            max_completion_tokens: None,
        }
    }
}

impl ChatRequest {
    /// Create a new chat request with the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    /// Add a message to the conversation.
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Cap the completion length, picking the field the model understands.
    pub fn output_limit(mut self, tokens: u32) -> Self {
        if Self::uses_max_completion_tokens(&self.model) {
            self.max_completion_tokens = Some(tokens);
        } else {
            self.max_tokens = Some(tokens);
        }
        self
    }

    /// Check if a model requires max_completion_tokens instead of max_tokens.
    pub fn uses_max_completion_tokens(model: &str) -> bool {
        model.starts_with("o1")
            || model.starts_with("o3")
            || model.starts_with("gpt-5")
            || model.contains("-o1")
            || model.contains("-o3")
    }
}

/// Chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role: "system", "user", "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Response content
    pub content: String,

    /// Token usage statistics, when the provider reports them
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseRaw {
    pub choices: Vec<ChatChoice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatMessageResponse {
    // Some compatible providers send null content on refusals.
    #[serde(default)]
    pub content: Option<String>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Truncate a string to at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_builder() {
        let req = ChatRequest::new("gpt-4o")
            .message(Message::user("Hello"))
            .output_limit(100);

        assert_eq!(req.model, "gpt-4o");
        assert_eq!(req.messages.len(), 1);
        assert_eq!(req.max_tokens, Some(100));
        assert_eq!(req.max_completion_tokens, None);
    }

    #[test]
    fn test_output_limit_for_reasoning_models() {
        let req = ChatRequest::new("o3-mini").output_limit(4096);
        assert_eq!(req.max_tokens, None);
        assert_eq!(req.max_completion_tokens, Some(4096));
    }

    #[test]
    fn test_request_skips_unset_fields() {
        let body = serde_json::to_value(ChatRequest::new("m").message(Message::user("hi"))).unwrap();
        assert!(body.get("max_completion_tokens").is_none());
        assert!(body.get("max_tokens").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_null_content_parses() {
        let raw: ChatResponseRaw =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(raw.choices[0].message.content.is_none());
        assert!(raw.usage.is_none());
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("Hello 世界", 7), "Hello 世");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }
}
