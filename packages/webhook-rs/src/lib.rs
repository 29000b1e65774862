//! Chat webhook client.
//!
//! Posts plain-text messages to a Discord-compatible webhook URL. Long reports
//! are split on line boundaries so no single post exceeds the channel limit.

use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Discord rejects content over 2000 characters; keep some headroom.
pub const DEFAULT_CHUNK_BUDGET: usize = 1900;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("webhook returned {status}: {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Clone)]
pub struct WebhookOptions {
    pub url: String,
    pub username: Option<String>,
    pub chunk_budget: usize,
}

impl WebhookOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            chunk_budget: DEFAULT_CHUNK_BUDGET,
        }
    }

    /// Display name shown on posted messages.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct WebhookService {
    options: WebhookOptions,
    client: Client,
}

impl WebhookService {
    pub fn new(options: WebhookOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    /// Post a single message as-is.
    pub async fn post(&self, content: &str) -> Result<(), WebhookError> {
        let payload = WebhookPayload {
            content,
            username: self.options.username.as_deref(),
        };

        let response = self
            .client
            .post(&self.options.url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %message, "Webhook rejected message");
            return Err(WebhookError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!(chars = content.chars().count(), "Webhook message posted");
        Ok(())
    }

    /// Post a report, one message per chunk. Returns the number of posts made.
    ///
    /// Stops at the first failed post.
    pub async fn post_lines<S: AsRef<str>>(&self, lines: &[S]) -> Result<usize, WebhookError> {
        let chunks = chunk_lines(lines, self.options.chunk_budget);
        for chunk in &chunks {
            self.post(chunk).await?;
        }
        Ok(chunks.len())
    }
}

/// Group lines into messages of at most `budget` characters.
///
/// Lines are never split across messages. Each line costs its length plus one
/// for the joining newline. A line that alone exceeds the budget is cut to the
/// budget and sent as its own message.
pub fn chunk_lines<S: AsRef<str>>(lines: &[S], budget: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for line in lines {
        let line = line.as_ref();
        let line_len = line.chars().count() + 1;

        if line_len > budget {
            if !current.is_empty() {
                chunks.push(current.join("\n"));
                current.clear();
                current_len = 0;
            }
            chunks.push(line.chars().take(budget).collect());
            continue;
        }

        if current_len + line_len > budget && !current.is_empty() {
            chunks.push(current.join("\n"));
            current.clear();
            current_len = 0;
        }

        current.push(line);
        current_len += line_len;
    }

    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifty_lines_fit_in_two_posts() {
        let lines: Vec<String> = (0..50).map(|i| format!("{:0>50}", i)).collect();
        let chunks = chunk_lines(&lines, 1900);

        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1900);
        }

        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.split('\n')).collect();
        assert_eq!(rejoined, lines.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_oversized_line_is_truncated_and_sent_alone() {
        let long = "x".repeat(2500);
        let lines = vec!["before".to_string(), long, "after".to_string()];
        let chunks = chunk_lines(&lines, 1900);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "before");
        assert_eq!(chunks[1].chars().count(), 1900);
        assert_eq!(chunks[2], "after");
    }

    #[test]
    fn test_empty_report_has_no_chunks() {
        let lines: Vec<&str> = Vec::new();
        assert!(chunk_lines(&lines, 1900).is_empty());
    }

    #[test]
    fn test_multibyte_lines_count_characters() {
        let lines = vec!["✅ ok"; 3];
        let chunks = chunk_lines(&lines, 10);
        assert_eq!(chunks, vec!["✅ ok\n✅ ok".to_string(), "✅ ok".to_string()]);
    }

    #[test]
    fn test_options_default_budget() {
        let options = WebhookOptions::new("https://discord.test/api/webhooks/1/abc");
        assert_eq!(options.chunk_budget, DEFAULT_CHUNK_BUDGET);
        assert!(options.username.is_none());
        let named = options.with_username("jobscout");
        assert_eq!(named.username.as_deref(), Some("jobscout"));
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_network_error() {
        let service = WebhookService::new(WebhookOptions::new("http://127.0.0.1:9/hook"));
        let err = service.post("hello").await.unwrap_err();
        assert!(matches!(err, WebhookError::Network(_)));
    }
}
