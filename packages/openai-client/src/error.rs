//! Error types for the chat completion client.

use thiserror::Error;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, OpenAIError>;

/// Chat completion client errors.
#[derive(Debug, Error)]
pub enum OpenAIError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// API error (non-2xx response, rate limit, invalid request)
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),

    /// The provider answered but returned no choices
    #[error("Empty response from {0}")]
    EmptyResponse(String),
}
